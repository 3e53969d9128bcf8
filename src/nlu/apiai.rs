//! api.ai v1 client. One `POST /query` per text request.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::NluConfig;
use crate::error::NluError;
use crate::nlu::NluClient;
use crate::nlu::types::{NluResponse, TextRequest};

const BACKEND: &str = "api.ai";

/// HTTP client for the api.ai query endpoint.
pub struct ApiAiClient {
    config: NluConfig,
    client: reqwest::Client,
}

impl ApiAiClient {
    pub fn new(config: NluConfig) -> Result<Self, NluError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NluError::RequestFailed {
                backend: BACKEND.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn query_url(&self) -> String {
        format!(
            "{}/query?v={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version
        )
    }

    fn body(&self, request: &TextRequest) -> serde_json::Value {
        serde_json::json!({
            "query": request.query,
            "lang": self.config.lang,
            "sessionId": request.session_id,
            "originalRequest": request.original_request,
        })
    }
}

#[async_trait]
impl NluClient for ApiAiClient {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn text_request(&self, request: &TextRequest) -> Result<NluResponse, NluError> {
        let resp = self
            .client
            .post(self.query_url())
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| NluError::RequestFailed {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| NluError::RequestFailed {
            backend: BACKEND.to_string(),
            reason: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(NluError::HttpStatus {
                backend: BACKEND.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let response: NluResponse =
            serde_json::from_str(&text).map_err(|e| NluError::InvalidResponse {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(status) = response.status.as_ref().filter(|s| !s.is_success()) {
            return Err(NluError::Status {
                backend: BACKEND.to_string(),
                code: status.code,
                error_type: status.error_type.clone().unwrap_or_default(),
                details: status.error_details.clone().unwrap_or_default(),
            });
        }

        tracing::debug!(
            session_id = %request.session_id,
            action = response.action().unwrap_or(""),
            "NLU query answered"
        );
        Ok(response)
    }
}
