//! NLU backend integration.
//!
//! The bridge only needs one call: send text with a session id and get the
//! recognized intent back. `ApiAiClient` speaks the api.ai v1 protocol;
//! anything else can sit behind `NluClient`.

pub mod apiai;
pub mod types;

pub use apiai::ApiAiClient;
pub use types::{Fulfillment, NluResponse, OriginalRequest, QueryResult, ResponseStatus, TextRequest};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NluConfig;
use crate::error::NluError;

/// A natural-language-understanding backend.
///
/// Each call ends in exactly one of a response or an error.
#[async_trait]
pub trait NluClient: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn text_request(&self, request: &TextRequest) -> Result<NluResponse, NluError>;
}

/// Create the configured NLU client.
pub fn create_client(config: &NluConfig) -> Result<Arc<dyn NluClient>, NluError> {
    let client = ApiAiClient::new(config.clone())?;
    tracing::info!(base_url = %config.base_url, lang = %config.lang, "Using api.ai");
    Ok(Arc::new(client))
}
