//! Request and response records for the NLU backend.
//!
//! Field names follow the api.ai v1 JSON (camelCase on the wire).

use serde::{Deserialize, Serialize};

/// Context sent alongside a query so webhooks can see the raw message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalRequest {
    /// Fixed tag naming this integration.
    pub source: String,
    /// The inbound message, as the transport delivered it.
    pub data: serde_json::Value,
}

/// One text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub query: String,
    pub session_id: String,
    pub original_request: OriginalRequest,
}

impl TextRequest {
    pub fn new(
        query: impl Into<String>,
        session_id: impl Into<String>,
        original_request: OriginalRequest,
    ) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            original_request,
        }
    }
}

/// Backend response to a text query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub result: Option<QueryResult>,
    #[serde(default)]
    pub status: Option<ResponseStatus>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl NluResponse {
    /// Recognized action, if any. Empty strings count as none.
    pub fn action(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.action.as_deref())
            .filter(|a| !a.is_empty())
    }

    /// Text reply the agent suggests.
    pub fn speech(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.fulfillment.as_ref())
            .and_then(|f| f.speech.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// The `result` block: what the agent understood.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub resolved_query: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub action_incomplete: bool,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub contexts: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub fulfillment: Option<Fulfillment>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Agent reply content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(default)]
    pub speech: Option<String>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

/// The `status` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    pub code: u16,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl ResponseStatus {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "b340a1f7-abee-4e13-9bdd-5e8938a48b7d",
        "timestamp": "2017-02-09T15:38:26.548Z",
        "lang": "en",
        "result": {
            "source": "agent",
            "resolvedQuery": "my name is Sam and I live in Paris",
            "action": "greetings",
            "actionIncomplete": false,
            "parameters": {"city": "Paris", "name": "Sam"},
            "contexts": [],
            "metadata": {"intentId": "373a354b", "intentName": "user name"},
            "fulfillment": {"speech": "Hi Sam! Nice to meet you!", "messages": [{"type": 0, "speech": "Hi Sam!"}]},
            "score": 1
        },
        "status": {"code": 200, "errorType": "success"},
        "sessionId": "4b6a6779-b8ea-4094-b2ed-a302ba201815"
    }"#;

    #[test]
    fn parses_full_response() {
        let response: NluResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.action(), Some("greetings"));
        assert_eq!(response.speech(), Some("Hi Sam! Nice to meet you!"));
        let result = response.result.as_ref().unwrap();
        assert_eq!(result.parameters["city"], "Paris");
        assert_eq!(result.metadata["intentName"], "user name");
        assert_eq!(result.score, Some(1.0));
        assert!(response.status.as_ref().unwrap().is_success());
        assert_eq!(
            response.session_id.as_deref(),
            Some("4b6a6779-b8ea-4094-b2ed-a302ba201815")
        );
    }

    #[test]
    fn tolerates_missing_result() {
        let response: NluResponse =
            serde_json::from_str(r#"{"status": {"code": 200}}"#).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.action(), None);
        assert_eq!(response.speech(), None);
    }

    #[test]
    fn empty_action_is_none() {
        let response: NluResponse =
            serde_json::from_str(r#"{"result": {"action": ""}}"#).unwrap();
        assert_eq!(response.action(), None);
    }

    #[test]
    fn request_uses_wire_names() {
        let request = TextRequest::new(
            "hello",
            "s-1",
            OriginalRequest {
                source: "intent-bridge".into(),
                data: serde_json::json!({"user": "U1"}),
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["sessionId"], "s-1");
        assert_eq!(value["originalRequest"]["source"], "intent-bridge");
        assert_eq!(value["originalRequest"]["data"]["user"], "U1");
    }
}
