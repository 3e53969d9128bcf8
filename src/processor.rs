//! Turn processor — one inbound message in, at most one dispatch out.
//!
//! Flow:
//! 1. Load the session map (never fails; see `SessionStore::load_all`)
//! 2. Resolve identity → skip, or conversation key + cleaned text
//! 3. Ensure a session id for the key, minting and persisting if absent
//! 4. Query the NLU backend → dispatch on success, log on failure
//!
//! Nothing escapes a turn: every fault ends in a `TurnOutcome`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error};

use crate::channels::{BotHandle, InboundMessage};
use crate::config::DEFAULT_SOURCE_TAG;
use crate::dispatch::{DispatchSummary, Dispatcher};
use crate::error::TurnError;
use crate::identity::{self, Resolution, SkipReason};
use crate::nlu::{NluClient, OriginalRequest, TextRequest};
use crate::store::SessionStore;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Not meant for the bot. Nothing was sent.
    Skipped(SkipReason),
    /// The backend answered and listeners ran.
    Dispatched {
        conversation_key: String,
        session_id: String,
        action: Option<String>,
        summary: DispatchSummary,
    },
    /// The backend call failed. No listener ran.
    BackendFailed {
        conversation_key: String,
        session_id: String,
    },
    /// The turn hit a fault before reaching the backend.
    Aborted,
}

/// Processes inbound messages one turn at a time.
///
/// Turns share nothing but the session store and the read-only dispatcher,
/// so any number can run concurrently.
pub struct TurnProcessor {
    sessions: SessionStore,
    nlu: Arc<dyn NluClient>,
    dispatcher: Dispatcher,
    source: String,
}

impl TurnProcessor {
    pub fn new(sessions: SessionStore, nlu: Arc<dyn NluClient>, dispatcher: Dispatcher) -> Self {
        Self {
            sessions,
            nlu,
            dispatcher,
            source: DEFAULT_SOURCE_TAG.to_string(),
        }
    }

    /// Tag sent as `originalRequest.source`.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one turn. Faults are logged, never returned.
    pub async fn process(&self, message: &InboundMessage, bot: &dyn BotHandle) -> TurnOutcome {
        let turn = AssertUnwindSafe(self.run_turn(message, bot)).catch_unwind();
        match turn.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(user = %message.user, transport = bot.name(), error = %e, "Turn aborted");
                TurnOutcome::Aborted
            }
            Err(_) => {
                error!(user = %message.user, transport = bot.name(), "Turn panicked");
                TurnOutcome::Aborted
            }
        }
    }

    async fn run_turn(
        &self,
        message: &InboundMessage,
        bot: &dyn BotHandle,
    ) -> Result<TurnOutcome, TurnError> {
        let mut sessions = self.sessions.load_all().await;

        let identity = match identity::resolve(message, bot.identity())? {
            Resolution::Skip(reason) => return Ok(TurnOutcome::Skipped(reason)),
            Resolution::Resolved(identity) => identity,
        };

        let session = self
            .sessions
            .ensure(&mut sessions, &identity.conversation_key);

        let request = TextRequest::new(
            identity.text,
            session.id.clone(),
            OriginalRequest {
                source: self.source.clone(),
                data: serde_json::to_value(message)?,
            },
        );

        debug!(
            key = %identity.conversation_key,
            session_id = %session.id,
            backend = self.nlu.name(),
            "Querying NLU backend"
        );

        match self.nlu.text_request(&request).await {
            Ok(response) => {
                let summary = self.dispatcher.dispatch(message, &response, bot).await;
                Ok(TurnOutcome::Dispatched {
                    conversation_key: identity.conversation_key,
                    session_id: session.id,
                    action: response.action().map(String::from),
                    summary,
                })
            }
            Err(e) => {
                error!(
                    key = %identity.conversation_key,
                    session_id = %session.id,
                    backend = self.nlu.name(),
                    error = %e,
                    "NLU request failed"
                );
                Ok(TurnOutcome::BackendFailed {
                    conversation_key: identity.conversation_key,
                    session_id: session.id,
                })
            }
        }
    }
}
