//! Response dispatcher — fans NLU responses out to registered listeners.
//!
//! Listeners are registered while the dispatcher is being built and the
//! tables are read-only once it is handed to the turn processor. Global
//! listeners run first, then the listeners for the response's action, each
//! group in registration order.
//!
//! A failing listener never stops the fan-out: errors and panics are logged
//! and the next listener runs.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, warn};

use crate::channels::{BotHandle, InboundMessage};
use crate::error::ListenerError;
use crate::nlu::NluResponse;

/// Something interested in NLU responses.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn on_response(
        &self,
        message: &InboundMessage,
        response: &NluResponse,
        bot: &dyn BotHandle,
    ) -> Result<(), ListenerError>;
}

struct FnListener<F>(F);

#[async_trait]
impl<F> Listener for FnListener<F>
where
    F: Fn(&InboundMessage, &NluResponse, &dyn BotHandle) -> Result<(), ListenerError>
        + Send
        + Sync,
{
    async fn on_response(
        &self,
        message: &InboundMessage,
        response: &NluResponse,
        bot: &dyn BotHandle,
    ) -> Result<(), ListenerError> {
        (self.0)(message, response, bot)
    }
}

/// Wrap a plain closure as a listener.
pub fn listener_fn<F>(f: F) -> Arc<dyn Listener>
where
    F: Fn(&InboundMessage, &NluResponse, &dyn BotHandle) -> Result<(), ListenerError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnListener(f))
}

/// What happened during one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Listeners called.
    pub invoked: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

/// Global and per-action listener tables.
#[derive(Default)]
pub struct Dispatcher {
    any: Vec<Arc<dyn Listener>>,
    actions: HashMap<String, Vec<Arc<dyn Listener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `listener` for responses carrying `action`.
    pub fn on_action(mut self, action: impl Into<String>, listener: Arc<dyn Listener>) -> Self {
        self.actions.entry(action.into()).or_default().push(listener);
        self
    }

    /// Call `listener` for every successful response.
    pub fn on_any(mut self, listener: Arc<dyn Listener>) -> Self {
        self.any.push(listener);
        self
    }

    /// Total registrations across both tables.
    pub fn listener_count(&self) -> usize {
        self.any.len() + self.actions.values().map(Vec::len).sum::<usize>()
    }

    /// Actions that have at least one listener.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// Run global listeners, then listeners for the response's action.
    ///
    /// An action with no listeners is not an error.
    pub async fn dispatch(
        &self,
        message: &InboundMessage,
        response: &NluResponse,
        bot: &dyn BotHandle,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for listener in &self.any {
            invoke(listener.as_ref(), message, response, bot, None, &mut summary).await;
        }

        if let Some(action) = response.action()
            && let Some(listeners) = self.actions.get(action)
        {
            for listener in listeners {
                invoke(
                    listener.as_ref(),
                    message,
                    response,
                    bot,
                    Some(action),
                    &mut summary,
                )
                .await;
            }
        }

        summary
    }
}

async fn invoke(
    listener: &dyn Listener,
    message: &InboundMessage,
    response: &NluResponse,
    bot: &dyn BotHandle,
    action: Option<&str>,
    summary: &mut DispatchSummary,
) {
    summary.invoked += 1;
    let outcome = AssertUnwindSafe(listener.on_response(message, response, bot))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            summary.failed += 1;
            warn!(action = action.unwrap_or("*"), error = %e, "Listener failed");
        }
        Err(panic) => {
            summary.failed += 1;
            error!(
                action = action.unwrap_or("*"),
                panic = panic_message(panic.as_ref()),
                "Listener panicked"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
