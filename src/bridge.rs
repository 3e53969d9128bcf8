//! Host loop that feeds a channel's messages through the turn processor.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::channels::Channel;
use crate::error::Error;
use crate::processor::{TurnOutcome, TurnProcessor};

/// Turn counts for one `Bridge::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub turns: usize,
    pub skipped: usize,
    pub dispatched: usize,
    pub backend_failed: usize,
    pub aborted: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &TurnOutcome) {
        self.turns += 1;
        match outcome {
            TurnOutcome::Skipped(_) => self.skipped += 1,
            TurnOutcome::Dispatched { .. } => self.dispatched += 1,
            TurnOutcome::BackendFailed { .. } => self.backend_failed += 1,
            TurnOutcome::Aborted => self.aborted += 1,
        }
    }
}

/// Runs turns for every message a channel delivers.
pub struct Bridge {
    processor: Arc<TurnProcessor>,
}

impl Bridge {
    pub fn new(processor: TurnProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    /// Listen on `channel` until its stream ends.
    ///
    /// Each message gets its own task; turns do not wait on each other.
    /// Returns after in-flight turns and their session writes finish.
    pub async fn run(&self, channel: Arc<dyn Channel>) -> Result<RunStats, Error> {
        let mut messages = channel.start().await?;
        let bot = channel.handle();
        info!(
            channel = channel.name(),
            listeners = self.processor.dispatcher().listener_count(),
            "Bridge listening"
        );

        let mut turns = JoinSet::new();
        let mut stats = RunStats::default();

        while let Some(message) = messages.next().await {
            let processor = Arc::clone(&self.processor);
            let bot = Arc::clone(&bot);
            turns.spawn(async move { processor.process(&message, bot.as_ref()).await });

            while let Some(joined) = turns.try_join_next() {
                collect(joined, &mut stats);
            }
        }

        while let Some(joined) = turns.join_next().await {
            collect(joined, &mut stats);
        }
        self.processor.sessions().flush().await;

        info!(channel = channel.name(), turns = stats.turns, "Channel closed");
        channel.shutdown().await?;
        Ok(stats)
    }
}

fn collect(joined: Result<TurnOutcome, tokio::task::JoinError>, stats: &mut RunStats) {
    match joined {
        Ok(outcome) => stats.record(&outcome),
        Err(e) => {
            stats.turns += 1;
            stats.aborted += 1;
            error!(error = %e, "Turn task failed");
        }
    }
}
