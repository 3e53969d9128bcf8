//! CLI channel — stdin/stdout REPL for local testing.
//!
//! By default it behaves as a flat transport keyed by user. Giving it a bot
//! identity and a channel id emulates a channel-oriented transport, which
//! exercises mention handling from the terminal.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::channels::{BotHandle, Channel, InboundMessage, MessageStream};
use crate::config::CliConfig;
use crate::error::ChannelError;

/// Reads lines from stdin and prints replies to stdout.
#[derive(Debug, Clone)]
pub struct CliChannel {
    user: String,
    bot_id: Option<String>,
    channel: Option<String>,
}

impl CliChannel {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            bot_id: None,
            channel: None,
        }
    }

    pub fn from_config(config: &CliConfig) -> Self {
        let channel = Self::new(config.user.clone());
        match &config.bot_identity {
            Some((bot_id, channel_id)) => channel.with_identity(bot_id, channel_id),
            None => channel,
        }
    }

    /// Act as a channel-oriented transport with the given bot id.
    pub fn with_identity(mut self, bot_id: impl Into<String>, channel: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self.channel = Some(channel.into());
        self
    }

    fn message(&self, line: &str) -> InboundMessage {
        let msg = InboundMessage::new(&self.user, line);
        match &self.channel {
            Some(channel) => msg.with_channel(channel),
            None => msg,
        }
    }
}

#[async_trait]
impl BotHandle for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn identity(&self) -> Option<&str> {
        self.bot_id.as_deref()
    }

    async fn reply(&self, _message: &InboundMessage, text: &str) -> Result<(), ChannelError> {
        let mut stdout = tokio::io::stdout();
        let out = format!("\n{text}\n\n");
        let written = async {
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await
        };
        written.await.map_err(|e| ChannelError::SendFailed {
            name: "cli".into(),
            reason: e.to_string(),
        })?;
        eprint!("> ");
        Ok(())
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let this = self.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(this.message(&line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    fn handle(&self) -> Arc<dyn BotHandle> {
        Arc::new(self.clone())
    }
}
