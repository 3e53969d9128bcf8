//! Identity resolution: which conversation a message belongs to, and what
//! text to send to the NLU backend.
//!
//! Flat transports key conversations by sender. Channel-oriented transports
//! (the bot has its own id) key them by channel, since several users share
//! one thread there. On those transports the bot's own messages and
//! mentions aimed at other users are skipped.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::channels::InboundMessage;
use crate::error::TurnError;

/// Right single quotation mark, as typed by many mobile keyboards.
const CURLY_APOSTROPHE: char = '\u{2019}';

/// A message that opens with this is addressed to a user.
const USER_MENTION_PREFIX: &str = "<@U";

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|amp|lt|gt|quot|apos);")
        .expect("entity pattern is valid")
});

/// Why a message was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No text content.
    NoText,
    /// Sent by the bot itself.
    OwnMessage,
    /// Opens with a mention of someone other than the bot.
    MentionsOtherUser,
}

/// Conversation key and cleaned text for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub conversation_key: String,
    pub text: String,
}

/// Outcome of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Skip(SkipReason),
    Resolved(ResolvedIdentity),
}

/// Resolve a message against the bot identity of its transport.
///
/// An empty bot id counts as absent. Fails only when a channel-oriented
/// message carries no channel id.
pub fn resolve(message: &InboundMessage, bot_id: Option<&str>) -> Result<Resolution, TurnError> {
    let raw = match message.text.as_deref() {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(Resolution::Skip(SkipReason::NoText)),
    };

    let mut text = clean_text(raw);

    let conversation_key = match bot_id.filter(|id| !id.is_empty()) {
        Some(bot_id) => {
            if message.user == bot_id {
                return Ok(Resolution::Skip(SkipReason::OwnMessage));
            }
            if raw.starts_with(USER_MENTION_PREFIX) && !raw.contains(bot_id) {
                return Ok(Resolution::Skip(SkipReason::MentionsOtherUser));
            }

            let mention = format!("<@{bot_id}>");
            if text.contains(&mention) {
                text = text.replacen(&mention, "", 1);
            }

            message
                .channel
                .clone()
                .ok_or_else(|| TurnError::MissingChannel {
                    user: message.user.clone(),
                })?
        }
        None => message.user.clone(),
    };

    Ok(Resolution::Resolved(ResolvedIdentity {
        conversation_key,
        text,
    }))
}

/// Decode entities and normalize curly apostrophes.
pub fn clean_text(raw: &str) -> String {
    decode_entities(raw).replace(CURLY_APOSTROPHE, "'")
}

/// Decode XML character entities: the five named ones plus numeric references.
///
/// Unknown names and invalid code points are left as written.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY.replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let decoded = match body {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                let number = &body[1..];
                let code = match number.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => number.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }
        };
        match decoded {
            Some(ch) => ch.to_string(),
            None => caps[0].to_string(),
        }
    })
}
