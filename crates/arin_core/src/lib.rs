pub mod config;
pub mod conversation;
pub mod error;
pub mod selector;
pub mod session;
pub mod trigger;

pub use config::{ArinConfig, TextsConfig};
pub use conversation::{Conversation, ConversationSettings, Turn, TurnOutcome};
pub use error::{PersistenceError, SubmitError, TransportError};
pub use selector::{active_reaction_index, latest_reactive_index};
pub use session::{Session, SessionView};
pub use trigger::{evaluate, EffectPolicy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Progression count at which the conversation ends for good.
pub const THRESHOLD: u32 = 10;

/// Storage key holding the progression counter (decimal string).
pub const COUNT_KEY: &str = "blushCount";

/// Storage key holding the ended flag (`"true"` / `"false"`).
pub const ENDED_KEY: &str = "conversationEnded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
    /// Only used for the unlock notice.
    System,
}

/// Reaction flags attached to a bot reply when it is appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub triggered: bool,
    pub show_effect: bool,
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    placeholder: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            reaction: None,
            placeholder: false,
        }
    }

    /// A bot message without reaction flags (greeting, connection error).
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            content: content.into(),
            reaction: None,
            placeholder: false,
        }
    }

    /// A bot reply carrying the reaction decided by the trigger evaluator.
    pub fn reply(content: impl Into<String>, reaction: Reaction) -> Self {
        Self {
            sender: Sender::Bot,
            content: content.into(),
            reaction: Some(reaction),
            placeholder: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::System,
            content: content.into(),
            reaction: None,
            placeholder: false,
        }
    }

    /// The transient "typing" entry. Identified by its marker, never by text.
    pub(crate) fn placeholder(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            content: content.into(),
            reaction: None,
            placeholder: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn is_triggered(&self) -> bool {
        self.reaction.is_some_and(|r| r.triggered)
    }
}

/// The two scalars that survive a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub count: u32,
    pub ended: bool,
}

impl Progress {
    pub fn new(count: u32, ended: bool) -> Self {
        Self { count, ended }
    }

    /// Forces `ended` when the counter already sits at or above `threshold`.
    pub fn normalized(self, threshold: u32) -> Self {
        Self {
            count: self.count,
            ended: self.ended || self.count >= threshold,
        }
    }

    /// Decodes the stored string values. Missing or unparseable values fall
    /// back to the defaults.
    pub fn decode(count: Option<&str>, ended: Option<&str>) -> Self {
        let count = match count.map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
                tracing::warn!(value = raw, "Stored progression counter is not a number, using 0");
                0
            }),
        };
        let ended = ended.is_some_and(|raw| raw.trim() == "true");
        Self { count, ended }
    }

    /// String encodings for [`COUNT_KEY`] and [`ENDED_KEY`].
    pub fn encode(&self) -> (String, String) {
        (self.count.to_string(), self.ended.to_string())
    }
}

/// The external text responder. Every failure is a [`TransportError`].
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send(&self, text: &str) -> Result<String, TransportError>;
}

/// Key-value persistence for [`Progress`].
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self) -> Result<Progress, PersistenceError>;
    async fn save(&self, progress: Progress) -> Result<(), PersistenceError>;
    async fn clear(&self) -> Result<(), PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_defaults_when_missing() {
        assert_eq!(Progress::decode(None, None), Progress::default());
    }

    #[test]
    fn test_decode_valid_values() {
        let p = Progress::decode(Some("7"), Some("false"));
        assert_eq!(p, Progress::new(7, false));
        let p = Progress::decode(Some(" 10 "), Some("true"));
        assert_eq!(p, Progress::new(10, true));
    }

    #[test]
    fn test_decode_corrupt_counter_falls_back() {
        assert_eq!(Progress::decode(Some("abc"), None).count, 0);
        assert_eq!(Progress::decode(Some("-3"), None).count, 0);
        assert_eq!(Progress::decode(Some("4.5"), Some("yes")), Progress::default());
    }

    #[test]
    fn test_encode_matches_decode() {
        let p = Progress::new(3, true);
        let (count, ended) = p.encode();
        assert_eq!(count, "3");
        assert_eq!(ended, "true");
    }

    #[test]
    fn test_normalized_sets_ended_at_threshold() {
        assert!(Progress::new(10, false).normalized(THRESHOLD).ended);
        assert!(!Progress::new(9, false).normalized(THRESHOLD).ended);
        // ended is one-way; a low counter does not clear it
        assert!(Progress::new(2, true).normalized(THRESHOLD).ended);
    }

    #[test]
    fn test_placeholder_marker_not_serialized_for_normal_messages() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(json.get("placeholder").is_none());
        assert!(json.get("reaction").is_none());
        assert_eq!(json["sender"], "user");
    }
}
