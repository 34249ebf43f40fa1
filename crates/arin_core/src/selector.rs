//! Which message may show a reaction.
//!
//! Only the most recent bot message is ever eligible, no matter how many
//! earlier replies were triggers. The placeholder and system notices are
//! skipped.

use crate::{Message, Sender};

/// Index of the most recent non-placeholder bot message.
pub fn latest_reactive_index(log: &[Message]) -> Option<usize> {
    log.iter()
        .rposition(|m| m.sender == Sender::Bot && !m.is_placeholder())
}

/// [`latest_reactive_index`], but only when that message was a trigger.
pub fn active_reaction_index(log: &[Message]) -> Option<usize> {
    latest_reactive_index(log).filter(|&i| log[i].is_triggered())
}

pub fn is_reaction_active(log: &[Message], index: usize) -> bool {
    active_reaction_index(log) == Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reaction;

    const HIT: Reaction = Reaction {
        triggered: true,
        show_effect: true,
    };

    #[test]
    fn test_empty_log() {
        assert_eq!(latest_reactive_index(&[]), None);
        assert_eq!(active_reaction_index(&[]), None);
    }

    #[test]
    fn test_skips_placeholder_and_user() {
        let log = vec![
            Message::bot("hello"),
            Message::reply("hi~", HIT),
            Message::user("more"),
            Message::placeholder("Typing..."),
        ];
        assert_eq!(latest_reactive_index(&log), Some(1));
        assert_eq!(active_reaction_index(&log), Some(1));
    }

    #[test]
    fn test_only_latest_bot_message_is_active() {
        let log = vec![
            Message::reply("one~", HIT),
            Message::user("x"),
            Message::reply("two~", HIT),
            Message::user("y"),
            Message::reply("plain", Reaction::default()),
        ];
        assert_eq!(latest_reactive_index(&log), Some(4));
        assert_eq!(active_reaction_index(&log), None);
        assert!(!is_reaction_active(&log, 0));
        assert!(!is_reaction_active(&log, 2));
    }

    #[test]
    fn test_system_notice_does_not_steal_reaction() {
        let log = vec![
            Message::bot("hello"),
            Message::user("x"),
            Message::reply("last one~", HIT),
            Message::system("unlocked"),
        ];
        assert_eq!(active_reaction_index(&log), Some(2));
    }

    #[test]
    fn test_connection_error_clears_active_reaction() {
        let log = vec![
            Message::reply("hey~", HIT),
            Message::user("x"),
            Message::bot("Connection error"),
        ];
        assert_eq!(latest_reactive_index(&log), Some(2));
        assert_eq!(active_reaction_index(&log), None);
    }
}
