//! Plain-text transcript rendering.

use arin_core::{Message, Sender, SessionView};

const BOT_NAME: &str = "Arin";
const BLUSH: &str = "(*/ω＼*)";
const HEARTS: &str = "💗💕💖💓💘";

/// Ten-slot heart meter, filled up to `count`.
pub fn affection_bar(count: u32, threshold: u32) -> String {
    let filled = count.min(threshold) as usize;
    let empty = threshold as usize - filled;
    format!(
        "Affection Level {}{} {}/{}",
        "❤".repeat(filled),
        "♡".repeat(empty),
        count.min(threshold),
        threshold
    )
}

pub fn ended_banner(unlock_code: &str) -> String {
    format!("🎉 Relationship Maxed Out!\n   {unlock_code}\n   Type /reset to start over.")
}

/// One message as printed. `active` marks the single message allowed to
/// show its reaction.
pub fn format_message(message: &Message, active: bool) -> String {
    match message.sender {
        Sender::User => format!("You: {}", message.content),
        Sender::System => format!("*** {} ***", message.content),
        Sender::Bot => {
            let mut line = format!("{BOT_NAME}: {}", message.content);
            if active {
                if let Some(reaction) = message.reaction.filter(|r| r.triggered) {
                    line.push(' ');
                    line.push_str(BLUSH);
                    if reaction.show_effect {
                        line.push(' ');
                        line.push_str(HEARTS);
                    }
                }
            }
            line
        }
    }
}

/// Tracks how much of the log is already on screen.
#[derive(Debug, Default)]
pub struct Transcript {
    printed: usize,
}

impl Transcript {
    /// Lines for entries not printed yet. User messages are skipped since
    /// the prompt already echoed them; the placeholder is never counted as
    /// printed because the reply takes its slot.
    pub fn take_new_lines(&mut self, view: &SessionView) -> Vec<String> {
        if view.log.len() < self.printed {
            // the log was reset under us
            self.printed = 0;
        }

        let lines = view.log[self.printed..]
            .iter()
            .enumerate()
            .map(|(offset, m)| (self.printed + offset, m))
            .filter(|(_, m)| m.sender != Sender::User && !m.is_placeholder())
            .map(|(i, m)| format_message(m, view.active_reaction == Some(i)))
            .collect();

        self.printed = match view.log.last() {
            Some(last) if last.is_placeholder() => view.log.len() - 1,
            _ => view.log.len(),
        };
        lines
    }

    /// Forget everything printed, so the next call prints the whole log.
    pub fn rewind(&mut self) {
        self.printed = 0;
    }
}
