//! The conversation state machine.
//!
//! `Conversation` owns the message log, the progression counter and the ended
//! flag. It performs no I/O: the caller feeds it user input and responder
//! results and persists [`Progress`] when an outcome reports a change.
//!
//! ```text
//! Idle ──submit──▶ AwaitingReply ──success/failure──▶ Idle
//!   │                                   │
//!   └──────────── reset ◀── Ended ◀─────┘ (threshold reached)
//! ```

use crate::config::TextsConfig;
use crate::error::{SubmitError, TransportError};
use crate::selector;
use crate::trigger::{self, EffectPolicy};
use crate::{Message, Progress, Reaction, THRESHOLD};
use rand::Rng;
use tracing::{debug, info};

/// Monotonic token tagging every submit and every reset.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSettings {
    pub texts: TextsConfig,
    pub threshold: u32,
    pub effect: EffectPolicy,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            texts: TextsConfig::default(),
            threshold: THRESHOLD,
            effect: EffectPolicy::ALWAYS,
        }
    }
}

/// Ticket for one in-flight responder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    generation: Generation,
    text: String,
}

impl Turn {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The trimmed user text to send.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A reply was appended. `unlocked` is set on the reply that crossed the threshold.
    Replied {
        reaction: Reaction,
        progress: Progress,
        unlocked: bool,
    },
    /// The connection-error message was appended.
    Failed { progress: Progress },
    /// The ticket no longer matches the pending call; nothing changed.
    Stale,
}

impl TurnOutcome {
    /// Whether persisted progression must be rewritten.
    pub fn changes_progress(&self) -> bool {
        matches!(self, TurnOutcome::Replied { reaction, .. } if reaction.triggered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTurn {
    generation: Generation,
    placeholder: usize,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    settings: ConversationSettings,
    log: Vec<Message>,
    progress: Progress,
    pending: Option<PendingTurn>,
    generation: Generation,
}

impl Conversation {
    /// Fresh conversation: greeting only, counter 0.
    pub fn new(settings: ConversationSettings) -> Self {
        Self::restore(settings, Progress::default())
    }

    /// Conversation resuming persisted progression. The log always restarts
    /// from the greeting.
    pub fn restore(settings: ConversationSettings, progress: Progress) -> Self {
        let progress = progress.normalized(settings.threshold);
        let log = vec![Message::bot(settings.texts.greeting.clone())];
        Self {
            settings,
            log,
            progress,
            pending: None,
            generation: 0,
        }
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.progress.ended
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn threshold(&self) -> u32 {
        self.settings.threshold
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    pub fn latest_reactive_index(&self) -> Option<usize> {
        selector::latest_reactive_index(&self.log)
    }

    pub fn active_reaction_index(&self) -> Option<usize> {
        selector::active_reaction_index(&self.log)
    }

    /// Appends the user message and the placeholder, and hands back the
    /// ticket for the responder call.
    pub fn submit_user_message(&mut self, text: &str) -> Result<Turn, SubmitError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::InvalidInput);
        }
        if self.pending.is_some() {
            return Err(SubmitError::Busy);
        }
        if self.progress.ended {
            return Err(SubmitError::Ended);
        }

        self.generation += 1;
        self.log.push(Message::user(text));
        self.log
            .push(Message::placeholder(self.settings.texts.placeholder.clone()));
        self.pending = Some(PendingTurn {
            generation: self.generation,
            placeholder: self.log.len() - 1,
        });
        debug!(generation = self.generation, "User message submitted");

        Ok(Turn {
            generation: self.generation,
            text: text.to_string(),
        })
    }

    /// Applies a reply for `turn`.
    pub fn on_responder_success<R: Rng + ?Sized>(
        &mut self,
        turn: &Turn,
        reply: &str,
        rng: &mut R,
    ) -> TurnOutcome {
        if !self.settle(turn) {
            return TurnOutcome::Stale;
        }

        let reaction = if self.progress.ended {
            Reaction::default()
        } else {
            trigger::evaluate(reply, false, &self.settings.effect, rng)
        };

        let mut unlocked = false;
        if reaction.triggered {
            self.progress.count = self.progress.count.saturating_add(1);
            info!(
                count = self.progress.count,
                threshold = self.settings.threshold,
                show_effect = reaction.show_effect,
                "Reply triggered a reaction"
            );
            if self.progress.count >= self.settings.threshold {
                self.progress.ended = true;
                unlocked = true;
            }
        }

        self.log.push(Message::reply(reply, reaction));
        if unlocked {
            info!("Threshold reached, conversation ended");
            self.log
                .push(Message::system(self.settings.texts.unlock_notice()));
        }

        TurnOutcome::Replied {
            reaction,
            progress: self.progress,
            unlocked,
        }
    }

    /// Applies a transport failure for `turn`. Progression is untouched.
    pub fn on_responder_failure(&mut self, turn: &Turn, error: &TransportError) -> TurnOutcome {
        if !self.settle(turn) {
            return TurnOutcome::Stale;
        }
        debug!(%error, "Responder call failed");
        self.log
            .push(Message::bot(self.settings.texts.connection_error.clone()));
        TurnOutcome::Failed {
            progress: self.progress,
        }
    }

    pub fn complete<R: Rng + ?Sized>(
        &mut self,
        turn: &Turn,
        result: Result<&str, &TransportError>,
        rng: &mut R,
    ) -> TurnOutcome {
        match result {
            Ok(reply) => self.on_responder_success(turn, reply, rng),
            Err(error) => self.on_responder_failure(turn, error),
        }
    }

    /// Back to a single greeting with zeroed progression. Any in-flight
    /// ticket becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.log.clear();
        self.log
            .push(Message::bot(self.settings.texts.greeting.clone()));
        self.progress = Progress::default();
        self.pending = None;
        debug!(generation = self.generation, "Conversation reset");
    }

    /// Ends the pending call for `turn` and drops its placeholder. Returns
    /// false when `turn` is not the pending call.
    fn settle(&mut self, turn: &Turn) -> bool {
        match self.pending {
            Some(pending) if pending.generation == turn.generation => {}
            _ => {
                debug!(
                    generation = turn.generation,
                    current = self.generation,
                    "Discarding stale responder result"
                );
                return false;
            }
        }

        if let Some(pending) = self.pending.take() {
            let index = pending.placeholder;
            if index + 1 == self.log.len() && self.log[index].is_placeholder() {
                self.log.remove(index);
            } else {
                // Nothing may be appended while pending, so this is unreachable
                // unless the log was edited behind our back.
                self.log.retain(|m| !m.is_placeholder());
            }
        }
        true
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(ConversationSettings::default())
    }
}
