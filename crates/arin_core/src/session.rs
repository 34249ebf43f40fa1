//! Async driver around [`Conversation`].
//!
//! The session owns the state machine behind a mutex together with the
//! injected responder and store. The lock is never held across the responder
//! call, so `reset` from another task lands while a reply is in flight and
//! the late reply is dropped as stale. Persistence is best effort: failures
//! are logged and the conversation carries on.

use crate::conversation::{Conversation, ConversationSettings, Turn, TurnOutcome};
use crate::error::{SubmitError, TransportError};
use crate::{Message, Progress, ProgressStore, Responder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Snapshot for a front end to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub log: Vec<Message>,
    pub progress: Progress,
    pub threshold: u32,
    pub pending: bool,
    /// Index of the single message allowed to show its reaction.
    pub active_reaction: Option<usize>,
    pub unlock_code: String,
}

struct SessionState {
    conversation: Conversation,
    rng: StdRng,
}

pub struct Session {
    state: Mutex<SessionState>,
    responder: Arc<dyn Responder>,
    store: Arc<dyn ProgressStore>,
}

impl Session {
    /// Restore progression from `store` and start a session with an
    /// entropy-seeded effect roll.
    pub async fn start(
        settings: ConversationSettings,
        responder: Arc<dyn Responder>,
        store: Arc<dyn ProgressStore>,
    ) -> Self {
        Self::start_with_rng(settings, responder, store, StdRng::from_entropy()).await
    }

    pub async fn start_with_rng(
        settings: ConversationSettings,
        responder: Arc<dyn Responder>,
        store: Arc<dyn ProgressStore>,
        rng: StdRng,
    ) -> Self {
        let stored = match store.load().await {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Failed to load progression, starting fresh: {}", e);
                Progress::default()
            }
        };

        let conversation = Conversation::restore(settings, stored);
        let restored = conversation.progress();
        info!(
            count = restored.count,
            ended = restored.ended,
            "Session started"
        );

        if restored != stored {
            // Normalized on the way in; write the consistent pair back.
            persist(store.as_ref(), restored).await;
        }

        Self {
            state: Mutex::new(SessionState { conversation, rng }),
            responder,
            store,
        }
    }

    /// Submit `text` and wait for the reply to be applied.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, SubmitError> {
        let turn = self.begin(text).await?;
        Ok(self.dispatch(turn).await)
    }

    /// First half of [`submit`](Self::submit): validates and appends the user
    /// message and placeholder.
    pub async fn begin(&self, text: &str) -> Result<Turn, SubmitError> {
        let mut state = self.state.lock().await;
        state.conversation.submit_user_message(text).map_err(|e| {
            debug!(reason = %e, "Submit rejected");
            e
        })
    }

    /// Second half of [`submit`](Self::submit): calls the responder and
    /// applies the result.
    pub async fn dispatch(&self, turn: Turn) -> TurnOutcome {
        let result = self.responder.send(turn.text()).await;
        match &result {
            Ok(reply) => info!(generation = turn.generation(), len = reply.len(), "Reply received"),
            Err(e) => warn!(generation = turn.generation(), "Responder failed: {}", e),
        }
        self.complete(&turn, result).await
    }

    pub async fn complete(&self, turn: &Turn, result: Result<String, TransportError>) -> TurnOutcome {
        let mut state = self.state.lock().await;
        let SessionState { conversation, rng } = &mut *state;
        let outcome = conversation.complete(turn, result.as_deref(), rng);

        if outcome.changes_progress() {
            persist(self.store.as_ref(), conversation.progress()).await;
        }
        outcome
    }

    /// Fresh greeting, zeroed progression, persisted keys cleared.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.conversation.reset();
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear stored progression: {}", e);
        }
        info!("Session reset");
    }

    pub async fn progress(&self) -> Progress {
        self.state.lock().await.conversation.progress()
    }

    pub async fn view(&self) -> SessionView {
        let state = self.state.lock().await;
        let c = &state.conversation;
        SessionView {
            log: c.log().to_vec(),
            progress: c.progress(),
            threshold: c.threshold(),
            pending: c.is_pending(),
            active_reaction: c.active_reaction_index(),
            unlock_code: c.settings().texts.unlock_code.clone(),
        }
    }
}

async fn persist(store: &dyn ProgressStore, progress: Progress) {
    if let Err(e) = store.save(progress).await {
        warn!("Failed to persist progression: {}", e);
    }
}
