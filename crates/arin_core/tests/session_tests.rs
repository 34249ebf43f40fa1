//! Integration tests for the Session driver.
//!
//! A scripted responder and an in-memory store stand in for the HTTP client
//! and SQLite, so the full submit → reply → persist pipeline runs without I/O.

use anyhow::Result;
use arin_core::{
    ConversationSettings, PersistenceError, Progress, ProgressStore, Responder, Sender, Session,
    SubmitError, TransportError, TurnOutcome,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::{Mutex, Notify};

// ============================================================================
// Mock Responder
// ============================================================================

/// Pops pre-configured results in order; an exhausted queue replies "ok".
struct ScriptedResponder {
    replies: Mutex<Vec<Result<String, TransportError>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedResponder {
    fn new(replies: Vec<Result<String, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn always(text: &str, n: usize) -> Self {
        Self::new((0..n).map(|_| Ok(text.to_string())).collect())
    }

    /// Every call blocks until `gate` is notified.
    fn gated(replies: Vec<Result<String, TransportError>>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(replies)
        }
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn send(&self, _text: &str) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut queue = self.replies.lock().await;
        if queue.is_empty() {
            Ok("ok".to_string())
        } else {
            queue.remove(0)
        }
    }
}

// ============================================================================
// Mock Store
// ============================================================================

#[derive(Default)]
struct MockStore {
    saved: Mutex<Option<Progress>>,
    saves: AtomicUsize,
    clears: AtomicUsize,
    broken: bool,
}

impl MockStore {
    fn with(progress: Progress) -> Self {
        Self {
            saved: Mutex::new(Some(progress)),
            ..Default::default()
        }
    }

    fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    async fn current(&self) -> Option<Progress> {
        *self.saved.lock().await
    }
}

#[async_trait]
impl ProgressStore for MockStore {
    async fn load(&self) -> Result<Progress, PersistenceError> {
        if self.broken {
            return Err(PersistenceError::Backend("disk on fire".into()));
        }
        Ok(self.saved.lock().await.unwrap_or_default())
    }

    async fn save(&self, progress: Progress) -> Result<(), PersistenceError> {
        if self.broken {
            return Err(PersistenceError::Backend("disk on fire".into()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().await = Some(progress);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        if self.broken {
            return Err(PersistenceError::Backend("disk on fire".into()));
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().await = None;
        Ok(())
    }
}

async fn session(responder: ScriptedResponder, store: Arc<MockStore>) -> Session {
    Session::start_with_rng(
        ConversationSettings::default(),
        Arc::new(responder),
        store,
        StdRng::seed_from_u64(3),
    )
    .await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_plain_reply_leaves_progress_alone() -> Result<()> {
    let store = Arc::new(MockStore::default());
    let s = session(ScriptedResponder::always("hello!", 1), store.clone()).await;

    let outcome = s.submit("hi").await?;
    assert!(!outcome.changes_progress());

    let view = s.view().await;
    assert_eq!(view.progress, Progress::default());
    assert_eq!(view.log.len(), 3);
    assert_eq!(view.active_reaction, None);
    assert!(!view.pending);
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_trigger_is_persisted() -> Result<()> {
    let store = Arc::new(MockStore::default());
    let s = session(ScriptedResponder::always("hehe~", 2), store.clone()).await;

    s.submit("hi").await?;
    s.submit("again").await?;

    assert_eq!(store.current().await, Some(Progress::new(2, false)));
    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_ten_triggers_unlock_and_lock_out() -> Result<()> {
    let store = Arc::new(MockStore::default());
    let s = session(ScriptedResponder::always("好呀～", 10), store.clone()).await;

    for i in 0..10 {
        s.submit(&format!("message {i}")).await?;
    }

    let view = s.view().await;
    assert_eq!(view.progress, Progress::new(10, true));
    let notices = view
        .log
        .iter()
        .filter(|m| m.sender == Sender::System && m.content.contains(&view.unlock_code))
        .count();
    assert_eq!(notices, 1);
    assert_eq!(store.current().await, Some(Progress::new(10, true)));

    assert_eq!(s.submit("one more").await, Err(SubmitError::Ended));
    assert_eq!(s.view().await.log.len(), view.log.len());
    Ok(())
}

#[tokio::test]
async fn test_failure_appends_single_error_message() -> Result<()> {
    let store = Arc::new(MockStore::default());
    let responder = ScriptedResponder::new(vec![Err(TransportError::Network("refused".into()))]);
    let s = session(responder, store).await;

    let outcome = s.submit("hi").await?;
    assert!(matches!(outcome, TurnOutcome::Failed { .. }));

    let view = s.view().await;
    assert_eq!(view.log.len(), 3);
    assert!(view.log.iter().all(|m| !m.is_placeholder()));
    assert!(view.log[2].content.starts_with("Connection error"));
    assert!(!view.pending);

    // recoverable: the next submit goes through
    s.submit("retry").await?;
    Ok(())
}

#[tokio::test]
async fn test_all_transport_errors_look_the_same() -> Result<()> {
    let errors = vec![
        Err(TransportError::Status { status: 500 }),
        Err(TransportError::Rejected),
        Err(TransportError::Malformed("not json".into())),
    ];
    let s = session(ScriptedResponder::new(errors), Arc::new(MockStore::default())).await;

    for text in ["a", "b", "c"] {
        s.submit(text).await?;
    }
    let view = s.view().await;
    let bodies: Vec<_> = view
        .log
        .iter()
        .filter(|m| m.content.starts_with("Connection error"))
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    Ok(())
}

#[tokio::test]
async fn test_restore_normalizes_and_writes_back() {
    let store = Arc::new(MockStore::with(Progress::new(10, false)));
    let s = session(ScriptedResponder::always("x", 0), store.clone()).await;

    assert!(s.progress().await.ended);
    assert_eq!(store.current().await, Some(Progress::new(10, true)));
    assert_eq!(s.submit("hello").await, Err(SubmitError::Ended));
}

#[tokio::test]
async fn test_restore_keeps_counter_but_not_log() {
    let store = Arc::new(MockStore::with(Progress::new(4, false)));
    let s = session(ScriptedResponder::always("x", 0), store.clone()).await;

    let view = s.view().await;
    assert_eq!(view.progress, Progress::new(4, false));
    assert_eq!(view.log.len(), 1);
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_broken_store_never_blocks() -> Result<()> {
    let s = session(ScriptedResponder::always("hi~", 1), Arc::new(MockStore::broken())).await;

    assert_eq!(s.progress().await, Progress::default());
    s.submit("hello").await?;
    assert_eq!(s.progress().await.count, 1);
    s.reset().await;
    assert_eq!(s.progress().await, Progress::default());
    Ok(())
}

#[tokio::test]
async fn test_reset_clears_store() -> Result<()> {
    let store = Arc::new(MockStore::default());
    let s = session(ScriptedResponder::always("~", 1), store.clone()).await;

    s.submit("hi").await?;
    s.reset().await;

    assert_eq!(store.current().await, None);
    assert_eq!(store.clears.load(Ordering::SeqCst), 1);
    let view = s.view().await;
    assert_eq!(view.log.len(), 1);
    assert_eq!(view.progress, Progress::default());
    Ok(())
}

#[tokio::test]
async fn test_busy_while_reply_in_flight() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let responder = ScriptedResponder::gated(vec![Ok("done".into())], gate.clone());
    let s = Arc::new(session(responder, Arc::new(MockStore::default())).await);

    let turn = s.begin("first").await?;
    let in_flight = tokio::spawn({
        let s = s.clone();
        async move { s.dispatch(turn).await }
    });

    assert_eq!(s.begin("second").await, Err(SubmitError::Busy));
    let view = s.view().await;
    assert!(view.pending);
    assert!(view.log.last().unwrap().is_placeholder());

    gate.notify_one();
    let outcome = in_flight.await?;
    assert!(matches!(outcome, TurnOutcome::Replied { .. }));
    assert!(!s.view().await.pending);
    Ok(())
}

#[tokio::test]
async fn test_reply_after_reset_is_discarded() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let responder = ScriptedResponder::gated(vec![Ok("late~".into())], gate.clone());
    let store = Arc::new(MockStore::default());
    let s = Arc::new(session(responder, store.clone()).await);

    let turn = s.begin("hi").await?;
    let in_flight = tokio::spawn({
        let s = s.clone();
        async move { s.dispatch(turn).await }
    });

    s.reset().await;
    gate.notify_one();

    assert_eq!(in_flight.await?, TurnOutcome::Stale);
    let view = s.view().await;
    assert_eq!(view.log.len(), 1);
    assert_eq!(view.progress, Progress::default());
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    Ok(())
}
