//! Mock responder: canned replies for playing offline.

use arin_core::{Responder, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const CANNED_REPLIES: &[&str] = &[
    "Oh, hi! What would you like to talk about?",
    "Hehe~ you always know what to say.",
    "Hmm, tell me more about that.",
    "That makes me really happy～",
    "I was just thinking about you~",
    "Interesting! I had never thought of it that way.",
];

/// Cycles through a fixed list of replies, some of which carry a tilde.
#[derive(Debug)]
pub struct MockResponder {
    replies: Vec<String>,
    next: AtomicUsize,
    delay: Duration,
}

impl MockResponder {
    pub fn new(replies: Vec<String>, delay: Duration) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
            delay,
        }
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new(
            CANNED_REPLIES.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(400),
        )
    }
}

#[async_trait::async_trait]
impl Responder for MockResponder {
    async fn send(&self, _text: &str) -> Result<String, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.replies.is_empty() {
            return Err(TransportError::Rejected);
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        Ok(self.replies[i].clone())
    }
}
