pub mod api_types;
pub mod providers;
pub mod retry;

pub use providers::http::HttpResponder;
pub use providers::mock::MockResponder;

use anyhow::Result;
use arin_core::{ArinConfig, Responder};
use std::sync::Arc;

/// Pick the responder named by the config.
pub fn build_responder(config: &ArinConfig) -> Result<Arc<dyn Responder>> {
    if config.responder.mock {
        tracing::info!("Using offline mock responder");
        return Ok(Arc::new(MockResponder::default()));
    }
    tracing::info!(endpoint = %config.responder.endpoint, "Using HTTP responder");
    let responder = HttpResponder::new(&config.responder, config.texts.empty_reply.clone())?;
    Ok(Arc::new(responder))
}
