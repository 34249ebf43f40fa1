use serde::{Deserialize, Serialize};

// Request payload
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

// Response payload
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(default)]
    pub response: Option<String>,
}
