use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub version: u32,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// The backend enqueues the quote computation and answers immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteAck {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}
