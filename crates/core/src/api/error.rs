use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    Http { status: u16, body: String },
    Transport(reqwest::Error),
    Decode { detail: String },
    // Superseded or aborted; callers drop the result without touching state.
    Cancelled,
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub(crate) fn decode(err: serde_json::Error, body: &str) -> Self {
        let mut snippet = body.trim().to_string();
        if snippet.len() > 200 {
            snippet.truncate(200);
            snippet.push('…');
        }
        ApiError::Decode {
            detail: format!("{err}: {snippet}"),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            ApiError::Transport(err) => write!(f, "request failed: {err}"),
            ApiError::Decode { detail } => write!(f, "unexpected response shape: {detail}"),
            ApiError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            _ => None,
        }
    }
}
