use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("an analysis write is already in flight")]
    WriteInFlight,

    #[error("no session token; run `adlaw login` first")]
    Unauthenticated,
}
