//! Error type shared by the log client, the store and the cursor.

/// Everything that can go wrong inside a poll cycle.
///
/// None of these are fatal: the poll core logs them and degrades the cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request failed or the server answered with a status other than
    /// success (or the tolerated 404 on the offset endpoint).
    #[error("network failure: {0}")]
    Network(String),

    /// The log service redirect did not look like `/channel/<c>/<y>/<m>/<d>`.
    #[error("unexpected log URL format: {0}")]
    Format(String),

    /// A persisted value could not be decoded.
    #[error("could not parse stored value for {key}: {reason}")]
    Parse { key: String, reason: String },

    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
