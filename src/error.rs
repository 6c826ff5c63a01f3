use thiserror::Error;

/// Failure fetching a source page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{0}")]
    Other(String),
}

/// Datastore configuration could not be resolved.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing datastore configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid datastore configuration: {0}")]
    Invalid(String),
}

/// Failure writing a record to a datastore.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("datastore returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected datastore response: {0}")]
    Unexpected(String),
}
