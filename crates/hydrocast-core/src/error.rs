use thiserror::Error;

#[derive(Debug, Error)]
pub enum HydrocastError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown action kind: {0}")]
    UnknownActionKind(String),

    #[error("pre-action retries exhausted after stepping back {attempted_hours}h (bound: {max_hours}h)")]
    RetryExhausted {
        attempted_hours: i64,
        max_hours: i64,
    },

    #[error("invalid forecast date '{0}': expected 'YYYY-MM-DD HH'")]
    InvalidDate(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HydrocastError>;
