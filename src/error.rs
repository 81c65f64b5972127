use thiserror::Error;

/// Errors surfaced by planner operations.
///
/// Row-level validation problems during import are not represented here;
/// they are collected as messages on the import outcome so the rest of the
/// file still loads.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error for key `{key}`: {reason}")]
    Storage { key: String, reason: String },

    #[error("GitHub request failed with status {status}: {message}")]
    Transport { status: u16, message: String },

    #[error("campaign `{0}` is locked; unlock it before editing")]
    Locked(String),

    #[error("unknown campaign `{0}`")]
    UnknownCampaign(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PlannerError {
    fn from(e: reqwest::Error) -> Self {
        PlannerError::Transport {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
