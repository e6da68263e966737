use thiserror::Error;

/// Message shown to the user for any failure that has no more specific wording.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "An error occurred: Please contact the system administrator for assistance.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("export failed: {0}")]
    Export(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// A missing remote record. Callers use this to take their fallback path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Fixed wording surfaced to the user. Server failures share one message
    /// regardless of cause.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "The requested record was not found.",
            AppError::Config(_) => "The application is not configured. Check your settings.",
            AppError::NotAuthenticated(_) => "You are signed out. Please sign in again.",
            AppError::Export(_) => "Export failed. Please try again.",
            AppError::Io(_) | AppError::Json(_) => "Local data could not be read or written.",
            AppError::Transport(_) | AppError::Server { .. } | AppError::Decode(_) => {
                GENERIC_FAILURE_MESSAGE
            }
        }
    }
}
