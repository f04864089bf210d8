use thiserror::Error;

/// Top-level application error. All variants carry a human-readable message
/// for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── History API errors ───────────────────────────────────────────────────
    #[error("Request to history API failed: {message}")]
    HttpRequestFailed {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Session expired. Please log in again.")]
    Unauthorized,

    #[error("Not authorized to access history entry '{id}'")]
    Forbidden { id: i64 },

    #[error("History entry '{id}' not found")]
    EntryNotFound { id: i64 },

    #[error("History API returned status {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to decode history API response: {message}")]
    DecodeFailed { message: String },

    // ── Session cache errors ─────────────────────────────────────────────────
    #[error("Session cache at '{path}' failed: {message}")]
    SessionCacheFailed {
        path: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    // ── Conversation errors ──────────────────────────────────────────────────
    #[error("Conversation '{id}' not found")]
    ConversationNotFound { id: String },

    /// Some but not all entries of a conversation were deleted. The local
    /// state is left untouched; the caller retries `remaining` or tells the
    /// user. The removed conversation is only dropped locally once every
    /// entry deletion succeeded.
    #[error(
        "Deleted {deleted} entries for conversation '{conversation_id}', {} still to delete",
        .remaining.len()
    )]
    PartialDelete {
        conversation_id: String,
        deleted: usize,
        remaining: Vec<i64>,
        #[source]
        source: Box<AppError>,
    },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn http(message: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::HttpRequestFailed { message: message.into(), source }
    }

    pub fn session_cache(
        path: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        AppError::SessionCacheFailed {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::ConversationNotFound { .. } | AppError::EntryNotFound { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. } | AppError::FieldTooLong { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Unauthorized | AppError::Forbidden { .. })
    }
}
