use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested record does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Error from filter codec or applied-filter state
    #[error("Filter error: {0}")]
    FilterError(#[from] FilterError),

    /// Error from the permission tree
    #[error("Permission error: {0}")]
    PermissionError(String),

    /// Invalid inventory state transition
    #[error("Invalid transition: {0}")]
    TransitionError(String),

    /// Error from storage operations
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AppError::NotFound { kind, id: id.to_string() }
    }

    /// Envelope code reported to the console for this error
    pub fn code(&self) -> u16 {
        match self {
            AppError::NotFound { .. } => 404,
            AppError::FilterError(_)
            | AppError::PermissionError(_)
            | AppError::TransitionError(_) => 400,
            AppError::StorageError(_) => 500,
        }
    }
}

/// Errors raised while collecting, converting or applying filter criteria
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid source IP '{0}'")]
    InvalidSourceIp(String),

    #[error("invalid severity level {0}, expected 0-7")]
    InvalidSeverity(i64),

    #[error("invalid event id '{0}'")]
    InvalidEventId(String),

    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("malformed stored field '{field}': {reason}")]
    MalformedRow { field: &'static str, reason: String },

    #[error("filter name must not be empty")]
    EmptyName,

    #[error("a filter is already being applied")]
    ApplyInProgress,
}

/// Errors from the key/value store that backs local filter state
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value for '{key}' is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for '{0}'")]
    Encode(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;

/// Errors from the saved-filter API client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Backend unreachable or answered with something that is not an envelope
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-200 envelope; `message` is shown as-is
    #[error("{message}")]
    Api { code: u16, message: String },

    #[error("response envelope carried no data")]
    EmptyResponse,

    #[error("{0}")]
    Filter(#[from] FilterError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("saved filter {0} not found")]
    NotFound(String),
}

impl ClientError {
    /// Failures that should send the caller to the local store
    pub fn is_unreachable(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
