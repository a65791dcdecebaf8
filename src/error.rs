use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Rejected: {0}")]
    ValidationRejected(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification for callers that map errors onto a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    InvalidArgument,
    ValidationRejected,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::ValidationRejected => "validation_rejected",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::NotFound => ErrorKind::NotFound,
            LibraryError::Unauthorized => ErrorKind::Unauthorized,
            LibraryError::Forbidden => ErrorKind::Forbidden,
            LibraryError::Conflict(_) => ErrorKind::Conflict,
            LibraryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LibraryError::ValidationRejected(_) => ErrorKind::ValidationRejected,
            LibraryError::Database(_) | LibraryError::Pool(_) | LibraryError::Json(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;
