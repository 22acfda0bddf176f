use shared::error::CoordinateError;
use thiserror::Error;

/// Rejected inside the core; no request is issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("a search center is required")]
    MissingCenter,
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    #[error("radius {0} km is outside (0, {max}]", max = crate::search::MAX_RADIUS_KM)]
    Radius(f64),
    #[error("{operation} is not allowed while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::Server { status: 404, .. })
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if err.is_decode() => DirectoryError::Server {
                status: status.as_u16(),
                message: format!("invalid response body: {err}"),
            },
            Some(status) => DirectoryError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => DirectoryError::Server {
                status: 200,
                message: format!("invalid response body: {err}"),
            },
            None => DirectoryError::Network(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocatorError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

impl LocatorError {
    pub fn is_validation(&self) -> bool {
        matches!(self, LocatorError::Validation(_))
    }

    /// Network failures and 5xx responses may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::Validation(_) => false,
            LocatorError::Network(_) => true,
            LocatorError::Server { status, .. } => *status >= 500,
        }
    }

    /// Short text suitable for a user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            LocatorError::Validation(err) => err.to_string(),
            LocatorError::Network(_) => "Unable to reach the directory service".to_string(),
            LocatorError::Server { message, .. } => message.clone(),
        }
    }
}

impl From<DirectoryError> for LocatorError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Network(message) => LocatorError::Network(message),
            DirectoryError::Server { status, message } => LocatorError::Server { status, message },
        }
    }
}

impl From<CoordinateError> for LocatorError {
    fn from(err: CoordinateError) -> Self {
        LocatorError::Validation(ValidationError::Coordinate(err))
    }
}

pub type LocatorResult<T> = std::result::Result<T, LocatorError>;
