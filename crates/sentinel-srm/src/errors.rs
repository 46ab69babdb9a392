//! Access-control error taxonomy
//!
//! Every authorization outcome is resolved locally into one of these kinds and
//! turned into a protocol-level response. None of them is ever surfaced to the
//! peer as a transport exception.

use sentinel_core::ResponseResult;

/// Errors produced by the secure resource manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SrmError {
    /// Malformed registration or missing required argument.
    #[error("Invalid parameter: {message}")]
    InvalidParam {
        /// What was missing or malformed
        message: String,
    },

    /// Secure resource requested over an unauthenticated channel.
    #[error("Forbidden: secure resource requires an authenticated channel")]
    Forbidden,

    /// ACL lookup denied the request.
    #[error("Unauthorized")]
    Unauthorized,

    /// Request could not be evaluated, or an internal contract was violated.
    #[error("Internal server error: {message}")]
    InternalServerError {
        /// Failure description
        message: String,
    },

    /// Allocation failed while copying request data.
    #[error("Out of memory")]
    NoMemory,
}

impl SrmError {
    /// Create an invalid parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParam {
            message: message.into(),
        }
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalServerError {
            message: message.into(),
        }
    }

    /// Response code a peer observes for this error.
    pub fn response_result(&self) -> ResponseResult {
        match self {
            SrmError::Forbidden => ResponseResult::Forbidden,
            SrmError::Unauthorized => ResponseResult::Unauthorized,
            SrmError::InvalidParam { .. }
            | SrmError::InternalServerError { .. }
            | SrmError::NoMemory => ResponseResult::InternalServerError,
        }
    }
}

impl From<std::collections::TryReserveError> for SrmError {
    fn from(_: std::collections::TryReserveError) -> Self {
        SrmError::NoMemory
    }
}

/// Result type for secure resource manager operations
pub type SrmResult<T> = std::result::Result<T, SrmError>;
