//! Unified error taxonomy for the engine core.
//!
//! Every recoverable operation in the crate returns [`Result<T>`], never an
//! exception across the event loop boundary. Callers branch on
//! [`Error::code`]; the message and location are for logs/alerts.

use std::fmt;

/// Coarse error category. Callers match on this, not on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    OutOfRange,
    InvalidState,
    IoError,
    ParseError,
    ConfigError,
    BrokerError,
    NetworkError,
    TimeoutError,
    InternalError,
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `{code, message, source_location}` error record.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message} (at {source_location})")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub source_location: &'static str,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, source_location: &'static str) -> Self {
        Self {
            code,
            message: message.into(),
            source_location,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

/// Construct an [`Error`] tagging the call site automatically.
#[macro_export]
macro_rules! rf_err {
    ($code:expr, $($arg:tt)*) => {
        $crate::core::errors::Error::new($code, format!($($arg)*), concat!(file!(), ":", line!()))
    };
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_code_and_message() {
        let e = Error::new(ErrorCode::NotFound, "order 7 not found", "order_manager.rs:1");
        let s = e.to_string();
        assert!(s.contains("NotFound"));
        assert!(s.contains("order 7 not found"));
    }

    #[test]
    fn macro_tags_call_site() {
        let e = rf_err!(ErrorCode::InvalidArgument, "bad quantity {}", -1);
        assert_eq!(e.code, ErrorCode::InvalidArgument);
        assert!(e.source_location.contains("errors.rs"));
    }
}
