use std::panic::Location;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to allocate {size}-byte pointer cell")]
    AllocationFailure {
        size: usize,
        location: &'static Location<'static>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to bind native callable at {address:#x} as `{signature}`: {reason}")]
    InvalidBinding {
        address: usize,
        signature: &'static str,
        reason: String,
        location: &'static Location<'static>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorKind {
    AllocationFailure,
    InvalidBindingFailure,
    InvalidConfig,
    Io,
    Json,
}

impl Error {
    /// Allocation failure attributed to the caller's location.
    #[track_caller]
    pub fn allocation(size: usize, source: Option<BoxError>) -> Self {
        Error::AllocationFailure {
            size,
            location: Location::caller(),
            source,
        }
    }

    /// Binding failure attributed to the caller's location.
    #[track_caller]
    pub fn binding(address: usize, signature: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidBinding {
            address,
            signature,
            reason: reason.into(),
            location: Location::caller(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            Error::InvalidBinding { .. } => ErrorKind::InvalidBindingFailure,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
        }
    }

    /// Source location where the error was raised, when it was captured.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            Error::AllocationFailure { location, .. } | Error::InvalidBinding { location, .. } => {
                Some(*location)
            }
            _ => None,
        }
    }

    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_binding_error_message() {
        let err = Error::binding(0x401000, "extern \"C\" fn() -> i32", "null function address");
        assert_eq!(err.kind(), ErrorKind::InvalidBindingFailure);
        let msg = err.to_string();
        assert!(msg.contains("0x401000"));
        assert!(msg.contains("extern \"C\" fn() -> i32"));
        assert!(msg.contains("null function address"));
    }

    #[test]
    fn test_location_is_captured_at_call_site() {
        let line = line!() + 1;
        let err = Error::allocation(8, None);
        let location = err.location().unwrap();
        assert_eq!(location.file(), file!());
        assert_eq!(location.line(), line);
        assert!(Error::InvalidConfig("x".into()).location().is_none());
    }

    #[test]
    fn test_allocation_error_keeps_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "heap exhausted");
        let err = Error::allocation(8, Some(Box::new(cause)));
        assert_eq!(err.kind().to_string(), "AllocationFailure");
        assert_eq!(err.source().unwrap().to_string(), "heap exhausted");
    }
}
