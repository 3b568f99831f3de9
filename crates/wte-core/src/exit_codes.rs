//! Exit codes for the `wte` CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.

use wte_common::Error;

use crate::pipeline::PipelineError;

/// Exit codes for `wte` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success, new rows archived or nothing to archive was requested
    Clean = 0,

    /// Run completed but the overview gained no rows
    NothingNew = 1,

    /// Configuration error
    ConfigError = 10,

    /// Store missing tables or unreadable
    StoreError = 11,

    /// Malformed raw or staged input
    InputError = 12,

    /// I/O error
    IoError = 13,

    /// Another run holds the store lock
    LockHeld = 14,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::NothingNew)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::Validation(_) => ExitCode::ConfigError,
            Error::MissingTable { .. } | Error::Store(_) => ExitCode::StoreError,
            Error::LockHeld { .. } => ExitCode::LockHeld,
            Error::MalformedInput { .. } => ExitCode::InputError,
            Error::Io(_) => ExitCode::IoError,
            Error::Json(_) => ExitCode::StoreError,
        }
    }
}

impl From<&PipelineError> for ExitCode {
    fn from(err: &PipelineError) -> Self {
        ExitCode::from(err.inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping() {
        assert_eq!(ExitCode::from(&Error::Config("x".into())), ExitCode::ConfigError);
        assert_eq!(
            ExitCode::from(&Error::malformed("AF", 2, "bad")),
            ExitCode::InputError
        );
        assert_eq!(
            ExitCode::from(&Error::LockHeld { path: "p".into() }),
            ExitCode::LockHeld
        );
    }

    #[test]
    fn success_and_error_ranges() {
        assert!(ExitCode::NothingNew.is_success());
        assert!(!ExitCode::NothingNew.is_error());
        assert!(ExitCode::StoreError.is_error());
        assert_eq!(i32::from(ExitCode::InternalError), 99);
    }
}
