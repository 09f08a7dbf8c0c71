//! `twoface::Error` wraps a Rust error type with a user-facing description. This stops users from
//! seeing internal errors, like the path of the snapshot file or the io error that broke a write.

mod extensions;
pub mod externalerror;
mod integrations;

pub use extensions::*;
pub use externalerror::{Cause, ExternalError};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Wraps a Rust error type with a user-facing description. This stops users from seeing your internal
/// errors, which might contain sensitive implementation details that should be kept private.
#[derive(Debug)]
pub struct TfError {
    /// The underlying error, from some function. May contain sensitive information, so it should
    /// not be shown to users.
    pub internal: anyhow::Error,
    /// A user-friendly error that doesn't contain any sensitive information.
    pub external: ExternalError,
}

impl TfError {
    /// An error whose internal and external descriptions are the same, for refusals that
    /// don't hide anything (validation failures, missing records).
    pub fn plain(external: ExternalError) -> Self {
        Self {
            internal: anyhow::anyhow!("{}", external),
            external,
        }
    }
}

/// Displaying a twoface::Error will only display the external section. The internal error remains
/// private.
impl Display for TfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), fmt::Error> {
        write!(f, "{}", self.external)
    }
}

/// Return type of a function that could fail. If it fails, it includes a twoface error (an error with
/// both internal- and external-facing values).
pub type Fallible<T> = Result<T, TfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_external_part_is_shown() {
        let io_err = std::fs::read("secret-filename-do-not-leak-to-user").unwrap_err();
        let err = io_err.describe(ExternalError {
            cause: Cause::ServerError,
            text: "Could not save data",
        });
        assert_eq!(err.to_string(), "ServerError: Could not save data");
        assert!(format!("{:#}", err.internal).contains("No such file"));
    }

    #[test]
    fn test_plain_errors() {
        let err = TfError::plain(ExternalError::invalid_field("Login already taken"));
        assert_eq!(err.external.cause, Cause::UserInvalidField);
        assert_eq!(err.internal.to_string(), "UserInvalidField: Login already taken");
    }
}
