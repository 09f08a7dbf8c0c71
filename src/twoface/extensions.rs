//! Convenience methods to turn errors (io, serde, anyhow...) and missing records into twoface errors.
use crate::twoface::{ExternalError, TfError};

pub trait Describe {
    /// Convert an error into a twoface::Error by describing it to your users.
    fn describe(self, external: ExternalError) -> TfError;
}

impl<Internal: Into<anyhow::Error>> Describe for Internal {
    fn describe(self, external: ExternalError) -> TfError {
        TfError {
            internal: self.into(),
            external,
        }
    }
}

/// Any regular internal error can be turned into a twoface Error, using the default external error.
/// If you want to give an internal error a custom external error, use `internal.describe(ExternalError)`
impl<Internal: Into<anyhow::Error>> From<Internal> for TfError {
    fn from(internal: Internal) -> TfError {
        internal.describe(Default::default())
    }
}

pub trait DescribeErr<T> {
    /// Same as `result.map_err(|e| e.describe(external))`.
    fn describe_err(self, external: ExternalError) -> Result<T, TfError>;
}

impl<T, E> DescribeErr<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn describe_err(self, external: ExternalError) -> Result<T, TfError> {
        self.map_err(|e| e.describe(external))
    }
}

pub trait DescribeNone<T> {
    /// Turn a missing value (usually a record that isn't in the datastore) into an error.
    fn describe_none(self, external: ExternalError) -> Result<T, TfError>;
}

impl<T> DescribeNone<T> for Option<T> {
    fn describe_none(self, external: ExternalError) -> Result<T, TfError> {
        self.ok_or_else(|| TfError::plain(external))
    }
}
