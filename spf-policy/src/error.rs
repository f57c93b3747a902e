//! Error types for SPF evaluation.
//!
//! RFC 7208 distinguishes two terminal error classes:
//! - `PermError` (section 2.6.7) - the published policy could not be interpreted
//! - `TempError` (section 2.6.6) - a transient, generally DNS, failure occurred
//!
//! Neither is retried by the evaluator.

use thiserror::Error;

use crate::dns::DnsError;

/// Errors that terminate an SPF evaluation.
///
/// Both variants carry a human readable reason for operator diagnostics.
/// The type is `Clone` so that a memoized evaluation can hand the same
/// failure back on every call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpfError {
    /// The domain's published policy is invalid. Never transient.
    #[error("permerror: {0}")]
    PermError(String),

    /// A DNS operation failed in a way that may succeed on retry.
    #[error("temperror: {0}")]
    TempError(String),
}

impl SpfError {
    pub(crate) fn perm(reason: impl Into<String>) -> Self {
        Self::PermError(reason.into())
    }

    pub(crate) fn temp(reason: impl Into<String>) -> Self {
        Self::TempError(reason.into())
    }

    /// Returns `true` if the policy itself is defective.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::PermError(_))
    }

    /// Returns `true` if the failure was transient.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::TempError(_))
    }

    /// The reason string without the error class prefix.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::PermError(reason) | Self::TempError(reason) => reason,
        }
    }
}

/// Every DNS failure that reaches the evaluator is a `TempError`.
///
/// `DnsError::NotFound` never gets here: the evaluator turns an empty answer
/// into "no records" before converting.
impl From<DnsError> for SpfError {
    fn from(error: DnsError) -> Self {
        Self::TempError(format!("dns resolution error ({error})"))
    }
}
