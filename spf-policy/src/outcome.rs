//! Result values of an SPF evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SpfError;

/// Successful outcome of `check_host`.
///
/// The four qualifier outcomes come from a matching directive (or the
/// `Neutral` default); `None` means the domain publishes no policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyOutcome {
    Pass,
    Fail,
    SoftFail,
    Neutral,
    None,
}

impl PolicyOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::SoftFail => "softfail",
            Self::Neutral => "neutral",
            Self::None => "none",
        }
    }
}

impl fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The seven-valued result defined in RFC 7208 section 2.6.
///
/// Convenient for callers that record the result (for instance in an
/// `Authentication-Results` header) rather than branch on the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpfResult {
    Pass,
    Fail,
    SoftFail,
    Neutral,
    None,
    PermError,
    TempError,
}

impl SpfResult {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::SoftFail => "softfail",
            Self::Neutral => "neutral",
            Self::None => "none",
            Self::PermError => "permerror",
            Self::TempError => "temperror",
        }
    }

    /// Returns `true` for the two terminal failure results.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::PermError | Self::TempError)
    }
}

impl fmt::Display for SpfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PolicyOutcome> for SpfResult {
    fn from(outcome: PolicyOutcome) -> Self {
        match outcome {
            PolicyOutcome::Pass => Self::Pass,
            PolicyOutcome::Fail => Self::Fail,
            PolicyOutcome::SoftFail => Self::SoftFail,
            PolicyOutcome::Neutral => Self::Neutral,
            PolicyOutcome::None => Self::None,
        }
    }
}

impl From<&SpfError> for SpfResult {
    fn from(error: &SpfError) -> Self {
        match error {
            SpfError::PermError(_) => Self::PermError,
            SpfError::TempError(_) => Self::TempError,
        }
    }
}

impl From<&Result<PolicyOutcome, SpfError>> for SpfResult {
    fn from(result: &Result<PolicyOutcome, SpfError>) -> Self {
        match result {
            Ok(outcome) => (*outcome).into(),
            Err(error) => error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(PolicyOutcome::SoftFail.to_string(), "softfail");
        assert_eq!(PolicyOutcome::None.to_string(), "none");
    }

    #[test]
    fn test_result_from_error() {
        let result: Result<PolicyOutcome, SpfError> = Err(SpfError::perm("bad record"));
        assert_eq!(SpfResult::from(&result), SpfResult::PermError);
        assert!(SpfResult::from(&result).is_error());

        let result: Result<PolicyOutcome, SpfError> = Ok(PolicyOutcome::Fail);
        assert_eq!(SpfResult::from(&result), SpfResult::Fail);
        assert!(!SpfResult::Fail.is_error());
    }
}
