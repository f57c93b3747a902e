//! DNS resolution for SPF evaluation.
//!
//! The evaluator only talks to the [`Resolver`] trait. Two implementations
//! are provided:
//! - [`HickoryResolver`] queries live DNS through `hickory-resolver`
//! - [`MemoryResolver`] answers from an in-memory zone, for tests and
//!   offline diagnosis

mod hickory;
mod memory;

use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
};

use async_trait::async_trait;
use thiserror::Error;

pub use hickory::{DnsConfig, HickoryResolver, Upstream};
pub use memory::{MemoryResolver, Zone};

/// Errors that can occur during DNS resolution.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The name does not exist (NXDOMAIN) or has no records of the type.
    #[error("No records found for: {0}")]
    NotFound(String),

    /// DNS query failed due to network or resolver issues.
    #[error("DNS lookup failed: {0}")]
    LookupFailed(#[from] hickory_resolver::ResolveError),

    /// DNS query timed out.
    #[error("DNS query timed out for: {0}")]
    Timeout(String),

    /// The server refused or failed to answer (e.g. SERVFAIL).
    #[error("DNS server unavailable for: {0}")]
    Unavailable(String),
}

impl DnsError {
    /// Returns `true` if the query completed and there was simply nothing there.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this error is temporary and may succeed on retry.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        !self.is_not_found()
    }
}

/// DNS record types the evaluator queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Txt,
    A,
    Aaaa,
    Mx,
    Ptr,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Txt => "TXT",
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Mx => "MX",
            Self::Ptr => "PTR",
        })
    }
}

/// One TXT record: a sequence of character-strings.
///
/// Long SPF policies are published split over several character-strings,
/// which are concatenated without separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord(Vec<String>);

impl TxtRecord {
    #[must_use]
    pub const fn new(strings: Vec<String>) -> Self {
        Self(strings)
    }

    /// The individual character-strings.
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.0
    }

    /// The first character-string, which carries the version tag.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// All character-strings joined together.
    #[must_use]
    pub fn concat(&self) -> String {
        self.0.concat()
    }
}

impl From<&str> for TxtRecord {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for TxtRecord {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

/// Answers the queries an SPF evaluation needs.
///
/// Implementations must report a name that does not exist, or that has no
/// records of the requested type, as [`DnsError::NotFound`]. Every other
/// error is treated by the evaluator as a `TempError`. Retries, if any, are
/// the implementation's business.
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    /// TXT records for `name`.
    async fn txt_lookup(&self, name: &str) -> Result<Vec<TxtRecord>, DnsError>;

    /// A records for `name`.
    async fn ipv4_lookup(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsError>;

    /// AAAA records for `name`.
    async fn ipv6_lookup(&self, name: &str) -> Result<Vec<Ipv6Addr>, DnsError>;

    /// MX exchange host names for `name`, most preferred first.
    async fn mx_lookup(&self, name: &str) -> Result<Vec<String>, DnsError>;

    /// PTR targets for the reverse name `name` (already in `.arpa` form).
    async fn ptr_lookup(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// Lowercases a domain name and strips the root label.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_error_is_temporary() {
        assert!(DnsError::Timeout("example.com".to_string()).is_temporary());
        assert!(DnsError::Unavailable("example.com".to_string()).is_temporary());
        assert!(!DnsError::NotFound("example.com".to_string()).is_temporary());
        assert!(DnsError::NotFound("example.com".to_string()).is_not_found());
    }

    #[test]
    fn test_txt_record_concat() {
        let record = TxtRecord::new(vec!["v=spf1 ip4:192.0.2.0/24 ".into(), "-all".into()]);
        assert_eq!(record.first(), Some("v=spf1 ip4:192.0.2.0/24 "));
        assert_eq!(record.concat(), "v=spf1 ip4:192.0.2.0/24 -all");
        assert_eq!(record.strings().len(), 2);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Mail.Example.COM."), "mail.example.com");
        assert_eq!(normalize_name("example.com"), "example.com");
    }
}
