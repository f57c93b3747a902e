//! Sender Policy Framework (RFC 7208) evaluation
//!
//! This crate provides:
//! - `check_host()`: the policy for an (IP, domain, sender) identity
//! - Parsing and rendering of SPF records and directives
//! - Macro expansion for mechanism arguments
//! - A `Resolver` seam with a live (hickory) and an in-memory implementation
//! - Diagnostics showing which record and directive produced a result

mod audit;
mod budget;
mod config;
mod context;
pub mod dns;
mod error;
pub mod macros;
mod mechanism;
mod outcome;
mod policy;
pub mod record;

use std::{net::IpAddr, sync::Arc};

pub use audit::{AuditTrail, DirectiveMatch};
pub use budget::{DEFAULT_QUERY_LIMIT, QueryBudget};
pub use config::SpfConfig;
pub use context::{DEFAULT_HELO_DOMAIN, EvaluationContext, dotted_ip, reverse_name};
pub use dns::{DnsConfig, DnsError, HickoryResolver, MemoryResolver, Resolver, Upstream, Zone};
pub use error::SpfError;
pub use macros::expand;
pub use outcome::{PolicyOutcome, SpfResult};
pub use policy::SenderPolicy;
pub use record::{Directive, Mechanism, Qualifier, Record, Term, parse_record, record_unparse};

/// Checks the SPF policy of `domain` for mail from `ip`.
///
/// # Errors
///
/// Returns `PermError` if the published policy is invalid and `TempError`
/// if DNS failed while evaluating it.
pub async fn check_host(
    resolver: Arc<dyn Resolver>,
    ip: IpAddr,
    domain: &str,
    sender: Option<&str>,
) -> Result<PolicyOutcome, SpfError> {
    SenderPolicy::new(resolver, ip, domain, sender)
        .check_host()
        .await
}

/// Returns `true` if `domain` publishes a policy and evaluating it gives a
/// definite result. Errors of either kind give `false`.
pub async fn validate_record(
    resolver: Arc<dyn Resolver>,
    ip: IpAddr,
    domain: &str,
    sender: Option<&str>,
) -> bool {
    matches!(
        check_host(resolver, ip, domain, sender).await,
        Ok(outcome) if outcome != PolicyOutcome::None
    )
}
