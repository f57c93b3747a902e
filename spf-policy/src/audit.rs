//! Diagnostics collected while evaluating a policy.
//!
//! None of this affects the result; it exists so operators can see which
//! record and directive produced it.

use serde::Serialize;

use crate::record::{Directive, Record};

/// The directives of the top-level record and which of them matched.
///
/// Only the outermost record is tracked. When a top-level `redirect` is
/// followed as a fresh top-level record, the trail starts over with the
/// redirect target. A redirect after other directives keeps those
/// directives but makes the target the responsible domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditTrail {
    domain: Option<String>,
    directives: Vec<Directive>,
    matched: Option<usize>,
}

impl AuditTrail {
    pub(crate) fn begin(&mut self, domain: &str, directives: Vec<Directive>) {
        self.domain = Some(domain.to_string());
        self.directives = directives;
        self.matched = None;
    }

    /// Hands responsibility to a redirect target, keeping the directives.
    pub(crate) fn set_domain(&mut self, domain: &str) {
        self.domain = Some(domain.trim_end_matches('.').to_string());
    }

    pub(crate) fn set_matched(&mut self, index: usize) {
        self.matched = Some(index);
    }

    /// Domain whose record is responsible for the result.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Directives of the top-level record, in order.
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Index into [`Self::directives`] of the directive that matched.
    #[must_use]
    pub const fn matched_index(&self) -> Option<usize> {
        self.matched
    }

    #[must_use]
    pub fn matched(&self) -> Option<&Directive> {
        self.matched.and_then(|index| self.directives.get(index))
    }
}

/// A directive that matched, and the domain whose record it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveMatch {
    pub domain: String,
    pub directive: Directive,
}

/// Everything one evaluation records.
#[derive(Debug, Clone, Default)]
pub(crate) struct Diagnostics {
    pub(crate) trail: AuditTrail,
    /// Every record fetched, in fetch order
    pub(crate) records: Vec<(String, Record)>,
    /// Chain of matches from the top-level record to the deciding record
    pub(crate) matches: Vec<DirectiveMatch>,
}
