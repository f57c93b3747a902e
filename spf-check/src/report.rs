//! Rendering of a finished check.

use std::{fmt::Write, net::IpAddr};

use serde::Serialize;
use spf_policy::{AuditTrail, DirectiveMatch, SenderPolicy, SpfResult, record_unparse};

/// Everything printed about one check.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub ip: IpAddr,
    pub sender: &'a str,
    pub domain: &'a str,
    pub result: SpfResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub audit: &'a AuditTrail,
    pub matches: &'a [DirectiveMatch],
}

impl<'a> Report<'a> {
    /// Builds the report of a policy whose check has completed.
    pub fn new(policy: &'a SenderPolicy) -> Self {
        let outcome = policy.outcome();
        let context = policy.context();

        Self {
            ip: context.ip(),
            sender: context.sender(),
            domain: context.domain(),
            result: outcome.map_or(SpfResult::None, SpfResult::from),
            error: outcome.and_then(|outcome| outcome.as_ref().err()).map(|err| err.reason()),
            audit: policy.audit(),
            matches: policy.matches(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable form of the report.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        if self.result.is_error() {
            let _ = writeln!(out, "[-] check_host failed with error: {}", self.result);
            if let Some(reason) = self.error {
                let _ = writeln!(out, "[-]   {reason}");
            }
            return out;
        }

        if self.result == SpfResult::None {
            let _ = writeln!(out, "[*] no spf policy was found for the specified domain");
            return out;
        }

        let _ = writeln!(out, "[+] spf policy result: {}", self.result);
        let _ = writeln!(
            out,
            "[*] top level spf records found for {}:",
            self.audit.domain().unwrap_or(self.domain)
        );
        for (index, directive) in self.audit.directives().iter().enumerate() {
            let marker = if self.audit.matched_index() == Some(index) {
                "(matched)"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "[*]   #{} {marker: <10} {}",
                index + 1,
                record_unparse(directive)
            );
        }

        if !self.matches.is_empty() {
            let _ = writeln!(out, "[*] matching directives:");
            for matched in self.matches {
                let _ = writeln!(out, "[*]   {}: {}", matched.domain, matched.directive);
            }
        }
        out
    }
}
