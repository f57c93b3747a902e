//! The identity being checked by one evaluation.

use std::net::IpAddr;

use serde::Serialize;

/// HELO identity used when the caller does not supply one.
pub const DEFAULT_HELO_DOMAIN: &str = "unknown";

const DEFAULT_LOCAL_PART: &str = "postmaster";

/// Immutable inputs of one `check_host` evaluation.
///
/// The domain here is the one the caller asked about. The domain whose
/// record is currently being evaluated changes as `include` and `redirect`
/// are followed and is tracked by the evaluator instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationContext {
    ip: IpAddr,
    domain: String,
    sender: String,
    helo_domain: String,
}

impl EvaluationContext {
    /// Builds a context, normalizing the sender.
    ///
    /// A missing or empty sender becomes `postmaster@<domain>`; a sender
    /// without an `@` is taken as a local part at `domain`.
    #[must_use]
    pub fn new(ip: IpAddr, domain: &str, sender: Option<&str>) -> Self {
        let domain = domain.trim_end_matches('.').to_string();
        let sender = match sender.map(str::trim).filter(|s| !s.is_empty()) {
            Some(sender) if sender.contains('@') => sender.to_string(),
            Some(local) => format!("{local}@{domain}"),
            None => format!("{DEFAULT_LOCAL_PART}@{domain}"),
        };

        Self {
            ip,
            domain,
            sender,
            helo_domain: DEFAULT_HELO_DOMAIN.to_string(),
        }
    }

    #[must_use]
    pub fn with_helo_domain(mut self, helo_domain: &str) -> Self {
        self.helo_domain = helo_domain.to_string();
        self
    }

    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    #[must_use]
    pub fn helo_domain(&self) -> &str {
        &self.helo_domain
    }

    /// Everything before the first `@` of the sender.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.sender
            .split_once('@')
            .map_or(self.sender.as_str(), |(local, _)| local)
    }

    /// Everything after the first `@` of the sender.
    #[must_use]
    pub fn sender_domain(&self) -> &str {
        self.sender
            .split_once('@')
            .map_or(self.domain.as_str(), |(_, domain)| domain)
    }
}

/// Dotted form of an address as used by the `i` macro.
///
/// IPv4 is the usual dotted quad; IPv6 is the fully exploded address with
/// one label per nibble (`2.0.0.1.0.d.b.8...`).
#[must_use]
pub fn dotted_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => v6
            .octets()
            .iter()
            .flat_map(|octet| [octet >> 4, octet & 0x0f])
            .map(|nibble| format!("{nibble:x}"))
            .collect::<Vec<_>>()
            .join("."),
    }
}

/// `in-addr` for IPv4, `ip6` for IPv6 (the `v` macro).
#[must_use]
pub const fn ip_version_label(ip: IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "in-addr",
        IpAddr::V6(_) => "ip6",
    }
}

/// Name queried for PTR records of `ip`.
///
/// `4.3.2.1.in-addr.arpa` for `1.2.3.4`, reversed nibbles under `ip6.arpa`
/// for IPv6.
#[must_use]
pub fn reverse_name(ip: IpAddr) -> String {
    let dotted = dotted_ip(ip);
    let reversed = dotted.split('.').rev().collect::<Vec<_>>().join(".");
    format!("{reversed}.{}.arpa", ip_version_label(ip))
}
