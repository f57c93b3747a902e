//! Evaluation settings.

use std::time::Duration;

use serde::Deserialize;

use crate::{budget::DEFAULT_QUERY_LIMIT, context::DEFAULT_HELO_DOMAIN, dns::DnsConfig};

/// Configuration for SPF evaluation.
///
/// Every field has a default, so an empty RON document is a valid config:
/// ```ron
/// (
///     query_limit: 10,
///     helo_domain: "mx.example.net",
///     timeout_secs: Some(20),
///     dns: (
///         timeout_secs: 5,
///         upstream: Cloudflare,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SpfConfig {
    /// DNS queries allowed per evaluation (default: 10)
    #[serde(default = "default_query_limit")]
    pub query_limit: u32,

    /// HELO identity used by the `h` macro (default: "unknown")
    #[serde(default = "default_helo_domain")]
    pub helo_domain: String,

    /// Wall-clock limit for a whole evaluation in seconds
    /// If not set, only the per-query DNS timeouts apply
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Settings for the live DNS resolver
    #[serde(default)]
    pub dns: DnsConfig,
}

const fn default_query_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

fn default_helo_domain() -> String {
    DEFAULT_HELO_DOMAIN.to_string()
}

impl Default for SpfConfig {
    fn default() -> Self {
        Self {
            query_limit: default_query_limit(),
            helo_domain: default_helo_domain(),
            timeout_secs: None,
            dns: DnsConfig::default(),
        }
    }
}

impl SpfConfig {
    /// Overall evaluation deadline, if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::Upstream;

    #[test]
    fn test_spf_config_defaults() {
        let config = SpfConfig::default();
        assert_eq!(config.query_limit, 10);
        assert_eq!(config.helo_domain, "unknown");
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_spf_config_from_ron() {
        let config: SpfConfig = ron::from_str(
            r#"(
                query_limit: 20,
                helo_domain: "mx.example.net",
                timeout_secs: Some(30),
                dns: (upstream: Quad9),
            )"#,
        )
        .unwrap();

        assert_eq!(config.query_limit, 20);
        assert_eq!(config.helo_domain, "mx.example.net");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.dns.upstream, Upstream::Quad9);
        assert_eq!(config.dns.timeout_secs, 5);
    }

    #[test]
    fn test_spf_config_empty_document() {
        let config: SpfConfig = ron::from_str("()").unwrap();
        assert_eq!(config.query_limit, DEFAULT_QUERY_LIMIT);
    }
}
