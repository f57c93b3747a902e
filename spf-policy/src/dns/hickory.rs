//! Live DNS resolution through `hickory-resolver`.

use std::{
    future::Future,
    net::{Ipv4Addr, Ipv6Addr},
    time::Duration,
};

use async_trait::async_trait;
use hickory_resolver::{
    ResolveError, TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::rr::{RData, RecordType},
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DnsError, QueryType, Resolver, TxtRecord};

/// Which nameservers to send queries to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Upstream {
    /// Whatever the host is configured with (`/etc/resolv.conf`).
    #[default]
    System,
    Cloudflare,
    Google,
    Quad9,
}

/// Configuration for the DNS resolver.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// Per-attempt query timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of attempts per query before giving up (default: 2)
    #[serde(default = "default_attempts")]
    pub attempts: usize,

    /// Nameservers to use (default: System)
    #[serde(default)]
    pub upstream: Upstream,
}

const fn default_timeout_secs() -> u64 {
    5
}

const fn default_attempts() -> usize {
    2
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            attempts: default_attempts(),
            upstream: Upstream::default(),
        }
    }
}

impl DnsConfig {
    /// Hard cap on one query including all of its attempts.
    #[must_use]
    pub fn query_deadline(&self) -> Duration {
        let attempts = u64::try_from(self.attempts.max(1)).unwrap_or(u64::MAX);
        Duration::from_secs(self.timeout_secs.saturating_mul(attempts.saturating_add(1)))
    }

    fn resolver_opts(&self) -> ResolverOpts {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(self.timeout_secs);
        opts.attempts = self.attempts;
        opts
    }
}

/// Resolver backed by `hickory-resolver`'s tokio resolver.
#[derive(Debug)]
pub struct HickoryResolver {
    resolver: TokioResolver,
    config: DnsConfig,
}

impl HickoryResolver {
    /// Creates a resolver using the system configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new() -> Result<Self, DnsError> {
        Self::with_dns_config(DnsConfig::default())
    }

    /// Creates a resolver with custom DNS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration is requested and
    /// cannot be loaded.
    pub fn with_dns_config(dns_config: DnsConfig) -> Result<Self, DnsError> {
        let opts = dns_config.resolver_opts();
        let upstream = match dns_config.upstream {
            Upstream::System => {
                let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
                    .with_options(opts)
                    .build();
                return Ok(Self {
                    resolver,
                    config: dns_config,
                });
            }
            Upstream::Cloudflare => ResolverConfig::cloudflare(),
            Upstream::Google => ResolverConfig::google(),
            Upstream::Quad9 => ResolverConfig::quad9(),
        };

        Ok(Self::with_resolver_config(upstream, opts, dns_config))
    }

    /// Creates a resolver with explicit hickory configuration.
    #[must_use]
    pub fn with_resolver_config(
        resolver_config: ResolverConfig,
        opts: ResolverOpts,
        dns_config: DnsConfig,
    ) -> Self {
        let resolver =
            TokioResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self {
            resolver,
            config: dns_config,
        }
    }

    /// Runs one lookup under the query deadline and classifies its failure.
    async fn run<T, F>(&self, name: &str, qtype: QueryType, lookup: F) -> Result<T, DnsError>
    where
        F: Future<Output = Result<T, ResolveError>> + Send,
    {
        debug!("Querying {qtype} for {name}");
        match tokio::time::timeout(self.config.query_deadline(), lookup).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(err)) if err.is_no_records_found() || err.is_nx_domain() => {
                debug!("No {qtype} records for {name}");
                Err(DnsError::NotFound(name.to_string()))
            }
            Ok(Err(err)) => {
                warn!("{qtype} lookup failed for {name}: {err}");
                Err(DnsError::LookupFailed(err))
            }
            Err(_) => {
                warn!("{qtype} lookup timed out for {name}");
                Err(DnsError::Timeout(format!("{name} {qtype}")))
            }
        }
    }
}

/// Names are queried fully qualified so search domains never apply.
fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

#[async_trait]
impl Resolver for HickoryResolver {
    async fn txt_lookup(&self, name: &str) -> Result<Vec<TxtRecord>, DnsError> {
        let lookup = self
            .run(name, QueryType::Txt, self.resolver.txt_lookup(fqdn(name)))
            .await?;

        Ok(lookup
            .iter()
            .map(|txt| {
                TxtRecord::new(
                    txt.txt_data()
                        .iter()
                        .map(|data| String::from_utf8_lossy(data).into_owned())
                        .collect(),
                )
            })
            .collect())
    }

    async fn ipv4_lookup(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsError> {
        let lookup = self
            .run(name, QueryType::A, self.resolver.ipv4_lookup(fqdn(name)))
            .await?;

        Ok(lookup.iter().map(|a| a.0).collect())
    }

    async fn ipv6_lookup(&self, name: &str) -> Result<Vec<Ipv6Addr>, DnsError> {
        let lookup = self
            .run(name, QueryType::Aaaa, self.resolver.ipv6_lookup(fqdn(name)))
            .await?;

        Ok(lookup.iter().map(|aaaa| aaaa.0).collect())
    }

    async fn mx_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        let lookup = self
            .run(name, QueryType::Mx, self.resolver.mx_lookup(fqdn(name)))
            .await?;

        let mut exchanges: Vec<(u16, String)> = lookup
            .iter()
            .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
            .collect();

        // Sort by priority (lower number = higher priority)
        exchanges.sort_by_key(|(preference, _)| *preference);
        Ok(exchanges.into_iter().map(|(_, host)| host).collect())
    }

    async fn ptr_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        let lookup = self
            .run(
                name,
                QueryType::Ptr,
                self.resolver.lookup(fqdn(name), RecordType::PTR),
            )
            .await?;

        Ok(lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::PTR(ptr) => Some(ptr.0.to_utf8()),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_config_defaults() {
        let config = DnsConfig::default();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.attempts, 2);
        assert_eq!(config.upstream, Upstream::System);
        assert_eq!(config.query_deadline(), Duration::from_secs(15));
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(fqdn("example.com"), "example.com.");
        assert_eq!(fqdn("example.com."), "example.com.");
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_txt_lookup_gmail() {
        let resolver = HickoryResolver::new().unwrap();
        let records = resolver.txt_lookup("gmail.com").await.unwrap();

        assert!(
            records
                .iter()
                .any(|record| record.first().is_some_and(|s| s.starts_with("v=spf1 ")))
        );
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_domain_not_found() {
        let resolver = HickoryResolver::new().unwrap();
        let result = resolver
            .txt_lookup("this-domain-definitely-does-not-exist-12345.com")
            .await;

        assert!(matches!(result, Err(DnsError::NotFound(_))));
    }
}
