//! In-memory DNS answers.
//!
//! Used by tests and by `spf-check --zone` to evaluate policies offline.

use std::{
    collections::{HashMap, HashSet},
    net::{Ipv4Addr, Ipv6Addr},
    sync::RwLock,
};

use async_trait::async_trait;
use serde::Deserialize;

use super::{DnsError, QueryType, Resolver, TxtRecord, normalize_name};

/// Static DNS data served by a [`MemoryResolver`].
///
/// Zone files are written in RON:
/// ```ron
/// (
///     txt: {
///         "example.com": ["v=spf1 mx include:_spf.example.net -all"],
///     },
///     a: {
///         "mail.example.com": ["192.0.2.10"],
///     },
///     mx: {
///         "example.com": ["mail.example.com"],
///     },
///     failures: ["broken.example.org"],
/// )
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Zone {
    /// TXT records by name, one character-string per record
    #[serde(default)]
    pub txt: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub a: HashMap<String, Vec<Ipv4Addr>>,

    #[serde(default)]
    pub aaaa: HashMap<String, Vec<Ipv6Addr>>,

    /// MX exchanges by name, most preferred first
    #[serde(default)]
    pub mx: HashMap<String, Vec<String>>,

    /// PTR targets by reverse name (`4.3.2.1.in-addr.arpa`)
    #[serde(default)]
    pub ptr: HashMap<String, Vec<String>>,

    /// Names for which every query fails as if the server were unreachable
    #[serde(default)]
    pub failures: HashSet<String>,
}

/// In-memory resolver.
///
/// Answers from a fixed [`Zone`] and records every query it receives, which
/// lets tests assert on exactly what an evaluation asked for. Unknown names
/// are reported as [`DnsError::NotFound`]; names listed as failures are
/// reported as [`DnsError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryResolver {
    txt: HashMap<String, Vec<TxtRecord>>,
    a: HashMap<String, Vec<Ipv4Addr>>,
    aaaa: HashMap<String, Vec<Ipv6Addr>>,
    mx: HashMap<String, Vec<String>>,
    ptr: HashMap<String, Vec<String>>,
    failures: HashSet<String>,
    queries: RwLock<Vec<(QueryType, String)>>,
}

impl MemoryResolver {
    /// Creates an empty resolver; every name is NXDOMAIN.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver serving the given zone.
    #[must_use]
    pub fn from_zone(zone: Zone) -> Self {
        let mut resolver = Self::new();
        for (name, values) in zone.txt {
            for value in values {
                resolver = resolver.with_txt(&name, &value);
            }
        }
        for (name, addrs) in zone.a {
            resolver.a.entry(normalize_name(&name)).or_default().extend(addrs);
        }
        for (name, addrs) in zone.aaaa {
            resolver.aaaa.entry(normalize_name(&name)).or_default().extend(addrs);
        }
        for (name, hosts) in zone.mx {
            for host in hosts {
                resolver = resolver.with_mx(&name, &host);
            }
        }
        for (name, targets) in zone.ptr {
            for target in targets {
                resolver = resolver.with_ptr(&name, &target);
            }
        }
        for name in zone.failures {
            resolver = resolver.with_failure(&name);
        }
        resolver
    }

    /// Adds a single-string TXT record.
    #[must_use]
    pub fn with_txt(self, name: &str, value: &str) -> Self {
        self.with_txt_strings(name, &[value])
    }

    /// Adds a TXT record made of several character-strings.
    #[must_use]
    pub fn with_txt_strings(mut self, name: &str, strings: &[&str]) -> Self {
        let record = TxtRecord::new(strings.iter().map(ToString::to_string).collect());
        self.txt.entry(normalize_name(name)).or_default().push(record);
        self
    }

    #[must_use]
    pub fn with_a(mut self, name: &str, addr: Ipv4Addr) -> Self {
        self.a.entry(normalize_name(name)).or_default().push(addr);
        self
    }

    #[must_use]
    pub fn with_aaaa(mut self, name: &str, addr: Ipv6Addr) -> Self {
        self.aaaa.entry(normalize_name(name)).or_default().push(addr);
        self
    }

    /// Adds an MX exchange; exchanges are returned in insertion order.
    #[must_use]
    pub fn with_mx(mut self, name: &str, exchange: &str) -> Self {
        self.mx
            .entry(normalize_name(name))
            .or_default()
            .push(exchange.to_string());
        self
    }

    /// Adds a PTR target for a reverse name.
    #[must_use]
    pub fn with_ptr(mut self, reverse_name: &str, target: &str) -> Self {
        self.ptr
            .entry(normalize_name(reverse_name))
            .or_default()
            .push(target.to_string());
        self
    }

    /// Makes every query for `name` fail.
    #[must_use]
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failures.insert(normalize_name(name));
        self
    }

    /// Every query received so far, in order.
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn queries(&self) -> Vec<(QueryType, String)> {
        self.queries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of queries received so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn answer<T: Clone>(
        &self,
        table: &HashMap<String, Vec<T>>,
        qtype: QueryType,
        name: &str,
    ) -> Result<Vec<T>, DnsError> {
        let name = normalize_name(name);
        self.queries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((qtype, name.clone()));

        if self.failures.contains(&name) {
            return Err(DnsError::Unavailable(format!("{name} {qtype}")));
        }

        match table.get(&name) {
            Some(records) if !records.is_empty() => Ok(records.clone()),
            _ => Err(DnsError::NotFound(name)),
        }
    }
}

#[async_trait]
impl Resolver for MemoryResolver {
    async fn txt_lookup(&self, name: &str) -> Result<Vec<TxtRecord>, DnsError> {
        self.answer(&self.txt, QueryType::Txt, name)
    }

    async fn ipv4_lookup(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsError> {
        self.answer(&self.a, QueryType::A, name)
    }

    async fn ipv6_lookup(&self, name: &str) -> Result<Vec<Ipv6Addr>, DnsError> {
        self.answer(&self.aaaa, QueryType::Aaaa, name)
    }

    async fn mx_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.answer(&self.mx, QueryType::Mx, name)
    }

    async fn ptr_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.answer(&self.ptr, QueryType::Ptr, name)
    }
}
