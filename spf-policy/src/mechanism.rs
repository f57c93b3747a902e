//! Match tests for individual mechanisms, RFC 7208 section 5.

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::debug;

use crate::{
    PolicyOutcome, SpfError,
    context::reverse_name,
    macros,
    policy::{Evaluation, Lookup},
    record::Mechanism,
};

impl Evaluation<'_> {
    /// Returns `true` if `mechanism` matches the client IP.
    ///
    /// `domain` is the domain whose record is being evaluated. It is the
    /// target of `a`, `mx` and `ptr` when they have no argument.
    pub(crate) async fn evaluate(
        &mut self,
        domain: &str,
        mechanism: Mechanism,
        argument: Option<&str>,
    ) -> Result<bool, SpfError> {
        let target = match argument {
            Some(argument) => macros::expand(argument, self.context, domain)?,
            None if mechanism.defaults_to_domain() => domain.to_string(),
            None if mechanism == Mechanism::All => String::new(),
            None => {
                return Err(SpfError::perm(format!(
                    "mechanism '{mechanism}' requires an argument"
                )));
            }
        };

        match mechanism {
            Mechanism::All => Ok(true),
            Mechanism::Ip4 | Mechanism::Ip6 => ip_matches(mechanism, &target, self.context.ip()),
            Mechanism::A => {
                let ip = self.context.ip();
                Ok(self.lookup_ips(&target).await?.contains(&ip))
            }
            Mechanism::Exists => Ok(!self.lookup_a(&target).await?.is_empty()),
            Mechanism::Mx => self.mx_matches(&target).await,
            Mechanism::Ptr => self.ptr_matches(&target).await,
            Mechanism::Include => {
                debug!("following include to: {target}");
                let outcome = self.check_record(target, false, Lookup::Include).await?;
                Ok(outcome == PolicyOutcome::Pass)
            }
        }
    }

    async fn mx_matches(&mut self, target: &str) -> Result<bool, SpfError> {
        let ip = self.context.ip();
        for exchange in self.lookup_mx(target).await? {
            if self.lookup_ips(&exchange).await?.contains(&ip) {
                debug!("client ip is served by mx host {exchange}");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn ptr_matches(&mut self, target: &str) -> Result<bool, SpfError> {
        let target = target.trim_end_matches('.').to_ascii_lowercase();
        let suffix = format!(".{target}");
        let names = self.lookup_ptr(&reverse_name(self.context.ip())).await?;

        Ok(names.iter().any(|name| {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            name == target || name.ends_with(&suffix)
        }))
    }
}

/// Tests membership of `ip` in an `ip4`/`ip6` network.
///
/// Addresses of the other family never match.
fn ip_matches(mechanism: Mechanism, network: &str, ip: IpAddr) -> Result<bool, SpfError> {
    Ok(parse_network(mechanism, network)?.contains(&ip))
}

/// Parses the network of an `ip4`/`ip6` directive.
///
/// Host bits may be set, and a bare address is a single-host network. The
/// family must match the mechanism.
pub(crate) fn parse_network(mechanism: Mechanism, network: &str) -> Result<IpNet, SpfError> {
    network
        .parse::<IpNet>()
        .ok()
        .or_else(|| network.parse::<IpAddr>().ok().map(IpNet::from))
        .filter(|network| {
            matches!(
                (mechanism, network),
                (Mechanism::Ip4, IpNet::V4(_)) | (Mechanism::Ip6, IpNet::V6(_))
            )
        })
        .ok_or_else(|| SpfError::perm("failed to parse spf data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(addr: &str) -> IpAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_ip4_network_membership() {
        assert!(ip_matches(Mechanism::Ip4, "192.0.2.0/24", ip("192.0.2.130")).unwrap());
        assert!(!ip_matches(Mechanism::Ip4, "192.0.2.0/24", ip("192.0.3.1")).unwrap());
    }

    #[test]
    fn test_ip4_host_bits_and_bare_address() {
        assert!(ip_matches(Mechanism::Ip4, "192.0.2.77/24", ip("192.0.2.1")).unwrap());
        assert!(ip_matches(Mechanism::Ip4, "192.0.2.77", ip("192.0.2.77")).unwrap());
        assert!(!ip_matches(Mechanism::Ip4, "192.0.2.77", ip("192.0.2.78")).unwrap());
    }

    #[test]
    fn test_ip6_network_membership() {
        assert!(ip_matches(Mechanism::Ip6, "2001:db8::/32", ip("2001:db8:1::1")).unwrap());
        assert!(!ip_matches(Mechanism::Ip6, "2001:db8::/32", ip("2001:db9::1")).unwrap());
    }

    #[test]
    fn test_other_family_never_matches() {
        assert!(!ip_matches(Mechanism::Ip4, "0.0.0.0/0", ip("2001:db8::1")).unwrap());
        assert!(!ip_matches(Mechanism::Ip6, "::/0", ip("192.0.2.1")).unwrap());
    }

    #[test]
    fn test_malformed_network() {
        for network in ["192.0.2.0/33", "example.com", "", "2001:db8::/24"] {
            let error = ip_matches(Mechanism::Ip4, network, ip("192.0.2.1")).unwrap_err();
            assert!(error.is_permanent(), "{network}");
            assert_eq!(error.reason(), "failed to parse spf data");
        }
    }
}
