//! Command-line utility for checking Sender Policy Framework records
//!
//! Evaluates the SPF policy of the domain in `target_email` for mail sent
//! from `smtp_server_ip` and prints the result, the directives of the
//! responsible record and the chain of directives that matched.

mod config;
mod logging;
mod report;

use std::{
    net::IpAddr,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use spf_policy::{HickoryResolver, MemoryResolver, Resolver, SenderPolicy, SpfConfig, Zone};

use crate::report::Report;

/// Check the SPF policy for a sending server and sender address
#[derive(Parser, Debug)]
#[command(name = "spf-check")]
#[command(about = "Check the SPF policy for a sending server", long_about = None)]
#[command(version)]
struct Cli {
    /// The IP address of the sending SMTP server
    smtp_server_ip: String,

    /// The email address that messages are from
    target_email: String,

    /// Set the logging level (overrides `LOG_LEVEL`)
    #[arg(short = 'L', long = "log")]
    log: Option<String>,

    /// Path to a RON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HELO domain used by the `h` macro
    #[arg(long)]
    helo: Option<String>,

    /// Answer DNS queries from a RON zone file instead of the network
    #[arg(long)]
    zone: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Splits an address into its local part and domain.
fn split_email(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty() && !domain.is_empty() && !domain.contains('@');
    valid.then_some((local, domain))
}

fn resolver(zone: Option<&Path>, config: &SpfConfig) -> anyhow::Result<Arc<dyn Resolver>> {
    if let Some(path) = zone {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read zone from {}", path.display()))?;
        let zone: Zone = ron::from_str(&content)
            .with_context(|| format!("Invalid zone in {}", path.display()))?;
        return Ok(Arc::new(MemoryResolver::from_zone(zone)));
    }

    Ok(Arc::new(HickoryResolver::with_dns_config(config.dns.clone())?))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(logging::level(cli.log.as_deref()));

    let Ok(ip) = cli.smtp_server_ip.parse::<IpAddr>() else {
        println!("[-] the smtp server ip address specified is invalid");
        return Ok(ExitCode::FAILURE);
    };
    let Some((_, domain)) = split_email(&cli.target_email) else {
        println!("[-] the email address specified is invalid");
        return Ok(ExitCode::FAILURE);
    };

    let config = config::resolve(cli.config.as_deref())?;
    let resolver = resolver(cli.zone.as_deref(), &config)?;

    let mut policy =
        SenderPolicy::new(resolver, ip, domain, Some(&cli.target_email)).with_config(config);
    if let Some(helo) = &cli.helo {
        policy = policy.with_helo_domain(helo);
    }

    let result = policy.check_host().await;
    let report = Report::new(&policy);
    match cli.format {
        Format::Text => print!("{}", report.to_text()),
        Format::Json => println!("{}", report.to_json()?),
    }

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::parse_from([
            "spf-check",
            "-L",
            "debug",
            "--format",
            "json",
            "--helo",
            "mx.example.net",
            "192.0.2.1",
            "alice@example.com",
        ]);
        assert_eq!(cli.smtp_server_ip, "192.0.2.1");
        assert_eq!(cli.target_email, "alice@example.com");
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.helo.as_deref(), Some("mx.example.net"));
    }

    #[test]
    fn test_split_email() {
        assert_eq!(split_email("alice@example.com"), Some(("alice", "example.com")));
        assert_eq!(split_email("example.com"), None);
        assert_eq!(split_email("@example.com"), None);
        assert_eq!(split_email("alice@"), None);
        assert_eq!(split_email("a@b@example.com"), None);
    }
}
