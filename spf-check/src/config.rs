//! Locating and loading the checker's configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use spf_policy::SpfConfig;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "SPF_CHECK_CONFIG";

const DEFAULT_PATHS: [&str; 2] = [
    "./spf-check.config.ron",
    "/etc/spf-check/spf-check.config.ron",
];

/// Find the configuration file using the following precedence:
/// 1. `--config` on the command line
/// 2. `SPF_CHECK_CONFIG` environment variable
/// 3. ./spf-check.config.ron (current working directory)
/// 4. /etc/spf-check/spf-check.config.ron (system-wide config)
///
/// Returns `None` when no file is found; the defaults apply then.
pub fn find_config_file(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Some(path) = env_path {
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("{CONFIG_ENV} points to non-existent file: {}", path.display());
    }

    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Reads an [`SpfConfig`] from a RON file.
pub fn load(path: &Path) -> anyhow::Result<SpfConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    ron::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
}

/// Loads the configuration, falling back to defaults when no file exists.
pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<SpfConfig> {
    let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    match find_config_file(explicit, env_path)? {
        Some(path) => {
            tracing::debug!("loading configuration from {}", path.display());
            load(&path)
        }
        None => Ok(SpfConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use spf_policy::Upstream;

    use super::*;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = config_file("()");
        let env = config_file("()");

        let found = find_config_file(Some(explicit.path()), Some(env.path().to_path_buf()));
        assert_eq!(found.unwrap(), Some(explicit.path().to_path_buf()));
    }

    #[test]
    fn test_env_path() {
        let env = config_file("()");
        let found = find_config_file(None, Some(env.path().to_path_buf()));
        assert_eq!(found.unwrap(), Some(env.path().to_path_buf()));
    }

    #[test]
    fn test_missing_paths_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");

        assert!(find_config_file(Some(&missing), None).is_err());
        assert!(find_config_file(None, Some(missing)).is_err());
    }

    #[test]
    fn test_load() {
        let file = config_file(
            r#"(
                query_limit: 5,
                helo_domain: "mx.example.net",
                dns: (upstream: Google, attempts: 1),
            )"#,
        );

        let config = load(file.path()).unwrap();
        assert_eq!(config.query_limit, 5);
        assert_eq!(config.helo_domain, "mx.example.net");
        assert_eq!(config.dns.upstream, Upstream::Google);
        assert_eq!(config.dns.attempts, 1);
    }

    #[test]
    fn test_load_invalid() {
        let file = config_file("(query_limit: \"ten\")");
        assert!(load(file.path()).is_err());
    }
}
