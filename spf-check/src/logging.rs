use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Resolves the log level: the `-L` flag wins over `LOG_LEVEL`, and logging
/// is off when neither is set.
pub fn level(flag: Option<&str>) -> LevelFilter {
    let Some(level) = flag
        .map(ToString::to_string)
        .or_else(|| std::env::var("LOG_LEVEL").ok())
    else {
        return LevelFilter::OFF;
    };

    LevelFilter::from_str(level.as_str()).unwrap_or_else(|_| {
        eprintln!("Invalid log level specified {level}, defaulting to {}", LevelFilter::OFF);
        LevelFilter::OFF
    })
}

/// Installs a compact stderr logger for the SPF crates.
pub fn init(level: LevelFilter) {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("spf")
                })),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_level() {
        assert_eq!(level(Some("debug")), LevelFilter::DEBUG);
        assert_eq!(level(Some("WARN")), LevelFilter::WARN);
        assert_eq!(level(Some("verbose")), LevelFilter::OFF);
    }
}
