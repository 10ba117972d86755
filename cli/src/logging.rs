//! Tracing initialisation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default directive when `RUST_LOG` is unset: "debug" | "info" | "error" ...
    pub level: String,
    /// Emit JSON structured logs instead of human-readable text.
    pub json: bool,
}

impl LogConfig {
    /// `-q` wins over `-v`.
    pub fn from_flags(verbose: bool, quiet: bool, json: bool) -> Self {
        let level = if quiet {
            "error"
        } else if verbose {
            "debug"
        } else {
            "info"
        };
        Self {
            level: level.into(),
            json,
        }
    }
}

/// Install the global subscriber. Logs go to stderr so tables on stdout stay clean.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    res.map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_levels() {
        assert_eq!(LogConfig::from_flags(false, false, false).level, "info");
        assert_eq!(LogConfig::from_flags(true, false, false).level, "debug");
        assert_eq!(LogConfig::from_flags(true, true, true).level, "error");
    }
}
