//! Log subscriber setup.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{Error, Result};

/// Maps a configured level name to a filter.
///
/// Accepts tracing level names as well as the driver's own level names
/// (`Warning`, `Detail`, `StreamDetail`, ...), case-insensitively.
#[must_use]
pub fn level_filter(name: &str) -> Option<LevelFilter> {
    let filter = match name.to_ascii_lowercase().as_str() {
        "none" | "off" => LevelFilter::OFF,
        "fatal" | "error" => LevelFilter::ERROR,
        "warn" | "warning" | "alert" => LevelFilter::WARN,
        "info" | "always" => LevelFilter::INFO,
        "debug" | "detail" => LevelFilter::DEBUG,
        "trace" | "streamdetail" | "internal" => LevelFilter::TRACE,
        _ => return None,
    };
    Some(filter)
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `level`. With `log_file` set, output is appended to
/// that file without ANSI colors; otherwise it goes to stderr so stdout
/// stays free for published envelopes.
pub fn init(level: &str, log_file: Option<&str>) -> Result<()> {
    let default = level_filter(level).unwrap_or(LevelFilter::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| Error::Config {
        path: log_file.unwrap_or("<stderr>").to_string(),
        reason: format!("cannot install log subscriber: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_filter("info"), Some(LevelFilter::INFO));
        assert_eq!(level_filter("Warning"), Some(LevelFilter::WARN));
        assert_eq!(level_filter("Detail"), Some(LevelFilter::DEBUG));
        assert_eq!(level_filter("StreamDetail"), Some(LevelFilter::TRACE));
        assert_eq!(level_filter("None"), Some(LevelFilter::OFF));
        assert_eq!(level_filter("chatty"), None);
    }
}
