//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Lowercase `level` and map the aliases `tracing` does not know
/// (`warning`, `critical`, `fatal`) onto its levels.
fn normalize_level(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    match level.as_str() {
        "warning" => "warn".into(),
        "critical" | "fatal" => "error".into(),
        _ => level,
    }
}

/// Default filter directives for `level`: this crate and the HTTP trace layer.
#[must_use]
pub fn default_directives(level: &str) -> String {
    let level = normalize_level(level);
    format!("{}={level},tower_http={level}", env!("CARGO_PKG_NAME").replace('-', "_"))
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_crate_and_http() {
        assert_eq!(default_directives("debug"), "fastboard=debug,tower_http=debug");
    }

    #[test]
    fn default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }

    #[test]
    fn level_aliases_map_to_tracing_levels() {
        assert_eq!(default_directives("WARNING"), "fastboard=warn,tower_http=warn");
        assert_eq!(default_directives("CRITICAL"), "fastboard=error,tower_http=error");
        assert_eq!(default_directives("Info"), "fastboard=info,tower_http=info");
        for level in ["WARNING", "CRITICAL", "fatal", "DEBUG"] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok(), "{level}");
        }
    }
}
