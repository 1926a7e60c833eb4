//! User configuration loaded from `config.toml`.
//!
//! Config errors are soft failures: a missing file gives defaults, an
//! unparsable one gives defaults plus a warning. Neither blocks a command.

use std::path::PathBuf;

use serde::Deserialize;

/// Settings read from `$XDG_CONFIG_HOME/notes/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Author recorded on messages written from the command line.
    pub author: String,
    /// Status of the first message of a newly added annotation.
    pub default_status: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            author: std::env::var("USER").unwrap_or_else(|_| "anonymous".to_owned()),
            default_status: "open".to_owned(),
        }
    }
}

/// Returns the path to the notes config file.
///
/// Prefers `$XDG_CONFIG_HOME/notes/config.toml`; falls back to
/// `~/.config/notes/config.toml` when the env var is absent.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("notes").join("config.toml")
}

/// Parses config text; absent keys take their defaults.
pub fn parse(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}

/// Loads the config from [`config_path`]. Never fails.
pub fn load() -> Config {
    let path = config_path();
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };
    match parse(&raw) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("config parse error in {:?}: {}", path, e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config = parse("author = \"joe\"\ndefault_status = \"processing\"\n").unwrap();
        assert_eq!(config.author, "joe");
        assert_eq!(config.default_status, "processing");
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = parse("author = \"sue\"").unwrap();
        assert_eq!(config.author, "sue");
        assert_eq!(config.default_status, "open");
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(parse("author = 3").is_err());
    }
}
