use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub accuracy: AccuracyConfig,
    pub geocoder: GeocoderConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ip,     // IP geolocation, city-level
    Replay, // Recorded track from `replay_path`
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub source: SourceKind,
    pub lookup_ip: String,
    pub replay_path: String,
    pub poll_interval_ms: u64, // How often the IP source re-polls while watching
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AccuracyConfig {
    pub threshold_meters: f64,  // Watcher resolves early at or below this
    pub watch_deadline_ms: u64, // Watcher gives up (or settles for best) after this
    pub fast_timeout_ms: u64,
    pub debounce_ms: u64,
    pub target_meters: f64, // Continuous watch stops at or below this
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub zoom: u8,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Progressive,
    Continuous,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub output: OutputFormat,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Ip,
            lookup_ip: "1.1.1.1".to_string(),
            replay_path: "data/track.csv".to_string(),
            poll_interval_ms: 5_000,
        }
    }
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            threshold_meters: 25.0,
            watch_deadline_ms: 20_000,
            fast_timeout_ms: 15_000,
            debounce_ms: 500,
            target_meters: 10.0,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            zoom: 18,
            user_agent: concat!("geofix/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_name: "geofix.log".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Progressive,
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                // Keep a broken file around for the user to fix.
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Config::default();
                }
            },
            Err(_) => info!("No config at {}, writing defaults.", path.display()),
        }

        let default_config = Config::default();

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        default_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path);

        assert_eq!(config, Config::default());
        let written = fs::read_to_string(&path).unwrap();
        let reparsed: Config = toml::from_str(&written).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[location]
source = "replay"
replay_path = "tracks/walk.csv"

[session]
mode = "continuous"
output = "json"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path);

        assert_eq!(config.location.source, SourceKind::Replay);
        assert_eq!(config.location.replay_path, "tracks/walk.csv");
        assert_eq!(config.location.lookup_ip, "1.1.1.1");
        assert_eq!(config.session.mode, SessionMode::Continuous);
        assert_eq!(config.session.output, OutputFormat::Json);
        assert_eq!(config.accuracy, AccuracyConfig::default());
    }

    #[test]
    fn unparsable_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let config = Config::load_from(&path);

        assert_eq!(config, Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "this is = = not toml");
    }

    #[test]
    fn defaults_match_documented_budgets() {
        let accuracy = AccuracyConfig::default();
        assert_eq!(accuracy.threshold_meters, 25.0);
        assert_eq!(accuracy.watch_deadline_ms, 20_000);
        assert_eq!(accuracy.fast_timeout_ms, 15_000);
        assert_eq!(accuracy.debounce_ms, 500);
        assert_eq!(accuracy.target_meters, 10.0);
        assert_eq!(GeocoderConfig::default().zoom, 18);
    }
}
