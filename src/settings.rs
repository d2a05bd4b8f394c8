use crate::state::DEFAULT_KEYRING_SERVICE;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8081/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_RECENT_TRANSACTIONS_LIMIT: u32 = 5;

pub const ENV_API_BASE_URL: &str = "LOYALBRIDGE_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECONDS: &str = "LOYALBRIDGE_REQUEST_TIMEOUT_SECONDS";

const TIMEOUT_RANGE: (u64, u64) = (1, 120);
const RECENT_LIMIT_RANGE: (u32, u32) = (1, 50);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleSettings {
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
    pub recent_transactions_limit: u32,
    pub keyring_service: String,
    /// `EnvFilter` directive used when neither `RUST_LOG` nor `--debug` is set.
    pub log_level: Option<String>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            recent_transactions_limit: DEFAULT_RECENT_TRANSACTIONS_LIMIT,
            keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
            log_level: None,
        }
    }
}

impl ConsoleSettings {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "LoyalBridge", "admin-console")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Reads `path`, or the platform default when none is given, then applies
    /// environment overrides. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let settings = match path {
            Some(path) => Self::load_from(&path)?,
            None => {
                warn!("no platform config directory; using default settings");
                Self::default()
            }
        };
        Ok(settings.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file not found; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let parsed: Self = serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(parsed.normalized())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECONDS) {
            match raw.trim().parse::<u64>() {
                Ok(seconds) => self.request_timeout_seconds = seconds,
                Err(_) => warn!(
                    value = %raw,
                    "ignoring {ENV_REQUEST_TIMEOUT_SECONDS}: not a whole number of seconds"
                ),
            }
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        let url = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if url.is_empty() {
            DEFAULT_API_BASE_URL.to_string()
        } else {
            url.to_string()
        };
        self.request_timeout_seconds = self
            .request_timeout_seconds
            .clamp(TIMEOUT_RANGE.0, TIMEOUT_RANGE.1);
        self.recent_transactions_limit = self
            .recent_transactions_limit
            .clamp(RECENT_LIMIT_RANGE.0, RECENT_LIMIT_RANGE.1);
        if self.keyring_service.trim().is_empty() {
            self.keyring_service = DEFAULT_KEYRING_SERVICE.to_string();
        }
        self.log_level = self
            .log_level
            .map(|level| level.trim().to_string())
            .filter(|level| !level.is_empty());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ConsoleSettings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, ConsoleSettings::default());
        assert_eq!(settings.api_base_url, "http://localhost:8081/api");
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn partial_file_keeps_defaults_and_clamps_ranges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            concat!(
                r#"{{"apiBaseUrl":"https://admin.loyalbridge.io/api/","#,
                r#""recentTransactionsLimit":500,"requestTimeoutSeconds":0,"logLevel":"  "}}"#
            )
        )
        .unwrap();

        let settings = ConsoleSettings::load_from(file.path()).unwrap();

        assert_eq!(settings.api_base_url, "https://admin.loyalbridge.io/api");
        assert_eq!(settings.recent_transactions_limit, 50);
        assert_eq!(settings.request_timeout_seconds, 1);
        assert_eq!(settings.keyring_service, DEFAULT_KEYRING_SERVICE);
        assert_eq!(settings.log_level, None);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = ConsoleSettings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env = HashMap::from([
            (ENV_API_BASE_URL, "http://10.0.0.5:8081/api"),
            (ENV_REQUEST_TIMEOUT_SECONDS, "30"),
        ]);
        let settings = ConsoleSettings::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.api_base_url, "http://10.0.0.5:8081/api");
        assert_eq!(settings.request_timeout_seconds, 30);
    }

    #[test]
    fn unparseable_timeout_override_is_ignored() {
        let settings = ConsoleSettings::default().with_overrides(|key| {
            (key == ENV_REQUEST_TIMEOUT_SECONDS).then(|| "soon".to_string())
        });
        assert_eq!(settings.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECONDS);
    }
}
