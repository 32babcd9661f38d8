//! Configuration management for divegps.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::upload::UploadTarget;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "divegps";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "locations.db";

/// Environment variable prefix. Nested keys are separated by `__`, e.g.
/// `DIVEGPS_UPLOAD__USER_ID`.
const ENV_PREFIX: &str = "DIVEGPS_";

/// Keys read from the environment verbatim. figment would otherwise parse a
/// numeric user id such as `12345` into an integer.
const STRING_ENV_KEYS: &[&str] = &["upload.destination_url", "upload.user_id"];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DIVEGPS_`)
/// 2. TOML config file at `~/.config/divegps/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Upload destination configuration.
    pub upload: UploadConfig,
    /// Location provider configuration.
    pub location: LocationConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/divegps/locations.db`
    pub database_path: Option<PathBuf>,
}

/// Where records are uploaded.
///
/// Both `destination_url` and `user_id` must be set for any upload to be
/// attempted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// URL the records are posted to.
    pub destination_url: Option<String>,
    /// Account identifier on the remote dive log.
    pub user_id: Option<String>,
    /// Request timeout in seconds. Unset keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
}

/// Location provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Host running gpsd.
    pub gpsd_host: String,
    /// Port gpsd listens on.
    pub gpsd_port: u16,
    /// How long to wait for a fix, in seconds. Set to 0 to wait until cancelled.
    pub fix_timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            gpsd_host: "127.0.0.1".to_string(),
            gpsd_port: 2947,
            fix_timeout_secs: 120,
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl UploadConfig {
    /// Resolve the destination and user id into an [`UploadTarget`].
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSettings`] if either value is unset, or
    /// [`Error::ConfigValidation`] if the destination is not a valid URL.
    pub fn resolve(&self) -> Result<UploadTarget> {
        let destination = non_blank(self.destination_url.as_ref());
        let user_id = non_blank(self.user_id.as_ref());

        let (destination, user_id) = match (destination, user_id) {
            (Some(destination), Some(user_id)) => (destination, user_id),
            (destination, user_id) => {
                let missing: Vec<&str> = [
                    destination.is_none().then_some("destination_url"),
                    user_id.is_none().then_some("user_id"),
                ]
                .into_iter()
                .flatten()
                .collect();
                return Err(Error::missing_settings(missing.join(", ")));
            }
        };

        let endpoint = parse_destination(destination)?;
        Ok(UploadTarget {
            endpoint,
            user_id: user_id.to_string(),
        })
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn parse_destination(destination: &str) -> Result<Url> {
    let url = Url::parse(destination).map_err(|e| Error::ConfigValidation {
        message: format!("invalid destination_url '{destination}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::ConfigValidation {
            message: format!("destination_url must use http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

impl LocationConfig {
    /// Get the fix timeout as a Duration, `None` when waiting indefinitely.
    #[must_use]
    pub fn fix_timeout(&self) -> Option<Duration> {
        if self.fix_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.fix_timeout_secs))
        }
    }

    /// The gpsd address as `host:port`.
    #[must_use]
    pub fn gpsd_address(&self) -> String {
        format!("{}:{}", self.gpsd_host, self.gpsd_port)
    }
}

/// `upload.user_id` -> `DIVEGPS_UPLOAD__USER_ID`
fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__").to_uppercase())
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .split("__")
                    .ignore(STRING_ENV_KEYS),
            );
        for key in STRING_ENV_KEYS {
            if let Ok(value) = std::env::var(env_var_name(key)) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// Missing upload settings are not a validation failure; they only
    /// matter when an upload is attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(destination) = non_blank(self.upload.destination_url.as_ref()) {
            parse_destination(destination)?;
        }

        if self.upload.timeout_secs == Some(0) {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.location.gpsd_host.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "gpsd_host must not be empty".to_string(),
            });
        }

        if self.location.gpsd_port == 0 {
            return Err(Error::ConfigValidation {
                message: "gpsd_port must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn configured_upload() -> UploadConfig {
        UploadConfig {
            destination_url: Some("https://dives.example.org/api/dive/add/".to_string()),
            user_id: Some("diver42".to_string()),
            timeout_secs: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert!(config.upload.destination_url.is_none());
        assert!(config.upload.user_id.is_none());
        assert!(config.upload.timeout_secs.is_none());
        assert_eq!(config.location.gpsd_host, "127.0.0.1");
        assert_eq!(config.location.gpsd_port, 2947);
        assert_eq!(config.location.fix_timeout_secs, 120);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            upload: configured_upload(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_destination() {
        let mut config = Config::default();
        config.upload.destination_url = Some("not a url".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("destination_url"));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let mut config = Config::default();
        config.upload.destination_url = Some("ftp://dives.example.org/".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.upload.timeout_secs = Some(0);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.location.gpsd_port = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("gpsd_port"));
    }

    #[test]
    fn test_resolve_both_set() {
        let target = configured_upload().resolve().unwrap();
        assert_eq!(
            target.endpoint.as_str(),
            "https://dives.example.org/api/dive/add/"
        );
        assert_eq!(target.user_id, "diver42");
    }

    #[test]
    fn test_resolve_requires_both() {
        let mut upload = configured_upload();
        upload.user_id = None;
        let err = upload.resolve().unwrap_err();
        assert!(err.is_missing_settings());
        assert!(err.to_string().contains("user_id"));
        assert!(!err.to_string().contains("destination_url"));

        let mut upload = configured_upload();
        upload.destination_url = None;
        let err = upload.resolve().unwrap_err();
        assert!(err.is_missing_settings());
        assert!(err.to_string().contains("destination_url"));
    }

    #[test]
    fn test_resolve_neither_set() {
        let err = UploadConfig::default().resolve().unwrap_err();
        assert!(err.is_missing_settings());
        assert_eq!(
            err.to_string(),
            "upload settings missing: destination_url, user_id"
        );
    }

    #[test]
    fn test_resolve_blank_counts_as_missing() {
        let mut upload = configured_upload();
        upload.user_id = Some("   ".to_string());
        assert!(upload.resolve().unwrap_err().is_missing_settings());
    }

    #[test]
    fn test_upload_timeout() {
        let mut upload = UploadConfig::default();
        assert!(upload.timeout().is_none());

        upload.timeout_secs = Some(15);
        assert_eq!(upload.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_fix_timeout() {
        let mut location = LocationConfig::default();
        assert_eq!(location.fix_timeout(), Some(Duration::from_secs(120)));

        location.fix_timeout_secs = 0;
        assert!(location.fix_timeout().is_none());
    }

    #[test]
    fn test_gpsd_address() {
        assert_eq!(LocationConfig::default().gpsd_address(), "127.0.0.1:2947");
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("locations.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("divegps"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        Jail::expect_with(|jail| {
            let config = Config::load_from(Some(jail.directory().join("absent.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.location, LocationConfig::default());
            assert_eq!(config.storage, StorageConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[upload]
destination_url = "http://localhost:8000/api/dive/add/"
user_id = "diver42"
timeout_secs = 10

[location]
gpsd_port = 3000
"#,
            )?;

            let config = Config::load_from(Some(jail.directory().join("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.upload.user_id.as_deref(), Some("diver42"));
            assert_eq!(config.upload.timeout_secs, Some(10));
            assert_eq!(config.location.gpsd_port, 3000);
            assert_eq!(config.location.gpsd_host, "127.0.0.1");
            assert!(config.upload.resolve().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[location]\ngpsd_port = 0\n")?;

            let err = Config::load_from(Some(jail.directory().join("config.toml"))).unwrap_err();
            assert!(err.to_string().contains("gpsd_port"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[location]\ngpsd_port = 3000\n")?;
            jail.set_env("DIVEGPS_LOCATION__GPSD_PORT", "4000");
            jail.set_env("DIVEGPS_UPLOAD__TIMEOUT_SECS", "20");

            let config = Config::load_from(Some(jail.directory().join("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.location.gpsd_port, 4000);
            assert_eq!(config.upload.timeout_secs, Some(20));
            Ok(())
        });
    }

    #[test]
    fn test_env_numeric_user_id_stays_a_string() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[upload]\nuser_id = \"from-file\"\n")?;
            jail.set_env("DIVEGPS_UPLOAD__USER_ID", "12345");
            jail.set_env(
                "DIVEGPS_UPLOAD__DESTINATION_URL",
                "https://dives.example.org/api/dive/add/",
            );

            let config = Config::load_from(Some(jail.directory().join("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.upload.user_id.as_deref(), Some("12345"));
            assert_eq!(config.upload.resolve().unwrap().user_id, "12345");
            Ok(())
        });
    }

    #[test]
    fn test_env_user_id_keeps_leading_zeros() {
        Jail::expect_with(|jail| {
            jail.set_env("DIVEGPS_UPLOAD__USER_ID", "007");

            let config = Config::load_from(Some(jail.directory().join("absent.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.upload.user_id.as_deref(), Some("007"));
            Ok(())
        });
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("upload.user_id"), "DIVEGPS_UPLOAD__USER_ID");
        assert_eq!(
            env_var_name("upload.destination_url"),
            "DIVEGPS_UPLOAD__DESTINATION_URL"
        );
    }

    #[test]
    fn test_upload_config_deserialize() {
        let json = r#"{"user_id": "someone"}"#;
        let upload: UploadConfig = serde_json::from_str(json).unwrap();
        assert_eq!(upload.user_id.as_deref(), Some("someone"));
        assert!(upload.destination_url.is_none());
    }
}
