//! Configuration loading and resolution
//!
//! Each value is resolved in priority order:
//! 1. Command-line argument or environment variable (collected by the binary)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing TOML file is not an error; the service starts on defaults.

use crate::phone::normalize_phone;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default number of confirmed slots per event
pub const DEFAULT_CAPACITY: u32 = 16;

/// Default HTTP listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";

/// Default per-message delivery timeout
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

const DATABASE_FILE: &str = "fairway.db";

/// On-disk TOML configuration (every field optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub manager_phones: Vec<String>,
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[sms]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through `FAIRWAY_*` variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub capacity: Option<u32>,
    pub manager_phones: Option<Vec<String>>,
    pub dry_run: bool,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

/// Credentials for the SMS provider
#[derive(Debug, Clone)]
pub struct SmsCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub capacity: u32,
    /// Canonical manager numbers (static allow-list)
    pub manager_phones: Vec<String>,
    /// Log outbound messages instead of sending them
    pub dry_run: bool,
    pub sms: Option<SmsCredentials>,
    pub delivery_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Merge overrides, TOML values and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let root_folder = overrides
            .root_folder
            .or(toml.root_folder)
            .unwrap_or_else(default_root_folder);
        let db_path = root_folder.join(DATABASE_FILE);

        let bind_addr = overrides
            .bind_addr
            .or(toml.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let capacity = overrides
            .capacity
            .or(toml.capacity)
            .unwrap_or(DEFAULT_CAPACITY);
        if capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".to_string()));
        }

        let raw_managers = overrides.manager_phones.unwrap_or(toml.manager_phones);
        let manager_phones = raw_managers
            .iter()
            .map(|raw| {
                normalize_phone(raw)
                    .ok_or_else(|| Error::Config(format!("Invalid manager phone: {}", raw)))
            })
            .collect::<Result<Vec<_>>>()?;
        if manager_phones.is_empty() {
            warn!("No manager phones configured; manager commands are disabled");
        }

        let sms = match (
            overrides.account_sid.or(toml.sms.account_sid),
            overrides.auth_token.or(toml.sms.auth_token),
            overrides.from_number.or(toml.sms.from_number),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsCredentials {
                account_sid,
                auth_token,
                from_number,
                api_base: toml.sms.api_base,
            }),
            _ => None,
        };

        let mut dry_run = overrides.dry_run || toml.dry_run.unwrap_or(false);
        if sms.is_none() && !dry_run {
            warn!("SMS credentials not configured; running in dry-run mode");
            dry_run = true;
        }

        let delivery_timeout = Duration::from_secs(
            toml.sms
                .timeout_secs
                .unwrap_or(DEFAULT_DELIVERY_TIMEOUT_SECS),
        );

        Ok(Self {
            root_folder,
            db_path,
            bind_addr,
            capacity,
            manager_phones,
            dry_run,
            sms,
            delivery_timeout,
            log_level: toml.logging.level,
        })
    }

    /// Whether a canonical phone is on the manager allow-list
    pub fn is_manager(&self, phone: &str) -> bool {
        self.manager_phones.iter().any(|m| m == phone)
    }
}

/// Load the TOML config file
///
/// `explicit` wins; otherwise the platform search path is used. A missing
/// file yields defaults, a malformed one is an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) => path,
            None => {
                info!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Locate the config file
///
/// `FAIRWAY_CONFIG`, then `~/.config/fairway/config.toml`, then
/// `/etc/fairway/config.toml` on Linux.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FAIRWAY_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("fairway").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/fairway/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fairway"))
        .unwrap_or_else(|| PathBuf::from("./fairway_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_credentials() -> TomlConfig {
        TomlConfig {
            sms: SmsConfig {
                account_sid: Some("AC123".to_string()),
                auth_token: Some("secret".to_string()),
                from_number: Some("+15550000000".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_apply_when_nothing_configured() {
        let config = Config::resolve(ConfigOverrides::default(), TomlConfig::default()).unwrap();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert!(config.db_path.ends_with(DATABASE_FILE));
        assert!(config.manager_phones.is_empty());
        // no credentials forces dry-run
        assert!(config.dry_run);
        assert!(config.sms.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_beat_toml() {
        let toml = TomlConfig {
            capacity: Some(12),
            bind_addr: Some("0.0.0.0:9000".to_string()),
            manager_phones: vec!["5551112222".to_string()],
            ..with_credentials()
        };
        let overrides = ConfigOverrides {
            capacity: Some(20),
            manager_phones: Some(vec!["(555) 333-4444".to_string()]),
            ..Default::default()
        };

        let config = Config::resolve(overrides, toml).unwrap();
        assert_eq!(config.capacity, 20);
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.manager_phones, vec!["+15553334444"]);
        assert!(config.is_manager("+15553334444"));
        assert!(!config.is_manager("+15551112222"));
        assert!(!config.dry_run);
        assert!(config.sms.is_some());
    }

    #[test]
    fn test_invalid_manager_phone_rejected() {
        let toml = TomlConfig {
            manager_phones: vec!["12345".to_string()],
            ..Default::default()
        };
        let result = Config::resolve(ConfigOverrides::default(), toml);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let overrides = ConfigOverrides {
            capacity: Some(0),
            ..Default::default()
        };
        assert!(Config::resolve(overrides, TomlConfig::default()).is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
capacity = 8
manager_phones = ["+1 555 123 4567"]

[sms]
account_sid = "AC1"
auth_token = "tok"
from_number = "+15550001111"
timeout_secs = 3

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let toml = load_toml_config(Some(&path)).unwrap();
        let config = Config::resolve(ConfigOverrides::default(), toml).unwrap();
        assert_eq!(config.capacity, 8);
        assert_eq!(config.manager_phones, vec!["+15551234567"]);
        assert_eq!(config.delivery_timeout, Duration::from_secs(3));
        assert_eq!(config.log_level, "debug");
        assert!(!config.dry_run);
    }

    #[test]
    fn test_missing_toml_file_uses_defaults() {
        let toml = load_toml_config(Some(Path::new("/nonexistent/fairway.toml"))).unwrap();
        assert!(toml.capacity.is_none());
    }

    #[test]
    #[serial]
    fn test_config_path_from_environment() {
        std::env::set_var("FAIRWAY_CONFIG", "/tmp/fairway-test.toml");
        assert_eq!(config_file_path(), Some(PathBuf::from("/tmp/fairway-test.toml")));
        std::env::remove_var("FAIRWAY_CONFIG");
    }
}
