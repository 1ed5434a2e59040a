use crate::config::error::{ConfigError, ConfigResult};
use crate::transport::ChatId;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "droplink.toml";

/// Environment prefix for overrides, e.g. `DROPLINK__TTL_HOURS=12`
pub const ENV_PREFIX: &str = "DROPLINK__";

/// Ten years
pub const MAX_TTL_HOURS: u64 = 10 * 365 * 24;

/// One year
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// One TiB
pub const MAX_LOG_ALERT_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// The only requester allowed to upload files and run commands
    pub operator_id: ChatId,

    /// Identity of the relay process handling large files
    pub relay_id: ChatId,

    /// Identity of the intake bot (the relay only accepts requests from it)
    pub bot_id: ChatId,

    /// Directory holding the expiring files
    pub storage_root: PathBuf,

    /// Log file watched by the log-growth monitor
    pub log_path: PathBuf,

    /// Log file of the relay process, watched by its own `[Relay]` monitor
    pub relay_log_path: Option<PathBuf>,

    /// Public base URL, without the `/files` suffix
    pub base_url: String,

    /// Hours before a stored file becomes eligible for deletion
    pub ttl_hours: u64,

    /// Files up to this size are stored directly, larger ones are relayed
    pub direct_size_ceiling_bytes: u64,

    /// Absolute payload ceiling of the chat transport
    pub transport_ceiling_bytes: u64,

    /// Log size (in MB) above which the operator is alerted
    pub log_alert_mb: u64,

    /// Seconds between background sweeps
    pub sweep_interval_secs: u64,

    /// Accepted file extensions, lowercase, without the leading dot
    pub allowed_extensions: Vec<String>,

    /// Optional Prometheus listener, e.g. `127.0.0.1:9090`
    pub metrics_addr: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            operator_id: ChatId(0),
            relay_id: ChatId(0),
            bot_id: ChatId(0),
            storage_root: PathBuf::from("./uploads"),
            log_path: PathBuf::from("logs/droplink.log"),
            relay_log_path: None,
            base_url: "http://localhost".to_string(),
            ttl_hours: 24,
            direct_size_ceiling_bytes: 20 * 1024 * 1024, // 20MB
            transport_ceiling_bytes: 2 * 1024 * 1024 * 1024, // 2GB
            log_alert_mb: 10,
            sweep_interval_secs: 3600,
            allowed_extensions: ["pdf", "png", "jpg", "jpeg", "docx", "mp4", "mov", "avi", "mkv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            metrics_addr: None,
        }
    }
}

impl Settings {
    /// Load defaults, then `droplink.toml`, then `DROPLINK__*` variables
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Same as [`Settings::load`] with an explicit configuration file
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_identities()?;

        if self.ttl_hours == 0 || self.ttl_hours > MAX_TTL_HOURS {
            return Err(ConfigError::Invalid(format!(
                "ttl_hours must be between 1 and {MAX_TTL_HOURS}"
            )));
        }
        if self.sweep_interval_secs == 0 || self.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "sweep_interval_secs must be between 1 and {MAX_SWEEP_INTERVAL_SECS}"
            )));
        }
        if self.relay_log_path.as_deref() == Some(self.log_path.as_path()) {
            return Err(ConfigError::Invalid(
                "relay_log_path must differ from log_path".into(),
            ));
        }
        if self.log_alert_mb > MAX_LOG_ALERT_MB {
            return Err(ConfigError::Invalid(format!(
                "log_alert_mb must not exceed {MAX_LOG_ALERT_MB}"
            )));
        }
        if self.direct_size_ceiling_bytes > self.transport_ceiling_bytes {
            return Err(ConfigError::Invalid(format!(
                "direct_size_ceiling_bytes ({}) exceeds transport_ceiling_bytes ({})",
                self.direct_size_ceiling_bytes, self.transport_ceiling_bytes
            )));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_extensions must not be empty".into(),
            ));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url: {e}")))?;
        Ok(())
    }

    /// Operator, relay and bot must be set and pairwise distinct
    fn validate_identities(&self) -> ConfigResult<()> {
        let ids = [
            ("operator_id", self.operator_id),
            ("relay_id", self.relay_id),
            ("bot_id", self.bot_id),
        ];

        for (field, id) in ids {
            if id.0 == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be set")));
            }
        }
        for (i, (field, id)) in ids.iter().enumerate() {
            if let Some((other, _)) = ids[i + 1..].iter().find(|(_, other)| other == id) {
                return Err(ConfigError::Invalid(format!(
                    "{field} and {other} must differ (both are {id})"
                )));
            }
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.operator_id, self.relay_id)
    }
}

/// Who sent an inbound event, as far as the allow-list is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Operator,
    Relay,
    Stranger,
}

/// The fixed two-identity allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    operator: ChatId,
    relay: ChatId,
}

impl AccessPolicy {
    pub fn new(operator: ChatId, relay: ChatId) -> Self {
        Self { operator, relay }
    }

    pub fn operator(&self) -> ChatId {
        self.operator
    }

    pub fn relay(&self) -> ChatId {
        self.relay
    }

    pub fn is_operator(&self, id: ChatId) -> bool {
        id == self.operator
    }

    pub fn is_relay(&self, id: ChatId) -> bool {
        id == self.relay
    }

    pub fn classify(&self, id: ChatId) -> Principal {
        if self.is_operator(id) {
            Principal::Operator
        } else if self.is_relay(id) {
            Principal::Relay
        } else {
            Principal::Stranger
        }
    }
}
