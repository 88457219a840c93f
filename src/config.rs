//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::dialogue::FlowConfig;
use crate::error::ConfigError;

/// Which `ChatStore` the server persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// libSQL database file (or `:memory:`).
    Sql,
    /// Process-local, lost on exit.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" | "sqlite" | "libsql" => Ok(Self::Sql),
            "memory" | "in_memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Runtime configuration for the server and the chat clients.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// REST server port.
    pub port: u16,
    /// libSQL database path; `:memory:` for an in-memory database.
    pub db_path: PathBuf,
    pub backend: StoreBackend,
    /// Base URL of the server, for remote chat mode.
    pub api_url: String,
    /// Slot labels offered by the flow.
    pub slots: Vec<String>,
    /// Timeout for each HTTP request to the server.
    pub http_timeout: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            db_path: PathBuf::from("./data/intake.db"),
            backend: StoreBackend::Sql,
            api_url: "http://localhost:8000".to_string(),
            slots: FlowConfig::default().slots,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl IntakeConfig {
    /// Load from `INTAKE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup. Unset or blank keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("INTAKE_PORT") {
            config.port = parse_value("INTAKE_PORT", &port)?;
        }
        if let Some(path) = get("INTAKE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(backend) = get("INTAKE_STORE_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(url) = get("INTAKE_API_URL") {
            config.api_url = url.trim().to_string();
        }
        if let Some(slots) = get("INTAKE_SLOTS") {
            config.slots = slots
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = get("INTAKE_HTTP_TIMEOUT_SECS") {
            let secs: u64 = parse_value("INTAKE_HTTP_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "INTAKE_HTTP_TIMEOUT_SECS".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Whether the database lives only in memory.
    pub fn is_memory_db(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            slots: self.slots.clone(),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<IntakeConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IntakeConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.backend, StoreBackend::Sql);
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.slots.len(), 4);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(!config.is_memory_db());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("INTAKE_PORT", "9000"),
            ("INTAKE_DB_PATH", ":memory:"),
            ("INTAKE_STORE_BACKEND", "Memory"),
            ("INTAKE_SLOTS", "Mon 9 AM, Tue 4 PM ,"),
            ("INTAKE_HTTP_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.is_memory_db());
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.flow_config().slots, vec!["Mon 9 AM", "Tue 4 PM"]);
        assert_eq!(config.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = load(&[("INTAKE_PORT", "  ")]).unwrap();
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = load(&[("INTAKE_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "INTAKE_PORT"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(load(&[("INTAKE_HTTP_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn unknown_backend_is_reported() {
        let err = load(&[("INTAKE_STORE_BACKEND", "postgres")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(b) if b == "postgres"));
    }
}
