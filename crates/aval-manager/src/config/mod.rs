use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::eligibility::UnscopedVetoPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub supabase: SupabaseConfig,
    pub storage: StorageConfig,
    pub eligibility: EligibilityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let timeout_secs = env::var("SUPABASE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let supabase = SupabaseConfig {
            url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
            service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let storage = StorageConfig::from_env()?;

        let unscoped_policy = match env::var("ELIGIBILITY_UNSCOPED_POLICY") {
            Ok(raw) => UnscopedVetoPolicy::parse(&raw)
                .ok_or(ConfigError::InvalidEligibilityPolicy { value: raw })?,
            Err(_) => UnscopedVetoPolicy::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            supabase,
            storage,
            eligibility: EligibilityConfig { unscoped_policy },
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing { key }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing output controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat {
                value: other.to_string(),
            }),
        }
    }
}

/// Connection settings for the hosted database, auth and storage endpoints.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    /// Applied to every outbound call.
    pub timeout: Duration,
}

/// Storage proxy settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub jwt_secret: String,
    pub api_base_url: String,
    pub bucket: String,
}

impl StorageConfig {
    pub const DEFAULT_BUCKET: &'static str = "documentos-aval";

    /// Reads only the storage variables, so links can be minted without backend access.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            jwt_secret: required("SUPABASE_JWT_SECRET")?,
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            bucket: env::var("STORAGE_BUCKET")
                .ok()
                .map(|bucket| bucket.trim().to_string())
                .filter(|bucket| !bucket.is_empty())
                .unwrap_or_else(|| Self::DEFAULT_BUCKET.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityConfig {
    pub unscoped_policy: UnscopedVetoPolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidLogFormat { value: String },
    InvalidEligibilityPolicy { value: String },
    Missing { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "SUPABASE_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT '{value}' is not one of compact, json")
            }
            ConfigError::InvalidEligibilityPolicy { value } => write!(
                f,
                "ELIGIBILITY_UNSCOPED_POLICY '{value}' is not one of global_only, any_veto"
            ),
            ConfigError::Missing { key } => write!(f, "{key} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "SUPABASE_URL",
            "SUPABASE_SERVICE_ROLE_KEY",
            "SUPABASE_JWT_SECRET",
            "SUPABASE_TIMEOUT_SECS",
            "API_BASE_URL",
            "STORAGE_BUCKET",
            "ELIGIBILITY_UNSCOPED_POLICY",
        ] {
            env::remove_var(key);
        }
    }

    fn set_required() {
        env::set_var("SUPABASE_URL", "https://project.supabase.co/");
        env::set_var("SUPABASE_SERVICE_ROLE_KEY", "service-key");
        env::set_var("SUPABASE_JWT_SECRET", "jwt-secret");
    }

    #[test]
    fn load_uses_defaults_when_optional_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        set_required();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.supabase.url, "https://project.supabase.co");
        assert_eq!(config.supabase.timeout, Duration::from_secs(10));
        assert_eq!(config.storage.api_base_url, "http://localhost:8000");
        assert_eq!(config.storage.bucket, "documentos-aval");
        assert_eq!(
            config.eligibility.unscoped_policy,
            UnscopedVetoPolicy::GlobalOnly
        );
    }

    #[test]
    fn missing_supabase_url_is_reported() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        set_required();
        env::remove_var("SUPABASE_URL");
        match AppConfig::load() {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "SUPABASE_URL"),
            other => panic!("expected missing key error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_eligibility_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        set_required();
        env::set_var("ELIGIBILITY_UNSCOPED_POLICY", "sometimes");
        match AppConfig::load() {
            Err(ConfigError::InvalidEligibilityPolicy { value }) => assert_eq!(value, "sometimes"),
            other => panic!("expected policy error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        set_required();
        env::set_var("APP_HOST", "localhost");
        env::set_var("ELIGIBILITY_UNSCOPED_POLICY", "any_veto");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8000));
        assert_eq!(config.eligibility.unscoped_policy, UnscopedVetoPolicy::AnyVeto);
    }
}
