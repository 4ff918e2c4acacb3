use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::placement::TransitionMode;

const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

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

/// Top-level configuration for the placement service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub placement: PlacementConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let upload_limit_bytes = match env::var("TNP_UPLOAD_LIMIT_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidUploadLimit)?,
            Err(_) => DEFAULT_UPLOAD_LIMIT_BYTES,
        };

        let transitions = match env::var("TNP_STATUS_TRANSITIONS") {
            Ok(raw) => TransitionMode::parse(&raw)
                .ok_or(ConfigError::InvalidTransitionMode { value: raw })?,
            Err(_) => TransitionMode::default(),
        };

        let seed_path = env::var("TNP_SEED_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let media_dir = env::var("TNP_MEDIA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            placement: PlacementConfig {
                upload_limit_bytes,
                transitions,
                seed_path,
                media_dir,
            },
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the drive workflow itself.
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    pub upload_limit_bytes: usize,
    pub transitions: TransitionMode,
    pub seed_path: Option<PathBuf>,
    /// Where uploaded brochures and resumes are written; uploads stay in memory when unset.
    pub media_dir: Option<PathBuf>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT_BYTES,
            transitions: TransitionMode::default(),
            seed_path: None,
            media_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidUploadLimit,
    InvalidTransitionMode { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUploadLimit => {
                write!(f, "TNP_UPLOAD_LIMIT_BYTES must be a positive integer")
            }
            ConfigError::InvalidTransitionMode { value } => write!(
                f,
                "TNP_STATUS_TRANSITIONS must be 'permissive' or 'strict' (found '{value}')"
            ),
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
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("TNP_UPLOAD_LIMIT_BYTES");
        env::remove_var("TNP_STATUS_TRANSITIONS");
        env::remove_var("TNP_SEED_PATH");
        env::remove_var("TNP_MEDIA_DIR");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.placement.upload_limit_bytes, DEFAULT_UPLOAD_LIMIT_BYTES);
        assert_eq!(config.placement.transitions, TransitionMode::Permissive);
        assert!(config.placement.seed_path.is_none());
        assert!(config.placement.media_dir.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 4000));
        reset_env();
    }

    #[test]
    fn strict_transitions_can_be_enabled() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TNP_STATUS_TRANSITIONS", "Strict");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.placement.transitions, TransitionMode::Strict);
        reset_env();
    }

    #[test]
    fn rejects_unknown_transition_mode_and_zero_upload_limit() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TNP_STATUS_TRANSITIONS", "lenient");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidTransitionMode { .. })
        ));

        reset_env();
        env::set_var("TNP_UPLOAD_LIMIT_BYTES", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidUploadLimit)
        ));
        reset_env();
    }
}
