use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::placement::SeedError;

/// Startup and process-level failures of the binaries. Request failures are
/// reported through `PlacementError` instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
}
