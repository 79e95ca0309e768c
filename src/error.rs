// ============================================================================
// error.rs — gpulife
// Error taxonomy for session construction, per-frame ticking, and startup.
// ============================================================================

use thiserror::Error;

/// Failures that abort construction of a session. A session that hits any
/// of these never becomes ready.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no compatible GPU adapter found")]
    UnsupportedAccelerator,

    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("presentation surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocationFailure(String),

    #[error("GPU program failed to compile or link: {0}")]
    ProgramCompileFailure(String),

    #[error("invalid grid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures during steady-state ticking. These suspend the driver; they do
/// not tear the session down.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("presentation surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("cell state readback failed: {0}")]
    ReadbackFailed(String),
}

/// Command-line and config-file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown argument: {0}")]
    UnknownFlag(String),

    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("{flag} only applies together with {requires}")]
    RequiresFlag {
        flag: &'static str,
        requires: &'static str,
    },
}

/// Top-level error returned by the interactive and headless runners.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Tick(#[from] TickError),

    #[error("generation {generation} diverged from the CPU rule in {mismatched} cells")]
    Divergence { generation: u64, mismatched: usize },

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
