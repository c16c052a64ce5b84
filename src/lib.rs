pub mod capture;
pub mod error;
pub mod stream;

use arc_swap::ArcSwap;
use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

pub use error::StreamError;
pub use stream::AsyncFrameStream;

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub synthetic: SyntheticConfig,
    pub bench: BenchConfig,
}

/// Settings for a real V4L2 capture device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
}

/// Settings for the synthetic source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub velocity: (i32, i32),
}

/// Settings for the benchmark harness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub iterations: u32,
    /// Simulated per-frame inference cost in milliseconds
    pub inference_ms: u64,
    /// Spin-up time before the threaded measurement starts
    pub warmup_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            synthetic: SyntheticConfig::default(),
            bench: BenchConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            width: 640,
            height: 480,
            format: PixelFormat::Mjpeg,
            buffer_count: 4,
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            velocity: (5, 5),
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            inference_ms: 30,
            warmup_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from an optional `aperture.toml` next to the
    /// binary, with `APERTURE_*` environment overrides on top of defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("aperture").required(false))
            .add_source(
                config::Environment::with_prefix("APERTURE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
