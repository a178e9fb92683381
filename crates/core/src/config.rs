// =============================================================================
// CONFIGURATION - Load pipeline settings from a TOML file
// =============================================================================
//
// Every section falls back to its defaults, so a partial file (or no file at
// all) yields a usable configuration. Values are range-checked by `validate`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub simulation: SimulationConfig,
    pub app: AppConfig,
}

/// Frame pipeline settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of command recording slots, i.e. frames allowed in flight.
    pub ring_depth: usize,
    /// Upper bound on a single completion wait before it counts as a GPU hang.
    pub wait_timeout_ms: u64,
    /// Vertical blanks to wait for on present (0 = no vsync).
    pub sync_interval: u32,
    pub clear_color: [f32; 4],
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ring_depth: 2,
            wait_timeout_ms: 5000,
            sync_interval: 1,
            clear_color: [0.2, 0.3, 0.7, 1.0],
        }
    }
}

impl PipelineConfig {
    /// The completion wait timeout as a [`Duration`].
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Software GPU settings used by the headless demo and tests
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of swapchain back-buffers.
    pub buffer_count: u32,
    /// Time the simulated GPU spends executing each submission.
    pub gpu_frame_time_us: u64,
    /// Remove the simulated device once this many frames were submitted.
    pub lose_device_at_frame: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            buffer_count: 2,
            gpu_frame_time_us: 4000,
            lose_device_at_frame: None,
        }
    }
}

impl SimulationConfig {
    pub fn gpu_frame_time(&self) -> Duration {
        Duration::from_micros(self.gpu_frame_time_us)
    }
}

/// Demo application settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Frames to render before exiting.
    pub frames: u64,
    /// How many times the pipeline may be rebuilt after device loss.
    pub max_rebuilds: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            max_rebuilds: 1,
        }
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content).map_err(|e| match e {
            Error::ConfigParse { source, .. } => Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        info!("Loaded configuration from {:?}", path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: Default::default(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.ring_depth == 0 {
            return Err(Error::Config("pipeline.ring_depth must be at least 1".into()));
        }
        if self.pipeline.wait_timeout_ms == 0 {
            return Err(Error::Config(
                "pipeline.wait_timeout_ms must be a finite, non-zero timeout".into(),
            ));
        }
        if self.simulation.buffer_count == 0 {
            return Err(Error::Config(
                "simulation.buffer_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
