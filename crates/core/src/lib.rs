//! Core utilities for the framepace pipeline.
//!
//! This crate provides foundational types and utilities used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Configuration management

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, Config, PipelineConfig, SimulationConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
