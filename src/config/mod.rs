//! Configuration management
//!
//! Handles loading profiler settings.

pub mod settings;

pub use settings::{ProfilerSettings, load_settings, load_settings_from};
