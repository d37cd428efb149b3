//! # Core Engine Module
//!
//! Shared settings used by the application shell and the renderer.

pub mod config;

pub use config::{
    ApplicationConfig, Config, ConfigError, EngineConfig, RendererConfig, ShaderConfig, MAX_LIGHTS,
};
