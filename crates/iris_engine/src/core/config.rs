//! # Engine and renderer configuration
//!
//! All settings the viewer and the Vulkan backend read at startup. Every struct
//! deserializes with field-level defaults, so a config file only needs the keys
//! it wants to change.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Upper bound on lights the light storage buffer can hold
pub const MAX_LIGHTS: usize = 50;

/// Directories searched, in order, when resolving a bare shader file name
const SHADER_SEARCH_DIRS: [&str; 5] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../target/shaders/",
    "./",
];

fn resolve_shader(file_name: &str) -> String {
    SHADER_SEARCH_DIRS
        .iter()
        .map(|dir| format!("{dir}{file_name}"))
        .find(|candidate| Path::new(candidate).exists())
        .unwrap_or_else(|| format!("target/shaders/{file_name}"))
}

/// # Shader Configuration
///
/// SPIR-V paths for the two pipelines the renderer builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Mesh pipeline vertex shader
    pub mesh_vertex: String,
    /// Mesh pipeline fragment shader
    pub mesh_fragment: String,
    /// Light billboard vertex shader
    pub billboard_vertex: String,
    /// Light billboard fragment shader
    pub billboard_fragment: String,
}

impl ShaderConfig {
    /// Resolve the default shader file names against the usual output directories
    pub fn with_path_resolution() -> Self {
        Self {
            mesh_vertex: resolve_shader("mesh.vert.spv"),
            mesh_fragment: resolve_shader("mesh.frag.spv"),
            billboard_vertex: resolve_shader("billboard.vert.spv"),
            billboard_fragment: resolve_shader("billboard.frag.spv"),
        }
    }

    /// Shader paths that do not exist on disk
    pub fn missing_files(&self) -> Vec<&str> {
        [
            self.mesh_vertex.as_str(),
            self.mesh_fragment.as_str(),
            self.billboard_vertex.as_str(),
            self.billboard_fragment.as_str(),
        ]
        .into_iter()
        .filter(|path| !Path::new(path).exists())
        .collect()
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution()
    }
}

/// # Renderer Configuration
///
/// Settings of the Vulkan backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Clear color of the main color attachment
    pub clear_color: [f32; 4],
    /// Bound on each fence wait and image acquisition, in milliseconds
    pub frame_timeout_ms: u64,
    /// Bound on each blocking transfer submission, in milliseconds
    pub upload_timeout_ms: u64,
    /// Maximum lights written to the light buffer per frame
    pub max_lights: usize,
    /// Draw a camera-facing quad at each light
    pub draw_light_billboards: bool,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (0, 1, 0),
            shaders: ShaderConfig::default(),
            enable_validation: None,
            clear_color: [0.2, 0.2, 0.2, 1.0],
            frame_timeout_ms: 100,
            upload_timeout_ms: 5_000,
            max_lights: MAX_LIGHTS,
            draw_light_billboards: true,
        }
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Frame wait bound in nanoseconds, as Vulkan expects it
    pub fn frame_timeout_ns(&self) -> u64 {
        self.frame_timeout_ms.saturating_mul(1_000_000)
    }

    /// Upload wait bound in nanoseconds
    pub fn upload_timeout_ns(&self) -> u64 {
        self.upload_timeout_ms.saturating_mul(1_000_000)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }
        if self.frame_timeout_ms == 0 {
            return Err(ConfigError::Invalid("frame_timeout_ms must be at least 1".to_string()));
        }
        if self.upload_timeout_ms == 0 {
            return Err(ConfigError::Invalid("upload_timeout_ms must be at least 1".to_string()));
        }
        if self.max_lights > MAX_LIGHTS {
            return Err(ConfigError::Invalid(format!(
                "max_lights is {} but the light buffer holds {MAX_LIGHTS}",
                self.max_lights
            )));
        }
        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid("clear_color components must be in 0..=1".to_string()));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Iris")
    }
}

/// # Engine Configuration
///
/// Window and process-level settings used by the application shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter for the engine
    pub log_level: String,
    /// File every log line is also appended to; empty disables it
    pub log_file: String,
    /// Window title
    pub window_title: String,
    /// Initial window width in screen coordinates
    pub window_width: u32,
    /// Initial window height in screen coordinates
    pub window_height: u32,
    /// Frame timeouts tolerated in a row before the application gives up
    pub max_consecutive_timeouts: u32,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: "Iris.log".to_string(),
            window_title: "Iris".to_string(),
            window_width: 1600,
            window_height: 900,
            max_consecutive_timeouts: 50,
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the log file; an empty path keeps logs on the console only
    pub fn with_log_file(mut self, path: impl Into<String>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Log file path, if file logging is enabled
    pub fn log_file_path(&self) -> Option<&Path> {
        (!self.log_file.is_empty()).then(|| Path::new(&self.log_file))
    }

    /// Set window size
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} must be non-zero",
                self.window_width, self.window_height
            )));
        }
        if let Some(path) = self.log_file_path() {
            if path.is_dir() {
                return Err(ConfigError::Invalid(format!("log file {} is a directory", path.display())));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration the viewer loads from `iris.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.renderer.validate()
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("iris_config_test_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ApplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.renderer.clear_color, [0.2, 0.2, 0.2, 1.0]);
        assert_eq!(config.renderer.frame_timeout_ms, 100);
        assert_eq!(config.renderer.max_lights, MAX_LIGHTS);
        assert_eq!(config.renderer.frame_timeout_ns(), 100_000_000);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let mut renderer = RendererConfig::default();
        renderer.max_lights = MAX_LIGHTS + 1;
        assert!(matches!(renderer.validate(), Err(ConfigError::Invalid(_))));

        let mut renderer = RendererConfig::default();
        renderer.frame_timeout_ms = 0;
        assert!(renderer.validate().is_err());

        let mut renderer = RendererConfig::default();
        renderer.clear_color = [1.5, 0.0, 0.0, 1.0];
        assert!(renderer.validate().is_err());

        let engine = EngineConfig::default().with_window_size(0, 600);
        assert!(engine.validate().is_err());

        let engine = EngineConfig::default().with_log_file(std::env::temp_dir().to_string_lossy());
        assert!(matches!(engine.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_log_file_defaults_and_opt_out() {
        let engine = EngineConfig::default();
        assert_eq!(engine.log_file_path(), Some(Path::new("Iris.log")));

        let console_only = engine.with_log_file("");
        assert_eq!(console_only.log_file_path(), None);
        assert!(console_only.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            [engine]
            window_title = "Picking demo"

            [renderer]
            frame_timeout_ms = 250
            draw_light_billboards = false
        "#;
        let config = ApplicationConfig::from_str_with_format(text, ConfigFormat::Toml).unwrap();

        assert_eq!(config.engine.window_title, "Picking demo");
        assert_eq!(config.engine.window_width, 1600);
        assert_eq!(config.renderer.frame_timeout_ms, 250);
        assert!(!config.renderer.draw_light_billboards);
        assert_eq!(config.renderer.upload_timeout_ms, 5_000);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let path = temp_path("app.toml");
        let mut config = ApplicationConfig::default();
        config.engine = config.engine.with_log_level("debug");
        config.renderer = config.renderer.with_validation(false);

        config.save_to_file(&path).unwrap();
        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = temp_path("app.ron");
        let config = ApplicationConfig::default();

        config.save_to_file(&path).unwrap();
        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ApplicationConfig::load_or_default(temp_path("does_not_exist.toml")).unwrap();
        assert_eq!(config, ApplicationConfig::default());
    }
}
