//! Configuration file management
//!
//! Loads TOML configuration shared by all probe programs.
//! Default config path: ~/.config/glprobe/config.toml

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Probe settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DRM device nodes
    pub devices: DeviceConfig,
    /// Shader source lookup
    pub shaders: ShaderConfig,
    /// Driver debug environment
    pub driver_debug: DriverDebugConfig,
    /// How long results stay on screen
    pub hold: HoldConfig,
    /// Image dump paths
    pub output: OutputConfig,
    /// X11 window sizes
    pub x11: X11Config,
    /// Colour scatter scene
    pub scatter: ScatterConfig,
}

/// DRM device nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Primary (KMS capable) card node
    pub card: String,
    /// Render node used as the GPU side of buffer sharing
    pub render_node: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            card: "/dev/dri/card0".to_string(),
            render_node: "/dev/dri/renderD128".to_string(),
        }
    }
}

/// Shader source lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory containing vert.glsl, frag.glsl, egl-color.vert, egl-color.frag
    pub dir: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            dir: "shaders".to_string(),
        }
    }
}

impl ShaderConfig {
    /// Resolve a shader file name against the shader directory
    pub fn path(&self, name: &str) -> PathBuf {
        Path::new(&self.dir).join(name)
    }
}

/// Driver debug variables exported before EGL is loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverDebugConfig {
    /// Export the variables at all
    pub enabled: bool,
    /// EGL_LOG_LEVEL (Mesa EGL loader)
    pub egl_log_level: String,
    /// MESA_DEBUG
    pub mesa_debug: String,
    /// LIBGL_DEBUG
    pub libgl_debug: String,
}

impl Default for DriverDebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            egl_log_level: "warning".to_string(),
            mesa_debug: "1".to_string(),
            libgl_debug: "verbose".to_string(),
        }
    }
}

impl DriverDebugConfig {
    /// Variables to export, in export order. Empty values are skipped.
    pub fn vars(&self) -> Vec<(&'static str, &str)> {
        if !self.enabled {
            return Vec::new();
        }
        [
            ("EGL_LOG_LEVEL", self.egl_log_level.as_str()),
            ("MESA_DEBUG", self.mesa_debug.as_str()),
            ("LIBGL_DEBUG", self.libgl_debug.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }

    /// Export into the process environment.
    ///
    /// Must run before libEGL is loaded; the probes call it first thing in main.
    pub fn apply(&self) {
        for (key, value) in self.vars() {
            debug!("export {}={}", key, value);
            std::env::set_var(key, value);
        }
    }
}

/// Presentation hold durations (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldConfig {
    /// After setting the mode in egl-color-kms
    pub kms_seconds: u64,
    /// After presenting to an X11 window
    pub x11_seconds: u64,
    /// After setting the mode in gbm-bo-test
    pub gbm_seconds: u64,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            kms_seconds: 1,
            x11_seconds: 1,
            gbm_seconds: 10,
        }
    }
}

impl HoldConfig {
    pub fn kms(&self) -> Duration {
        Duration::from_secs(self.kms_seconds)
    }

    pub fn x11(&self) -> Duration {
        Duration::from_secs(self.x11_seconds)
    }

    pub fn gbm(&self) -> Duration {
        Duration::from_secs(self.gbm_seconds)
    }
}

/// Image dump paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// egl-tiff output
    pub tiff_path: String,
    /// Edge length of the egl-tiff render target
    pub tiff_size: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tiff_path: "out.tif".to_string(),
            tiff_size: 64,
        }
    }
}

/// X11 window sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct X11Config {
    /// egl-color-x11 window edge
    pub color_size: u16,
    /// egltri window width
    pub tri_width: u16,
    /// egltri window height
    pub tri_height: u16,
}

impl Default for X11Config {
    fn default() -> Self {
        Self {
            color_size: 256,
            tri_width: 800,
            tri_height: 600,
        }
    }
}

/// Colour scatter scene
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Triangle count used when neither --limit nor LIMIT is given
    pub limit: Option<u32>,
}

impl Config {
    /// System-wide config file
    pub const SYSTEM_CONFIG_PATH: &'static str = "/etc/glprobe/config.toml";

    /// Locate the config file:
    /// 1. GLPROBE_CONFIG environment variable
    /// 2. ~/.config/glprobe/config.toml
    /// 3. /etc/glprobe/config.toml
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GLPROBE_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
            warn!("GLPROBE_CONFIG points at missing file: {}", path);
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration, falling back to built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        debug!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML (used to print a template)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("glprobe").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_devices() {
        let cfg = Config::default();
        assert_eq!(cfg.devices.card, "/dev/dri/card0");
        assert_eq!(cfg.devices.render_node, "/dev/dri/renderD128");
        assert_eq!(cfg.hold.gbm(), Duration::from_secs(10));
        assert_eq!(cfg.output.tiff_size, 64);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg = Config::parse(
            r#"
            [devices]
            card = "/dev/dri/card1"

            [hold]
            kms_seconds = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.devices.card, "/dev/dri/card1");
        assert_eq!(cfg.devices.render_node, "/dev/dri/renderD128");
        assert_eq!(cfg.hold.kms_seconds, 3);
        assert_eq!(cfg.hold.x11_seconds, 1);
        assert_eq!(cfg.shaders.dir, "shaders");
    }

    #[test]
    fn test_driver_debug_vars() {
        let mut dbg = DriverDebugConfig::default();
        assert_eq!(
            dbg.vars(),
            vec![
                ("EGL_LOG_LEVEL", "warning"),
                ("MESA_DEBUG", "1"),
                ("LIBGL_DEBUG", "verbose"),
            ]
        );

        dbg.mesa_debug.clear();
        assert_eq!(dbg.vars().len(), 2);

        dbg.enabled = false;
        assert!(dbg.vars().is_empty());
    }

    #[test]
    fn test_shader_path() {
        let shaders = ShaderConfig {
            dir: "/opt/probe".to_string(),
        };
        assert_eq!(shaders.path("vert.glsl"), Path::new("/opt/probe/vert.glsl"));
    }

    #[test]
    fn test_template_roundtrip() {
        let text = Config::default().to_toml().unwrap();
        let cfg = Config::parse(&text).unwrap();
        assert_eq!(cfg.x11.tri_width, 800);
        assert_eq!(cfg.scatter.limit, None);
    }

    #[test]
    fn test_invalid_type_rejected() {
        assert!(Config::parse("[hold]\nkms_seconds = \"soon\"\n").is_err());
    }
}
