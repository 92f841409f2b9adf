// Tunable build parameters, loaded from an optional TOML file.
// Every section falls back to its defaults field-by-field.

use std::fs;
use std::path::{Path, PathBuf};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    /// Face topology data file.
    pub topology: PathBuf,
    pub face: FaceConfig,
    pub shell: ShellConfig,
    pub skin: SkinConfig,
    pub texture: TextureConfig,
    pub headwear: HeadwearConfig,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Fraction of each nose-adjacent landmark's offset from the nose center
    /// that survives smoothing (1.0 = untouched).
    pub nose_pull: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell depth as a fraction of the face width.
    pub depth_factor: f32,
    /// Scale toward the box center for each lofted ring, front to back.
    pub ring_taper: [f32; 3],
    /// Upward nudge of the topmost ring points, as a fraction of face height.
    pub forehead_bulge: f32,
    /// Apex distance behind the last ring, as a fraction of the shell depth.
    pub dome_height: f32,
    /// Lower clamp for width/height so a collapsed box never yields zero depth.
    pub min_width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinConfig {
    /// Side of the square pixel patch averaged per sample.
    pub patch_size: u32,
    pub fallback_color: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub width: u32,
    pub height: u32,
    /// Fraction by which the clip contour shrinks toward its centroid.
    pub inset: f32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadwearConfig {
    pub path: PathBuf,
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    /// Asset half-diagonal relative to the head half-diagonal.
    pub scale_factor: f32,
    /// Upward offset of the asset center, in head half-diagonals.
    pub offset_up: f32,
    /// Backward offset of the asset center, in head half-diagonals.
    pub offset_back: f32,
    /// Fixed XYZ Euler rotation aligning the authored axes with the head.
    pub rotation_deg: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub idle_spin: f32,
    pub camera_distance: f32,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            topology: PathBuf::from("assets/face_topology.toml"),
            face: FaceConfig::default(),
            shell: ShellConfig::default(),
            skin: SkinConfig::default(),
            texture: TextureConfig::default(),
            headwear: HeadwearConfig::default(),
            viewer: ViewerConfig::default(),
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self { nose_pull: 0.85 }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            depth_factor: 0.9,
            ring_taper: [0.96, 0.84, 0.62],
            forehead_bulge: 0.08,
            dome_height: 0.2,
            min_width: 1e-3,
        }
    }
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            patch_size: 8,
            fallback_color: [0.87, 0.72, 0.62],
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            inset: 0.02,
            jpeg_quality: 90,
        }
    }
}

impl Default for HeadwearConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/headwear.gltf"),
            color: [0.16, 0.18, 0.24],
            roughness: 0.8,
            metalness: 0.0,
            scale_factor: 0.62,
            offset_up: 0.55,
            offset_back: 0.35,
            rotation_deg: [0.0, 0.0, 0.0],
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            idle_spin: 0.35,
            camera_distance: 2.2,
        }
    }
}

impl HeadConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
                let config: HeadConfig = toml::from_str(&text)
                    .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
                info!("loaded configuration from {}", path.display());
                config
            }
            None => HeadConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid { field, reason: reason.into() }
        }
        fn positive(field: &'static str, v: f32) -> Result<(), ConfigError> {
            if v.is_finite() && v > 0.0 { Ok(()) } else { Err(invalid(field, format!("{v} must be finite and > 0"))) }
        }
        fn non_negative(field: &'static str, v: f32) -> Result<(), ConfigError> {
            if v.is_finite() && v >= 0.0 { Ok(()) } else { Err(invalid(field, format!("{v} must be finite and >= 0"))) }
        }
        fn unit_color(field: &'static str, c: [f32; 3]) -> Result<(), ConfigError> {
            if c.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)) {
                Ok(())
            } else {
                Err(invalid(field, format!("{c:?} channels must lie in [0, 1]")))
            }
        }

        let face = &self.face;
        if !(face.nose_pull.is_finite() && (0.0..=1.0).contains(&face.nose_pull)) {
            return Err(invalid("face.nose_pull", "must lie in [0, 1]"));
        }

        let shell = &self.shell;
        positive("shell.depth_factor", shell.depth_factor)?;
        positive("shell.min_width", shell.min_width)?;
        non_negative("shell.forehead_bulge", shell.forehead_bulge)?;
        non_negative("shell.dome_height", shell.dome_height)?;
        let mut previous = 1.0;
        for &t in &shell.ring_taper {
            if !(t.is_finite() && t > 0.0 && t < previous) {
                return Err(invalid("shell.ring_taper", "ratios must lie in (0, 1) and strictly decrease"));
            }
            previous = t;
        }

        unit_color("skin.fallback_color", self.skin.fallback_color)?;

        let texture = &self.texture;
        if texture.width == 0 || texture.height == 0 {
            return Err(invalid("texture", "width and height must be non-zero"));
        }
        if !(texture.inset.is_finite() && (0.0..1.0).contains(&texture.inset)) {
            return Err(invalid("texture.inset", "must lie in [0, 1)"));
        }
        if !(1..=100).contains(&texture.jpeg_quality) {
            return Err(invalid("texture.jpeg_quality", "must lie in 1..=100"));
        }

        let hw = &self.headwear;
        unit_color("headwear.color", hw.color)?;
        positive("headwear.scale_factor", hw.scale_factor)?;
        if !(hw.roughness.is_finite() && (0.0..=1.0).contains(&hw.roughness)) {
            return Err(invalid("headwear.roughness", "must lie in [0, 1]"));
        }
        if !(hw.metalness.is_finite() && (0.0..=1.0).contains(&hw.metalness)) {
            return Err(invalid("headwear.metalness", "must lie in [0, 1]"));
        }
        if ![hw.offset_up, hw.offset_back].iter().chain(hw.rotation_deg.iter()).all(|v| v.is_finite()) {
            return Err(invalid("headwear", "offsets and rotation must be finite"));
        }

        positive("viewer.camera_distance", self.viewer.camera_distance)?;
        if !self.viewer.idle_spin.is_finite() {
            return Err(invalid("viewer.idle_spin", "must be finite"));
        }
        Ok(())
    }
}
