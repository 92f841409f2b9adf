// Landmark sets and the external landmark source.
//
// Coordinate convention used by every builder:
//   x' = 0.5 - x_img   (mirrored, centered)
//   y' = 0.5 - y_img   (up is +y, centered)
//   z' = -z_img        (toward the viewer is +z)
// where (x_img, y_img) are the detector's normalized image coordinates
// (origin top-left, y down) and z_img is its relative depth (negative = closer).

use std::fs;
use std::path::{Path, PathBuf};
use glam::Vec3;
use image::RgbaImage;
use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("expected {expected} landmarks, got {found}")]
    WrongCount { expected: usize, found: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("landmark index {index} is out of range for {len} landmarks")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("landmark source not initialized")]
    NotInitialized,
    #[error("failed to read landmarks from {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse landmarks from {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

// ============================================================================
// LANDMARKS
// ============================================================================

/// Ordered landmark points. Index meaning is fixed by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks(Vec<Vec3>);

impl Landmarks {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn points(&self) -> &[Vec3] { &self.0 }

    pub fn get(&self, index: usize) -> Option<Vec3> {
        self.0.get(index).copied()
    }

    /// Checked lookup with a descriptive error.
    pub fn point(&self, index: usize) -> Result<Vec3, LandmarkError> {
        self.get(index).ok_or(LandmarkError::IndexOutOfRange { index, len: self.len() })
    }

    /// Fail fast on a sequence the fixed index tables cannot address.
    pub fn validate(&self, expected_len: usize) -> Result<(), LandmarkError> {
        if self.len() != expected_len {
            return Err(LandmarkError::WrongCount { expected: expected_len, found: self.len() });
        }
        if let Some(index) = self.0.iter().position(|p| !p.is_finite()) {
            return Err(LandmarkError::NonFinite { index });
        }
        Ok(())
    }

    /// Mean of the given landmarks.
    pub fn mean_of(&self, indices: &[usize]) -> Result<Vec3, LandmarkError> {
        let mut sum = Vec3::ZERO;
        for &i in indices {
            sum += self.point(i)?;
        }
        Ok(if indices.is_empty() { sum } else { sum / indices.len() as f32 })
    }
}

// ============================================================================
// PHOTO
// ============================================================================

/// A decoded source photograph and where it came from.
pub struct Photo {
    pub path: PathBuf,
    pub image: RgbaImage,
}

impl Photo {
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        let image = image::open(path)?.to_rgba8();
        debug!("loaded photo {} ({}x{})", path.display(), image.width(), image.height());
        Ok(Self { path: path.to_path_buf(), image })
    }
}

// ============================================================================
// LANDMARK SOURCE
// ============================================================================

/// A face-landmark detector. `Ok(None)` means no face was found.
pub trait LandmarkSource: Send + Sync {
    fn init(&mut self) -> Result<(), LandmarkError> {
        Ok(())
    }

    fn detect(&self, photo: &Photo) -> Result<Option<Landmarks>, LandmarkError>;
}

#[derive(Debug, Deserialize)]
struct RawLandmark {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

/// Reads detector output stored beside the photo as `<photo>.landmarks.json`:
/// a JSON array of `{x, y, z}` in raw detector image space.
pub struct SidecarLandmarkSource {
    initialized: bool,
}

impl SidecarLandmarkSource {
    pub fn new() -> Self {
        Self { initialized: false }
    }

    pub fn sidecar_path(photo_path: &Path) -> PathBuf {
        let mut name = photo_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".landmarks.json");
        photo_path.with_file_name(name)
    }

    /// Parse a sidecar document and convert it to the builder convention.
    pub fn parse(json: &str) -> Result<Landmarks, serde_json::Error> {
        let raw: Vec<RawLandmark> = serde_json::from_str(json)?;
        Ok(Landmarks::new(
            raw.iter().map(|p| Vec3::new(0.5 - p.x, 0.5 - p.y, -p.z)).collect(),
        ))
    }
}

impl Default for SidecarLandmarkSource {
    fn default() -> Self { Self::new() }
}

impl LandmarkSource for SidecarLandmarkSource {
    fn init(&mut self) -> Result<(), LandmarkError> {
        self.initialized = true;
        info!("landmark source ready (sidecar JSON)");
        Ok(())
    }

    fn detect(&self, photo: &Photo) -> Result<Option<Landmarks>, LandmarkError> {
        if !self.initialized {
            return Err(LandmarkError::NotInitialized);
        }
        let path = Self::sidecar_path(&photo.path);
        if !path.exists() {
            debug!("no landmark file at {}", path.display());
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| LandmarkError::Io { path: path.clone(), source })?;
        let landmarks = Self::parse(&json)
            .map_err(|source| LandmarkError::Parse { path: path.clone(), source })?;
        if landmarks.is_empty() {
            return Ok(None);
        }
        debug!("read {} landmarks from {}", landmarks.len(), path.display());
        Ok(Some(landmarks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_converts_to_centered_mirrored_frame() {
        let lm = SidecarLandmarkSource::parse(r#"[{"x":0.25,"y":0.75,"z":-0.1},{"x":0.5,"y":0.5}]"#).unwrap();
        assert_eq!(lm.get(0), Some(Vec3::new(0.25, -0.25, 0.1)));
        assert_eq!(lm.get(1), Some(Vec3::ZERO));
    }

    #[test]
    fn validate_rejects_wrong_length_and_nan() {
        let lm = Landmarks::new(vec![Vec3::ZERO; 3]);
        assert!(matches!(lm.validate(4), Err(LandmarkError::WrongCount { expected: 4, found: 3 })));
        assert!(lm.validate(3).is_ok());

        let bad = Landmarks::new(vec![Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0)]);
        assert!(matches!(bad.validate(2), Err(LandmarkError::NonFinite { index: 1 })));
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        let p = SidecarLandmarkSource::sidecar_path(Path::new("/tmp/me.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/me.jpg.landmarks.json"));
    }

    #[test]
    fn uninitialized_source_refuses_to_detect() {
        let photo = Photo { path: PathBuf::from("/nonexistent.png"), image: RgbaImage::new(1, 1) };
        let source = SidecarLandmarkSource::new();
        assert!(matches!(source.detect(&photo), Err(LandmarkError::NotInitialized)));
    }

    #[test]
    fn missing_sidecar_means_no_face() {
        let photo = Photo { path: PathBuf::from("/nonexistent/photo.png"), image: RgbaImage::new(1, 1) };
        let mut source = SidecarLandmarkSource::new();
        source.init().unwrap();
        assert!(source.detect(&photo).unwrap().is_none());
    }
}
