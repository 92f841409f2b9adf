// Build orchestration: photo -> landmarks -> head node, reporting a short
// status string per stage.
//
// The builder is stateless between builds. Swapping the result into the
// scene is the caller's job.

use std::fmt;
use std::path::Path;
use image::RgbaImage;
use log::{debug, error, info};
use crate::config::HeadConfig;
use crate::engine::components::Color;
use crate::error::BuildError;
use super::assembly::{assemble_head, HeadNode};
use super::back_shell::build_back_shell;
use super::bounds::BoundingBox;
use super::face_front::build_face_front;
use super::headwear::{fit_headwear, load_headwear, HeadwearAsset};
use super::landmarks::{LandmarkSource, Landmarks, Photo};
use super::skin_tone::estimate_skin_tone;
use super::texture_bake::bake_face_texture;
use super::topology::FaceTopology;

/// Pipeline stage or terminal state, shown verbatim on the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    LoadingImage,
    Detecting,
    NoFace,
    BuildingMesh,
    BakingTexture,
    FittingHeadwear,
    Done,
    Failed(&'static str),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::LoadingImage => write!(f, "Loading image..."),
            Status::Detecting => write!(f, "Detecting face..."),
            Status::NoFace => write!(f, "No face detected"),
            Status::BuildingMesh => write!(f, "Building mesh..."),
            Status::BakingTexture => write!(f, "Baking texture..."),
            Status::FittingHeadwear => write!(f, "Fitting headwear..."),
            Status::Done => write!(f, "Done"),
            Status::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

pub enum BuildOutcome {
    Built(Box<HeadNode>),
    /// Detection found no face; nothing was built.
    NoFace,
}

/// Runs the geometry, texture and headwear stages for one landmark set.
pub struct HeadBuilder {
    config: HeadConfig,
    topology: FaceTopology,
    headwear: Option<HeadwearAsset>,
}

impl HeadBuilder {
    /// The headwear asset is read from `config.headwear.path` on every build.
    pub fn new(config: HeadConfig, topology: FaceTopology) -> Self {
        Self { config, topology, headwear: None }
    }

    /// Use an already-loaded headwear asset instead of reading it per build.
    pub fn with_headwear(mut self, asset: HeadwearAsset) -> Self {
        self.headwear = Some(asset);
        self
    }

    pub fn config(&self) -> &HeadConfig { &self.config }

    pub fn topology(&self) -> &FaceTopology { &self.topology }

    /// Build a head from a photo and its landmarks.
    pub fn build(
        &self,
        photo: &RgbaImage,
        landmarks: &Landmarks,
        report: &mut dyn FnMut(Status),
    ) -> Result<HeadNode, BuildError> {
        let config = &self.config;
        let topology = &self.topology;

        report(Status::BuildingMesh);
        landmarks.validate(topology.landmark_count)?;
        let bounds = BoundingBox::from_points(landmarks.points()).ok_or(BuildError::NoBounds)?;
        debug!(
            "bounds: center ({:.3}, {:.3}, {:.3}), {:.3} x {:.3}",
            bounds.cx, bounds.cy, bounds.cz, bounds.width, bounds.height
        );
        let face = build_face_front(landmarks, topology, &config.face)?;
        let back = build_back_shell(landmarks, &bounds, &topology.back_ring, &config.shell)?;

        report(Status::BakingTexture);
        let skin = estimate_skin_tone(
            photo,
            landmarks,
            &topology.skin_samples,
            config.skin.patch_size,
            Color::from(config.skin.fallback_color),
        );
        let texture = bake_face_texture(photo, landmarks, &topology.face_contour, skin, &config.texture)?;

        report(Status::FittingHeadwear);
        let asset = match &self.headwear {
            Some(asset) => asset.clone(),
            None => load_headwear(&config.headwear.path)?,
        };
        let headwear = fit_headwear(asset, &bounds, &config.headwear)?;

        let node = assemble_head(face, back, texture, skin, headwear, bounds)?;
        info!(
            "built head: {} vertices, {} triangles, skin ({:.2}, {:.2}, {:.2}), headwear scale {:.3}",
            node.vertex_count(),
            node.triangle_count(),
            skin.r,
            skin.g,
            skin.b,
            node.headwear.transform.scale
        );
        report(Status::Done);
        Ok(node)
    }
}

/// Full flow for one picked photo: load, detect, build.
///
/// When the source finds no face, no builder runs and `NoFace` is returned.
/// Failures are logged in full and reported as a short status.
pub fn run_build(
    source: &dyn LandmarkSource,
    builder: &HeadBuilder,
    photo_path: &Path,
    report: &mut dyn FnMut(Status),
) -> Result<BuildOutcome, BuildError> {
    let result = detect_and_build(source, builder, photo_path, report);
    if let Err(err) = &result {
        error!("build from {} failed: {err}", photo_path.display());
        report(Status::Failed(err.status_message()));
    }
    result
}

fn detect_and_build(
    source: &dyn LandmarkSource,
    builder: &HeadBuilder,
    photo_path: &Path,
    report: &mut dyn FnMut(Status),
) -> Result<BuildOutcome, BuildError> {
    report(Status::LoadingImage);
    let photo = Photo::open(photo_path)?;

    report(Status::Detecting);
    let Some(landmarks) = source.detect(&photo)? else {
        info!("no face found in {}", photo_path.display());
        report(Status::NoFace);
        return Ok(BuildOutcome::NoFace);
    };

    let node = builder.build(&photo.image, &landmarks, report)?;
    Ok(BuildOutcome::Built(Box::new(node)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use image::Rgba;
    use crate::head::fixtures;
    use crate::head::headwear::AssetMesh;
    use crate::head::landmarks::LandmarkError;

    fn beanie() -> HeadwearAsset {
        HeadwearAsset::new(vec![AssetMesh {
            name: "beanie".into(),
            positions: vec![Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, -1.0), Vec3::new(0.0, 1.0, 1.0)],
            indices: vec![0, 1, 2],
        }])
    }

    fn small_config() -> HeadConfig {
        let mut config = HeadConfig::default();
        config.texture.width = 64;
        config.texture.height = 64;
        config
    }

    #[test]
    fn build_reports_stages_in_order() {
        let (landmarks, topology) = fixtures::dome_face(24);
        let builder = HeadBuilder::new(small_config(), topology).with_headwear(beanie());
        let photo = RgbaImage::from_pixel(80, 80, Rgba([180, 140, 120, 255]));
        let mut seen = Vec::new();
        let node = builder.build(&photo, &landmarks, &mut |s| seen.push(s)).unwrap();

        assert_eq!(
            seen,
            vec![Status::BuildingMesh, Status::BakingTexture, Status::FittingHeadwear, Status::Done]
        );
        let ring = builder.topology().back_ring.len();
        assert_eq!(node.vertex_count(), landmarks.len() + 4 * ring + 1);
        assert_eq!(node.mesh.face_texture.dimensions(), (64, 64));
        assert!((node.mesh.back_color.r - 180.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn wrong_landmark_count_is_a_landmark_error() {
        let (_, topology) = fixtures::dome_face(24);
        let builder = HeadBuilder::new(small_config(), topology).with_headwear(beanie());
        let short = Landmarks::new(vec![Vec3::ZERO; 10]);
        let err = builder.build(&RgbaImage::new(8, 8), &short, &mut |_| {}).unwrap_err();
        assert!(matches!(err, BuildError::Landmark(LandmarkError::WrongCount { .. })));
        assert_eq!(err.status_message(), "Landmarks unusable");
    }

    #[test]
    fn missing_headwear_aborts_build() {
        let (landmarks, topology) = fixtures::dome_face(24);
        let mut config = small_config();
        config.headwear.path = "/nonexistent/hat.gltf".into();
        let builder = HeadBuilder::new(config, topology);
        let mut last = None;
        let err = builder.build(&RgbaImage::new(8, 8), &landmarks, &mut |s| last = Some(s)).unwrap_err();
        assert!(matches!(err, BuildError::Headwear(_)));
        assert_eq!(last, Some(Status::FittingHeadwear));
    }

    #[test]
    fn status_strings_are_short() {
        assert_eq!(Status::NoFace.to_string(), "No face detected");
        assert_eq!(Status::Failed("Texture bake failed").to_string(), "Texture bake failed");
    }
}
