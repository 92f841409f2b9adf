// Crate-level build error. Each stage keeps its own error type; this one
// only wraps them so a build can fail with a single `?` chain.

use thiserror::Error;
use crate::config::ConfigError;
use crate::engine::geometry::MergeError;
use crate::head::back_shell::ShellError;
use crate::head::headwear::HeadwearError;
use crate::head::landmarks::LandmarkError;
use crate::head::texture_bake::BakeError;
use crate::head::topology::TopologyError;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("failed to load photo: {0}")]
    Photo(#[from] image::ImageError),
    #[error(transparent)]
    Landmark(#[from] LandmarkError),
    #[error("landmark set is empty")]
    NoBounds,
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Bake(#[from] BakeError),
    #[error(transparent)]
    Headwear(#[from] HeadwearError),
}

impl BuildError {
    /// Short text for the status line. Full detail goes to the log.
    pub fn status_message(&self) -> &'static str {
        match self {
            BuildError::Config(_) | BuildError::Topology(_) => "Setup error",
            BuildError::Photo(_) => "Could not read image",
            BuildError::Landmark(LandmarkError::NotInitialized) => "Detector not ready",
            BuildError::Landmark(_) | BuildError::NoBounds => "Landmarks unusable",
            BuildError::Shell(_) | BuildError::Merge(_) => "Mesh build failed",
            BuildError::Bake(_) => "Texture bake failed",
            BuildError::Headwear(_) => "Headwear failed to load",
        }
    }
}
