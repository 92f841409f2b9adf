// Procedural head pipeline: landmarks in, textured head node out.

pub mod assembly;
pub mod back_shell;
pub mod bounds;
pub mod face_front;
pub mod headwear;
pub mod landmarks;
pub mod pipeline;
pub mod skin_tone;
pub mod texture_bake;
pub mod topology;

#[cfg(test)]
pub(crate) mod fixtures;

pub use assembly::{HeadNode, HEAD_NODE_NAME};
pub use bounds::BoundingBox;
pub use landmarks::{LandmarkSource, Landmarks, Photo, SidecarLandmarkSource};
pub use pipeline::{run_build, BuildOutcome, HeadBuilder, Status};
pub use topology::FaceTopology;
