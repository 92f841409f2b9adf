// Headwear: an authored glTF asset, scaled and placed from the head's box.

use std::path::{Path, PathBuf};
use glam::{EulerRot, Mat4, Quat, Vec3};
use log::{debug, info};
use thiserror::Error;
use crate::config::HeadwearConfig;
use crate::engine::components::Color;
use crate::engine::geometry::{Attribute, GeometryPatch, POSITION};
use super::bounds::BoundingBox;

#[derive(Error, Debug)]
pub enum HeadwearError {
    #[error("failed to load headwear {path}: {source}")]
    Gltf { path: PathBuf, source: gltf::Error },
    #[error("headwear {0} contains no triangle meshes")]
    NoMeshes(PathBuf),
    #[error("headwear asset has a zero-size bounding box")]
    DegenerateAsset,
}

/// One triangle primitive of the asset, node transforms already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl AssetMesh {
    pub fn to_patch(&self) -> GeometryPatch {
        GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, self.positions.iter().flat_map(|p| p.to_array()).collect()))
            .with_indices(self.indices.clone())
    }
}

#[derive(Debug, Clone)]
pub struct HeadwearAsset {
    pub meshes: Vec<AssetMesh>,
}

impl HeadwearAsset {
    pub fn new(meshes: Vec<AssetMesh>) -> Self {
        Self { meshes }
    }

    /// Extent of every vertex in asset space. `None` when there are none.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let points: Vec<Vec3> = self.meshes.iter().flat_map(|m| m.positions.iter().copied()).collect();
        BoundingBox::from_points(&points)
    }
}

/// Load the triangle meshes of a glTF file's default scene.
///
/// Authored materials and images are ignored; only geometry is read.
pub fn load_headwear(path: &Path) -> Result<HeadwearAsset, HeadwearError> {
    let gltf_err = |source| HeadwearError::Gltf { path: path.to_path_buf(), source };
    let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(gltf_err)?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob).map_err(gltf_err)?;

    let mut meshes = Vec::new();
    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().collect(),
    };
    for node in roots {
        collect_node(&node, Mat4::IDENTITY, &buffers, &mut meshes);
    }

    if meshes.is_empty() {
        return Err(HeadwearError::NoMeshes(path.to_path_buf()));
    }
    info!(
        "loaded headwear {} ({} meshes, {} vertices)",
        path.display(),
        meshes.len(),
        meshes.iter().map(|m| m.positions.len()).sum::<usize>()
    );
    Ok(HeadwearAsset::new(meshes))
}

fn collect_node(node: &gltf::Node, parent: Mat4, buffers: &[gltf::buffer::Data], out: &mut Vec<AssetMesh>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
            let Some(positions) = reader.read_positions() else { continue };
            let positions: Vec<Vec3> = positions.map(|p| world.transform_point3(Vec3::from(p))).collect();
            let mut indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            indices.truncate(indices.len() / 3 * 3);
            // A mirroring node transform reverses the winding.
            if world.determinant() < 0.0 {
                for tri in indices.chunks_exact_mut(3) {
                    tri.swap(1, 2);
                }
            }
            let name = mesh.name().unwrap_or("headwear").to_string();
            debug!("headwear mesh {name}: {} vertices", positions.len());
            out.push(AssetMesh { name, positions, indices });
        }
    }
    for child in node.children() {
        collect_node(&child, world, buffers, out);
    }
}

/// Single flat material shared by every headwear mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatMaterial {
    pub color: Color,
    pub roughness: f32,
    pub metalness: f32,
}

impl FlatMaterial {
    pub fn headwear(config: &HeadwearConfig) -> Self {
        Self {
            color: Color::from(config.color),
            roughness: config.roughness,
            metalness: config.metalness,
        }
    }
}

/// Uniform scale, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetTransform {
    pub scale: f32,
    pub rotation: Quat,
    pub translation: Vec3,
}

impl AssetTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
pub struct FittedHeadwear {
    pub asset: HeadwearAsset,
    pub transform: AssetTransform,
    pub material: FlatMaterial,
}

impl FittedHeadwear {
    /// Box of the asset after its fit transform.
    pub fn world_bounds(&self) -> Option<BoundingBox> {
        let m = self.transform.matrix();
        let points: Vec<Vec3> = self
            .asset
            .meshes
            .iter()
            .flat_map(|mesh| mesh.positions.iter().map(move |p| m.transform_point3(*p)))
            .collect();
        BoundingBox::from_points(&points)
    }
}

/// Half-diagonal of the head box, with depth assumed to be half the width.
pub fn head_half_diagonal(bounds: &BoundingBox) -> f32 {
    let (w, h) = (bounds.width, bounds.height);
    0.5 * (w * w + h * h + (w * 0.5) * (w * 0.5)).sqrt()
}

/// Scale, rotate and place `asset` relative to the head box.
///
/// The asset's half-diagonal ends up at `scale_factor` head half-diagonals,
/// and its post-rotation box center at the head center shifted up by
/// `offset_up` and back (toward -z) by `offset_back` head half-diagonals.
pub fn fit_headwear(
    asset: HeadwearAsset,
    head: &BoundingBox,
    config: &HeadwearConfig,
) -> Result<FittedHeadwear, HeadwearError> {
    let asset_bounds = asset.bounds().ok_or(HeadwearError::DegenerateAsset)?;
    let asset_half = asset_bounds.half_diagonal();
    if !(asset_half.is_finite() && asset_half > f32::EPSILON) {
        return Err(HeadwearError::DegenerateAsset);
    }

    let head_half = head_half_diagonal(head);
    let scale = head_half * config.scale_factor / asset_half;
    let [rx, ry, rz] = config.rotation_deg.map(f32::to_radians);
    let rotation = Quat::from_euler(EulerRot::XYZ, rx, ry, rz);

    let placed: Vec<Vec3> = asset
        .meshes
        .iter()
        .flat_map(|m| m.positions.iter().map(|p| rotation * (*p * scale)))
        .collect();
    let placed_center = BoundingBox::from_points(&placed)
        .ok_or(HeadwearError::DegenerateAsset)?
        .center();
    let target = head.center() + Vec3::new(0.0, head_half * config.offset_up, -head_half * config.offset_back);

    let transform = AssetTransform { scale, rotation, translation: target - placed_center };
    debug!("headwear fit: scale {:.4}, translation {:?}", scale, transform.translation);
    Ok(FittedHeadwear { asset, transform, material: FlatMaterial::headwear(config) })
}
