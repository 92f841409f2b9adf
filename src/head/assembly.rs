// Head assembly: merged face + back mesh, fitted headwear, one parent node.

use glam::Vec3;
use image::RgbaImage;
use log::debug;
use crate::engine::components::Color;
use crate::engine::geometry::{merge_patches, GeometryPatch, MergeError};
use crate::engine::mesh::DrawGroup;
use super::bounds::BoundingBox;
use super::headwear::FittedHeadwear;

/// Name every generated head node carries, used to find and replace it.
pub const HEAD_NODE_NAME: &str = "generated-head";

/// Material slots of the head mesh.
pub const FACE_MATERIAL: usize = 0;
pub const BACK_MATERIAL: usize = 1;

/// Head geometry with two material ranges: the textured face, then the
/// flat-colored back shell.
#[derive(Debug, Clone)]
pub struct HeadMesh {
    pub geometry: GeometryPatch,
    pub groups: [DrawGroup; 2],
    pub face_texture: RgbaImage,
    pub back_color: Color,
}

/// Parent node of a generated head. Children (head mesh, headwear) stay in
/// landmark space; only the parent is offset by `translation` so the local
/// origin sits on the head's box center.
#[derive(Debug, Clone)]
pub struct HeadNode {
    pub name: String,
    pub translation: Vec3,
    pub bounds: BoundingBox,
    pub mesh: HeadMesh,
    pub headwear: FittedHeadwear,
}

impl HeadNode {
    pub fn vertex_count(&self) -> usize { self.mesh.geometry.vertex_count() }

    pub fn triangle_count(&self) -> usize { self.mesh.geometry.triangle_count() }
}

/// Merge face and back patches, recompute normals across the seam and
/// wrap everything in a recentered parent node.
pub fn assemble_head(
    face: GeometryPatch,
    back: GeometryPatch,
    face_texture: RgbaImage,
    skin: Color,
    headwear: FittedHeadwear,
    bounds: BoundingBox,
) -> Result<HeadNode, MergeError> {
    let face_indices = face.indices().map_or(0, <[u32]>::len) as u32;
    let mut geometry = merge_patches(vec![face, back], false)?;
    geometry.compute_vertex_normals();
    let total = geometry.indices().map_or(0, <[u32]>::len) as u32;

    let groups = [
        DrawGroup { start: 0, count: face_indices, material: FACE_MATERIAL },
        DrawGroup { start: face_indices, count: total - face_indices, material: BACK_MATERIAL },
    ];
    debug!(
        "assembled head: {} vertices, {} triangles, face {} / back {} indices",
        geometry.vertex_count(),
        geometry.triangle_count(),
        groups[0].count,
        groups[1].count
    );

    Ok(HeadNode {
        name: HEAD_NODE_NAME.to_string(),
        translation: -bounds.center(),
        bounds,
        mesh: HeadMesh { geometry, groups, face_texture, back_color: skin },
        headwear,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadwearConfig;
    use crate::engine::geometry::{Attribute, NORMAL, POSITION, UV};
    use crate::head::headwear::{fit_headwear, AssetMesh, HeadwearAsset};

    fn tri(z: f32) -> GeometryPatch {
        GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, vec![0.0, 0.0, z, 1.0, 0.0, z, 0.0, 1.0, z]))
            .with_attribute(UV, Attribute::f32(2, vec![0.0; 6]))
            .with_indices(vec![0, 1, 2])
    }

    fn hat(bounds: &BoundingBox) -> FittedHeadwear {
        let asset = HeadwearAsset::new(vec![AssetMesh {
            name: "hat".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2],
        }]);
        fit_headwear(asset, bounds, &HeadwearConfig::default()).unwrap()
    }

    #[test]
    fn parent_is_recentered_and_groups_split_materials() {
        let bounds = BoundingBox::from_extent(Vec3::new(0.0, 0.0, -1.0), Vec3::new(1.0, 1.0, 0.0));
        let back = GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, vec![0.0, 0.0, -1.0, 0.0, 1.0, -1.0, 1.0, 0.0, -1.0, 1.0, 1.0, -1.0]))
            .with_attribute(UV, Attribute::f32(2, vec![0.0; 8]))
            .with_indices(vec![0, 1, 2, 1, 3, 2]);
        let node = assemble_head(tri(0.0), back, RgbaImage::new(2, 2), Color::new(0.5, 0.4, 0.3), hat(&bounds), bounds).unwrap();

        assert_eq!(node.name, HEAD_NODE_NAME);
        assert_eq!(node.translation, Vec3::new(-0.5, -0.5, 0.5));
        assert_eq!(node.vertex_count(), 7);
        assert_eq!(node.triangle_count(), 3);
        assert_eq!(node.mesh.groups[0], DrawGroup { start: 0, count: 3, material: FACE_MATERIAL });
        assert_eq!(node.mesh.groups[1], DrawGroup { start: 3, count: 6, material: BACK_MATERIAL });
        assert!(node.mesh.geometry.attribute(NORMAL).is_some());
        assert!(node.mesh.geometry.groups().is_empty());
    }

    #[test]
    fn mismatched_patches_fail_to_assemble() {
        let bounds = BoundingBox::from_extent(Vec3::ZERO, Vec3::ONE);
        let bare = GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, vec![0.0; 9]))
            .with_indices(vec![0, 1, 2]);
        let err = assemble_head(tri(0.0), bare, RgbaImage::new(1, 1), Color::new(0.0, 0.0, 0.0), hat(&bounds), bounds).unwrap_err();
        assert!(matches!(err, MergeError::MissingAttribute { patch: 1, .. }));
    }
}
