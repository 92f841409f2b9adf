// Indexed geometry patches with named, typed attributes, and their merge.
//
// A patch is the unit handed between builders: positions/uvs/normals live in
// flat arrays keyed by name, each with a fixed element size (3 for positions,
// 2 for uvs). Merging concatenates attribute-by-attribute and shifts every
// patch's indices by the vertex count of the patches before it.

use std::collections::BTreeMap;
use glam::Vec3;
use thiserror::Error;
use super::mesh::compute_vertex_normals;

pub const POSITION: &str = "position";
pub const NORMAL: &str = "normal";
pub const UV: &str = "uv";

#[derive(Error, Debug, PartialEq)]
pub enum MergeError {
    #[error("nothing to merge")]
    Empty,
    #[error("patch {patch}: indexed and non-indexed patches cannot be merged")]
    MixedIndexing { patch: usize },
    #[error("patch {patch}: missing attribute '{name}' declared by patch 0")]
    MissingAttribute { patch: usize, name: String },
    #[error("patch {patch}: attribute '{name}' is not declared by patch 0")]
    UnexpectedAttribute { patch: usize, name: String },
    #[error("patch {patch}: attribute '{name}' has element size {found}, expected {expected}")]
    ItemSizeMismatch { patch: usize, name: String, expected: usize, found: usize },
    #[error("patch {patch}: attribute '{name}' has a different numeric type than patch 0")]
    TypeMismatch { patch: usize, name: String },
    #[error("patch {patch}: attribute '{name}' length is not a multiple of its element size or disagrees with the vertex count")]
    RaggedAttribute { patch: usize, name: String },
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// Flat attribute storage. The variant is the numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    F32(Vec<f32>),
    U32(Vec<u32>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::F32(v) => v.len(),
            AttributeData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn same_type(&self, other: &AttributeData) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn extend_from(&mut self, other: AttributeData) {
        match (self, other) {
            (AttributeData::F32(dst), AttributeData::F32(src)) => dst.extend(src),
            (AttributeData::U32(dst), AttributeData::U32(src)) => dst.extend(src),
            // Type agreement is checked before any data moves.
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Number of scalars per vertex (3 for positions, 2 for uvs).
    pub item_size: usize,
    pub data: AttributeData,
}

impl Attribute {
    pub fn f32(item_size: usize, data: Vec<f32>) -> Self {
        Self { item_size, data: AttributeData::F32(data) }
    }

    pub fn count(&self) -> usize {
        if self.item_size == 0 { 0 } else { self.data.len() / self.item_size }
    }
}

/// Index range recorded per source patch when merging with groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexGroup {
    pub start:  u32,
    pub count:  u32,
    pub source: usize,
}

// ============================================================================
// GEOMETRY PATCH
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryPatch {
    attributes: BTreeMap<String, Attribute>,
    indices:    Option<Vec<u32>>,
    groups:     Vec<IndexGroup>,
}

impl GeometryPatch {
    pub fn new() -> Self { Self::default() }

    pub fn with_attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.set_attribute(name, attribute);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn set_attribute(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_string(), attribute);
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Borrow an `f32` attribute's flat data.
    pub fn f32_attribute(&self, name: &str) -> Option<&[f32]> {
        match self.attributes.get(name).map(|a| &a.data) {
            Some(AttributeData::F32(v)) => Some(v),
            _ => None,
        }
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn groups(&self) -> &[IndexGroup] {
        &self.groups
    }

    /// Vertex count: the position count, or the first attribute's count when
    /// the patch carries no positions.
    pub fn vertex_count(&self) -> usize {
        self.attributes
            .get(POSITION)
            .or_else(|| self.attributes.values().next())
            .map(Attribute::count)
            .unwrap_or(0)
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(idx) => idx.len() / 3,
            None => self.vertex_count() / 3,
        }
    }

    /// Positions as vectors. Empty when the patch has no `f32` positions.
    pub fn positions_vec3(&self) -> Vec<Vec3> {
        self.f32_attribute(POSITION)
            .map(|p| p.chunks_exact(3).map(Vec3::from_slice).collect())
            .unwrap_or_default()
    }

    /// Replace the `normal` attribute with area-weighted vertex normals.
    /// Non-indexed patches are treated as a plain triangle list.
    pub fn compute_vertex_normals(&mut self) {
        let positions = self.positions_vec3();
        let sequential: Vec<u32>;
        let indices = match &self.indices {
            Some(idx) => idx.as_slice(),
            None => {
                sequential = (0..positions.len() as u32).collect();
                &sequential
            }
        };
        let normals = compute_vertex_normals(&positions, indices);
        let flat = normals.iter().flat_map(|n| n.to_array()).collect();
        self.set_attribute(NORMAL, Attribute::f32(3, flat));
    }
}

// ============================================================================
// MERGE
// ============================================================================

/// Concatenate patches into one, consuming them.
///
/// Every patch must declare exactly the attribute set of the first patch,
/// with the same element size and numeric type per attribute. Either all
/// patches are indexed or none is. Indices of patch `k` are offset by the
/// total vertex count of patches `0..k`. With `record_groups`, one
/// `IndexGroup` per source patch is recorded on the result.
pub fn merge_patches(patches: Vec<GeometryPatch>, record_groups: bool) -> Result<GeometryPatch, MergeError> {
    let first = patches.first().ok_or(MergeError::Empty)?;
    let indexed = first.indices.is_some();

    for (p, patch) in patches.iter().enumerate() {
        if patch.indices.is_some() != indexed {
            return Err(MergeError::MixedIndexing { patch: p });
        }
        for (name, reference) in &first.attributes {
            let attr = patch.attributes.get(name).ok_or_else(|| MergeError::MissingAttribute {
                patch: p,
                name: name.clone(),
            })?;
            if attr.item_size != reference.item_size {
                return Err(MergeError::ItemSizeMismatch {
                    patch: p,
                    name: name.clone(),
                    expected: reference.item_size,
                    found: attr.item_size,
                });
            }
            if !attr.data.same_type(&reference.data) {
                return Err(MergeError::TypeMismatch { patch: p, name: name.clone() });
            }
            if attr.item_size == 0
                || attr.data.len() % attr.item_size != 0
                || attr.count() != patch.vertex_count()
            {
                return Err(MergeError::RaggedAttribute { patch: p, name: name.clone() });
            }
        }
        if let Some(extra) = patch.attributes.keys().find(|k| !first.attributes.contains_key(*k)) {
            return Err(MergeError::UnexpectedAttribute { patch: p, name: extra.clone() });
        }
    }

    let mut merged = GeometryPatch::new();
    let mut merged_indices: Vec<u32> = Vec::new();
    let mut vertex_offset: u32 = 0;
    let mut group_start: u32 = 0;

    for (p, patch) in patches.into_iter().enumerate() {
        let vertex_count = patch.vertex_count() as u32;

        let count = if let Some(indices) = patch.indices {
            let n = indices.len() as u32;
            merged_indices.extend(indices.into_iter().map(|i| i + vertex_offset));
            n
        } else {
            vertex_count
        };
        if record_groups {
            merged.groups.push(IndexGroup { start: group_start, count, source: p });
        }
        group_start += count;

        for (name, attr) in patch.attributes {
            match merged.attributes.get_mut(&name) {
                Some(dst) => dst.data.extend_from(attr.data),
                None => { merged.attributes.insert(name, attr); }
            }
        }
        vertex_offset += vertex_count;
    }

    if indexed {
        merged.indices = Some(merged_indices);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(offset: f32) -> GeometryPatch {
        GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, vec![
                offset, 0.0, 0.0,
                offset + 1.0, 0.0, 0.0,
                offset, 1.0, 0.0,
            ]))
            .with_attribute(UV, Attribute::f32(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]))
            .with_indices(vec![0, 1, 2])
    }

    #[test]
    fn merge_is_size_additive_and_offsets_indices() {
        let a = triangle(0.0);
        let merged = merge_patches(vec![a.clone(), a.clone()], false).unwrap();
        assert_eq!(merged.vertex_count(), 2 * a.vertex_count());
        assert_eq!(merged.indices().unwrap(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(merged.f32_attribute(UV).unwrap().len(), 12);
        assert!(merged.groups().is_empty());
    }

    #[test]
    fn merge_is_associative() {
        let (a, b, c) = (triangle(0.0), triangle(2.0), triangle(4.0));
        let left = merge_patches(vec![merge_patches(vec![a.clone(), b.clone()], false).unwrap(), c.clone()], false).unwrap();
        let right = merge_patches(vec![a, merge_patches(vec![b, c], false).unwrap()], false).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn merge_records_groups_per_source() {
        let merged = merge_patches(vec![triangle(0.0), triangle(1.0)], true).unwrap();
        assert_eq!(merged.groups(), &[
            IndexGroup { start: 0, count: 3, source: 0 },
            IndexGroup { start: 3, count: 3, source: 1 },
        ]);
    }

    #[test]
    fn missing_attribute_is_rejected() {
        let mut b = GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, vec![0.0; 9]))
            .with_indices(vec![0, 1, 2]);
        let err = merge_patches(vec![triangle(0.0), b.clone()], false).unwrap_err();
        assert_eq!(err, MergeError::MissingAttribute { patch: 1, name: UV.into() });

        b.set_attribute(UV, Attribute::f32(3, vec![0.0; 9]));
        let err = merge_patches(vec![triangle(0.0), b], false).unwrap_err();
        assert!(matches!(err, MergeError::ItemSizeMismatch { expected: 2, found: 3, .. }));
    }

    #[test]
    fn extra_attribute_and_type_mismatch_are_rejected() {
        let extra = triangle(0.0).with_attribute("color", Attribute::f32(3, vec![0.0; 9]));
        let err = merge_patches(vec![triangle(0.0), extra], false).unwrap_err();
        assert!(matches!(err, MergeError::UnexpectedAttribute { patch: 1, .. }));

        let mut wrong_type = triangle(0.0);
        wrong_type.set_attribute(UV, Attribute { item_size: 2, data: AttributeData::U32(vec![0; 6]) });
        let err = merge_patches(vec![triangle(0.0), wrong_type], false).unwrap_err();
        assert!(matches!(err, MergeError::TypeMismatch { .. }));
    }

    #[test]
    fn mixed_indexing_is_rejected() {
        let unindexed = GeometryPatch::new()
            .with_attribute(POSITION, Attribute::f32(3, vec![0.0; 9]))
            .with_attribute(UV, Attribute::f32(2, vec![0.0; 6]));
        let err = merge_patches(vec![triangle(0.0), unindexed], false).unwrap_err();
        assert_eq!(err, MergeError::MixedIndexing { patch: 1 });
        assert_eq!(merge_patches(Vec::new(), false).unwrap_err(), MergeError::Empty);
    }

    #[test]
    fn ragged_attribute_is_rejected() {
        let ragged = triangle(0.0).with_attribute(UV, Attribute::f32(2, vec![0.0; 4]));
        let err = merge_patches(vec![triangle(0.0), ragged], false).unwrap_err();
        assert!(matches!(err, MergeError::RaggedAttribute { patch: 1, .. }));
    }

    #[test]
    fn normals_follow_counter_clockwise_winding() {
        let mut patch = triangle(0.0);
        patch.compute_vertex_normals();
        let normals = patch.f32_attribute(NORMAL).unwrap();
        assert_eq!(normals.len(), 9);
        assert!((normals[2] - 1.0).abs() < 1e-6);
    }
}
