// Render-side mesh types and smooth-normal triangulation.
//
// Two paths end in a RenderMesh:
//   PolyMesh (n-gon faces) → triangulate_smooth() → RenderMesh           (placeholder head)
//   GeometryPatch (merged, indexed) → RenderMesh::from_patch()           (generated head)

use glam::{Vec2, Vec3};
use super::geometry::{GeometryPatch, NORMAL, POSITION, UV};

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex with position, normal and texture coordinate.
///   @location(0) position: vec3<f32>
///   @location(1) normal:   vec3<f32>
///   @location(2) uv:       vec2<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
    pub uv:       [f32; 2],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (2 * std::mem::size_of::<[f32; 3]>()) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

// ============================================================================
// POLY MESH
// ============================================================================

/// Intermediate polygon mesh for procedural shapes.
/// Faces are n-gons, CCW when viewed from outside.
pub struct PolyMesh {
    pub positions: Vec<Vec3>,
    pub faces:     Vec<Vec<usize>>,
}

impl PolyMesh {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            faces:     Vec::new(),
        }
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, pos: Vec3) -> usize {
        let idx = self.positions.len();
        self.positions.push(pos);
        idx
    }

    /// Add a face by vertex indices (CCW order).
    pub fn add_face(&mut self, indices: Vec<usize>) {
        debug_assert!(indices.len() >= 3, "Face must have at least 3 vertices");
        self.faces.push(indices);
    }

    pub fn vertex_count(&self) -> usize { self.positions.len() }
}

impl Default for PolyMesh {
    fn default() -> Self { Self::new() }
}

// ============================================================================
// RENDER MESH
// ============================================================================

/// A contiguous index range drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawGroup {
    /// First index (not triangle) of the range.
    pub start:    u32,
    pub count:    u32,
    pub material: usize,
}

/// GPU-ready triangulated mesh. Vertices are shared through the index buffer.
#[derive(Debug, Clone)]
pub struct RenderMesh {
    pub vertices: Vec<GpuVertex>,
    pub indices:  Vec<u32>,
}

impl RenderMesh {
    /// Interleave a patch's position/normal/uv attributes.
    /// Missing normals or uvs are written as zero.
    pub fn from_patch(patch: &GeometryPatch) -> Self {
        let positions = patch.f32_attribute(POSITION).unwrap_or(&[]);
        let normals = patch.f32_attribute(NORMAL);
        let uvs = patch.f32_attribute(UV);
        let count = positions.len() / 3;

        let vertices = (0..count)
            .map(|i| GpuVertex {
                position: [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]],
                normal: normals
                    .filter(|n| n.len() >= (i + 1) * 3)
                    .map(|n| [n[i * 3], n[i * 3 + 1], n[i * 3 + 2]])
                    .unwrap_or([0.0; 3]),
                uv: uvs
                    .filter(|t| t.len() >= (i + 1) * 2)
                    .map(|t| [t[i * 2], t[i * 2 + 1]])
                    .unwrap_or([0.0; 2]),
            })
            .collect();

        let indices = match patch.indices() {
            Some(idx) => idx.to_vec(),
            None => (0..count as u32).collect(),
        };

        Self { vertices, indices }
    }

    /// Cast vertex slice to raw bytes for wgpu buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Cast index slice to raw bytes for wgpu buffer upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> usize  { self.indices.len() }
}

// ============================================================================
// VERTEX NORMALS
// ============================================================================

/// Area-weighted vertex normals for an indexed triangle list.
///
/// The cross product of two triangle edges has magnitude 2×area, so summing
/// unnormalised face normals weights each face by its area. Vertices with no
/// (or only degenerate) faces get a zero normal.
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let weighted = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        accum[a] += weighted;
        accum[b] += weighted;
        accum[c] += weighted;
    }

    accum.into_iter().map(Vec3::normalize_or_zero).collect()
}

/// Convert a PolyMesh to a RenderMesh with smooth (area-weighted) normals.
///
/// Faces are fan-triangulated from their first vertex; `uv_of` supplies a
/// texture coordinate per position.
pub fn triangulate_smooth(poly: &PolyMesh, uv_of: impl Fn(Vec3) -> Vec2) -> RenderMesh {
    let mut indices: Vec<u32> = Vec::new();
    for face in &poly.faces {
        for i in 1..(face.len() - 1) {
            indices.push(face[0]     as u32);
            indices.push(face[i]     as u32);
            indices.push(face[i + 1] as u32);
        }
    }

    let normals = compute_vertex_normals(&poly.positions, &indices);

    let vertices = poly.positions.iter()
        .zip(normals.iter())
        .map(|(pos, n)| GpuVertex {
            position: pos.to_array(),
            normal:   n.to_array(),
            uv:       uv_of(*pos).to_array(),
        })
        .collect();

    RenderMesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_quad_normals_point_along_winding() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2, 0, 2, 3]);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn unreferenced_vertex_gets_zero_normal() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::splat(5.0)];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2]);
        assert_eq!(normals[3], Vec3::ZERO);
    }

    #[test]
    fn triangulate_fans_quads() {
        let mut poly = PolyMesh::new();
        let a = poly.add_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = poly.add_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = poly.add_vertex(Vec3::new(1.0, 1.0, 0.0));
        let d = poly.add_vertex(Vec3::new(0.0, 1.0, 0.0));
        poly.add_face(vec![a, b, c, d]);

        let mesh = triangulate_smooth(&poly, |p| Vec2::new(p.x, p.y));
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[2].uv, [1.0, 1.0]);
        assert_eq!(mesh.index_bytes().len(), 6 * 4);
    }
}
