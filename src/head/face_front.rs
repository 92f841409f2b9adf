// Face-front patch: one vertex per landmark, fixed triangle topology.

use glam::Vec3;
use log::debug;
use crate::config::FaceConfig;
use crate::engine::geometry::{Attribute, GeometryPatch, POSITION, UV};
use super::landmarks::{LandmarkError, Landmarks};
use super::topology::FaceTopology;

/// Planar texture coordinate of a landmark: mirrored in x, identity in y,
/// both centered at 0.5.
pub fn face_uv(p: Vec3) -> [f32; 2] {
    [0.5 - p.x, 0.5 + p.y]
}

/// Build the face patch.
///
/// The topology's triangle table is in detector winding; each `(a, b, c)` is
/// emitted as `(a, c, b)` so the front faces +z. The index buffer therefore
/// depends only on the topology, never on where the landmarks sit. Nose-adjacent landmarks keep only
/// `config.nose_pull` of their offset from the nose center, which damps
/// detector spikes without removing them from the topology.
pub fn build_face_front(
    landmarks: &Landmarks,
    topology: &FaceTopology,
    config: &FaceConfig,
) -> Result<GeometryPatch, LandmarkError> {
    landmarks.validate(topology.landmark_count)?;
    let triangles = &topology.triangles;
    if let Some(&index) = triangles.iter().flatten().find(|&&i| i as usize >= landmarks.len()) {
        return Err(LandmarkError::IndexOutOfRange { index: index as usize, len: landmarks.len() });
    }

    let nose_center = landmarks.mean_of(&topology.nose_center)?;
    let mut points = landmarks.points().to_vec();
    for &i in &topology.nose_adjacent {
        let p = landmarks.point(i)?;
        points[i] = nose_center + (p - nose_center) * config.nose_pull;
    }

    let positions: Vec<f32> = points.iter().flat_map(|p| p.to_array()).collect();
    let uvs: Vec<f32> = landmarks.points().iter().flat_map(|p| face_uv(*p)).collect();
    let indices: Vec<u32> = triangles.iter().flat_map(|&[a, b, c]| [a, c, b]).collect();

    debug!("face front: {} vertices, {} triangles", points.len(), triangles.len());

    Ok(GeometryPatch::new()
        .with_attribute(POSITION, Attribute::f32(3, positions))
        .with_attribute(UV, Attribute::f32(2, uvs))
        .with_indices(indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::head::fixtures;

    #[test]
    fn one_vertex_and_uv_per_landmark() {
        let (landmarks, topology) = fixtures::disc_face(24);
        let tris = &topology.triangles;
        let patch = build_face_front(&landmarks, &topology, &FaceConfig::default()).unwrap();

        assert_eq!(patch.vertex_count(), landmarks.len());
        assert_eq!(patch.f32_attribute(UV).unwrap().len(), 2 * landmarks.len());
        assert!(patch.indices().unwrap().iter().all(|&i| (i as usize) < landmarks.len()));
        assert_eq!(patch.triangle_count(), tris.len());
    }

    #[test]
    fn winding_is_flipped_and_faces_viewer() {
        let (landmarks, topology) = fixtures::disc_face(24);
        let tris = &topology.triangles;
        let patch = build_face_front(&landmarks, &topology, &FaceConfig::default()).unwrap();
        let idx = patch.indices().unwrap();
        assert_eq!([idx[0], idx[1], idx[2]], [tris[0][0], tris[0][2], tris[0][1]]);

        let mut patch = patch;
        patch.compute_vertex_normals();
        let normals = patch.f32_attribute(crate::engine::geometry::NORMAL).unwrap();
        // Every vertex of a flat disc should face +z.
        assert!(normals.chunks_exact(3).all(|n| n[2] > 0.99));
    }

    #[test]
    fn index_buffer_is_fixed_across_face_proportions() {
        let (landmarks, topology) = fixtures::dome_face(24);
        let narrow = Landmarks::new(landmarks.points().iter().map(|p| *p * Vec3::new(0.6, 1.0, 1.0)).collect());
        let wide = Landmarks::new(landmarks.points().iter().map(|p| *p * Vec3::new(1.4, 0.9, 1.2)).collect());

        let config = FaceConfig::default();
        let reference = build_face_front(&landmarks, &topology, &config).unwrap();
        for other in [&narrow, &wide] {
            let patch = build_face_front(other, &topology, &config).unwrap();
            assert_eq!(patch.indices(), reference.indices());
            assert_ne!(patch.positions_vec3(), reference.positions_vec3());
        }
    }

    #[test]
    fn uv_is_mirrored_planar_projection() {
        assert_eq!(face_uv(Vec3::new(0.25, 0.25, 0.0)), [0.25, 0.75]);
        assert_eq!(face_uv(Vec3::ZERO), [0.5, 0.5]);
    }

    #[test]
    fn nose_points_are_pulled_toward_center() {
        let (landmarks, mut topology) = fixtures::disc_face(24);
        topology.nose_center = vec![0];
        topology.nose_adjacent = vec![1];
        let config = FaceConfig { nose_pull: 0.5 };
        let patch = build_face_front(&landmarks, &topology, &config).unwrap();
        let pos = patch.positions_vec3();
        let expected = landmarks.points()[0] + (landmarks.points()[1] - landmarks.points()[0]) * 0.5;
        assert!((pos[1] - expected).length() < 1e-6);
        assert_eq!(pos[2], landmarks.points()[2]);
    }

    #[test]
    fn wrong_landmark_count_fails_fast() {
        let (_, topology) = fixtures::disc_face(24);
        let short = Landmarks::new(vec![Vec3::ZERO; 5]);
        let err = build_face_front(&short, &topology, &FaceConfig::default()).unwrap_err();
        assert!(matches!(err, LandmarkError::WrongCount { .. }));
    }
}
