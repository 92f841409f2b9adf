// Synthetic landmark sets for unit tests.

use std::f32::consts::TAU;
use glam::Vec3;
use super::landmarks::Landmarks;
use super::topology::FaceTopology;

/// Flat face: a center point, an outer ring of `ring` points (radius 0.3,
/// counter-clockwise) and an inner ring (radius 0.15), all at z = 0. The
/// triangle table is frozen from this layout.
pub fn disc_face(ring: usize) -> (Landmarks, FaceTopology) {
    face_with_relief(ring, 0.0)
}

/// Like `disc_face`, but the center and inner ring bulge toward +z.
pub fn dome_face(ring: usize) -> (Landmarks, FaceTopology) {
    face_with_relief(ring, 0.08)
}

fn face_with_relief(ring: usize, relief: f32) -> (Landmarks, FaceTopology) {
    let mut points = vec![Vec3::new(0.0, 0.0, relief)];
    for k in 0..ring {
        let a = k as f32 / ring as f32 * TAU;
        points.push(Vec3::new(0.3 * a.cos(), 0.3 * a.sin(), 0.0));
    }
    for k in 0..ring {
        let a = (k as f32 + 0.5) / ring as f32 * TAU;
        points.push(Vec3::new(0.15 * a.cos(), 0.15 * a.sin(), relief * 0.5));
    }

    let outer: Vec<usize> = (1..=ring).collect();
    let landmarks = Landmarks::new(points);
    let mut topology = FaceTopology {
        landmark_count: landmarks.len(),
        nose_center: vec![0],
        nose_adjacent: vec![],
        skin_samples: vec![0, ring + 1, ring + ring / 2 + 1],
        back_ring: outer.clone(),
        face_contour: outer,
        triangles: vec![],
    };
    topology.freeze_triangles(&landmarks).unwrap();
    (landmarks, topology)
}
