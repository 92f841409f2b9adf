// Back shell: head volume behind the face, lofted from a contour ring.
//
// Layout of the emitted vertices (n = ring size):
//   [0,   n)    the ring itself, at landmark depth
//   [n,   2n)   ring copy 1, z = min_z - 0.33·c
//   [2n,  3n)   ring copy 2, z = min_z - 0.66·c
//   [3n,  4n)   ring copy 3, z = min_z - c
//   4n          apex, dome_height·c behind copy 3
// where c = max(width, min_width) · depth_factor.
//
// Each copy is scaled toward the box center by its taper ratio and lifted by
// a bulge that grows with the point's height on the ring, so the crown rounds
// out above the forehead while the jaw tucks in.

use glam::{Vec2, Vec3};
use log::debug;
use thiserror::Error;
use crate::config::ShellConfig;
use crate::engine::geometry::{Attribute, GeometryPatch, POSITION, UV};
use super::bounds::BoundingBox;
use super::landmarks::{LandmarkError, Landmarks};

/// Depth of each lofted ring as a fraction of the shell depth.
pub const RING_DEPTHS: [f32; 3] = [0.33, 0.66, 1.0];

const SIDE_EPSILON: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("back ring needs at least 3 landmarks, has {0}")]
    RingTooSmall(usize),
    #[error(transparent)]
    Landmark(#[from] LandmarkError),
}

/// Build the back-shell patch for `ring` (landmark indices, closed loop).
pub fn build_back_shell(
    landmarks: &Landmarks,
    bounds: &BoundingBox,
    ring: &[usize],
    config: &ShellConfig,
) -> Result<GeometryPatch, ShellError> {
    let n = ring.len();
    if n < 3 {
        return Err(ShellError::RingTooSmall(n));
    }
    let base = ring
        .iter()
        .map(|&i| landmarks.point(i))
        .collect::<Result<Vec<Vec3>, _>>()?;

    let width = bounds.width.max(config.min_width);
    let height = bounds.height.max(config.min_width);
    let depth = width * config.depth_factor;
    let center = Vec2::new(bounds.cx, bounds.cy);
    let bulge = config.forehead_bulge * height;

    let mut positions: Vec<Vec3> = Vec::with_capacity(4 * n + 1);
    positions.extend_from_slice(&base);

    let mut last_z = bounds.min_z;
    for (taper, fraction) in config.ring_taper.iter().zip(RING_DEPTHS) {
        let z = bounds.min_z - depth * fraction;
        for p in &base {
            let rise = ((p.y - bounds.min_y) / height).clamp(0.0, 1.0);
            let xy = center + (p.truncate() - center) * *taper + Vec2::new(0.0, bulge * rise);
            positions.push(xy.extend(z));
        }
        last_z = z;
    }
    let apex = 4 * n;
    positions.push(Vec3::new(center.x, center.y + bulge * 0.5, last_z - config.dome_height * depth));

    let mut indices: Vec<u32> = Vec::with_capacity(3 * 7 * n);
    for level in 0..3 {
        for i in 0..n {
            let j = (i + 1) % n;
            let a = level * n + i;
            let b = level * n + j;
            let c = (level + 1) * n + i;
            let d = (level + 1) * n + j;
            let outward = side_of(positions[a], positions[b], center);
            let normal = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
            if normal.dot(outward) >= 0.0 {
                indices.extend([a, b, c, b, d, c].map(|v| v as u32));
            } else {
                indices.extend([a, c, b, b, c, d].map(|v| v as u32));
            }
        }
    }

    // Fan from the last ring to the apex; the cap faces backward (-z).
    for i in 0..n {
        let a = 3 * n + i;
        let b = 3 * n + (i + 1) % n;
        let normal = (positions[b] - positions[a]).cross(positions[apex] - positions[a]);
        if normal.z <= 0.0 {
            indices.extend([a, b, apex].map(|v| v as u32));
        } else {
            indices.extend([a, apex, b].map(|v| v as u32));
        }
    }

    let mut uvs = vec![0.0f32; 2 * 4 * n];
    uvs.extend([0.5, 0.5]);

    debug!(
        "back shell: ring {}, depth {:.4}, {} vertices, {} triangles",
        n,
        depth,
        positions.len(),
        indices.len() / 3
    );

    Ok(GeometryPatch::new()
        .with_attribute(POSITION, Attribute::f32(3, positions.iter().flat_map(|p| p.to_array()).collect()))
        .with_attribute(UV, Attribute::f32(2, uvs))
        .with_indices(indices))
}

/// Expected outward direction for a ring edge: the left/right split by the
/// averaged x of its two vertices against the box center, as a unit x.
///
/// This goes one step past a plain left/right split. An edge whose averaged
/// x lies within `SIDE_EPSILON` of the center (a symmetric ring's topmost or
/// bottom edge) has no left/right side, so it takes above/below the center
/// instead, and an edge at the center itself gets zero. The quad loop
/// compares this against the quad's geometric normal, which for any edge
/// off the center plane picks the same winding as the plain split.
///
/// Assumes the ring is roughly left/right symmetric about the box center.
fn side_of(a: Vec3, b: Vec3, center: Vec2) -> Vec3 {
    let mid = (a + b) * 0.5;
    let dx = mid.x - center.x;
    if dx.abs() > SIDE_EPSILON {
        return Vec3::X * dx.signum();
    }
    let dy = mid.y - center.y;
    if dy.abs() > SIDE_EPSILON {
        return Vec3::Y * dy.signum();
    }
    Vec3::ZERO
}
