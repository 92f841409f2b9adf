// Axis-aligned extent of a landmark set.

use glam::Vec3;

/// Box extent plus its midpoint and planar size.
///
/// The center is the midpoint of the extent, not the mean of the points, so
/// lofting and recentering anchor to the silhouette rather than point density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    pub min_z: f32,
    pub max_z: f32,
    pub cx: f32,
    pub cy: f32,
    pub cz: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Single pass over `points`. `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points.iter().fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self::from_extent(min, max))
    }

    pub fn from_extent(min: Vec3, max: Vec3) -> Self {
        Self {
            min_x: min.x,
            max_x: max.x,
            min_y: min.y,
            max_y: max.y,
            min_z: min.z,
            max_z: max.z,
            cx: (min.x + max.x) * 0.5,
            cy: (min.y + max.y) * 0.5,
            cz: (min.z + max.z) * 0.5,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    pub fn min(&self) -> Vec3 { Vec3::new(self.min_x, self.min_y, self.min_z) }

    pub fn max(&self) -> Vec3 { Vec3::new(self.max_x, self.max_y, self.max_z) }

    pub fn center(&self) -> Vec3 { Vec3::new(self.cx, self.cy, self.cz) }

    pub fn depth(&self) -> f32 { self.max_z - self.min_z }

    /// Half of the box diagonal.
    pub fn half_diagonal(&self) -> f32 {
        (self.max() - self.min()).length() * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn empty_input_has_no_box() {
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn single_point_collapses() {
        let b = BoundingBox::from_points(&[Vec3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(b.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!((b.width, b.height, b.depth()), (0.0, 0.0, 0.0));
    }

    #[test]
    fn center_is_extent_midpoint_not_mean() {
        let pts = [Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), Vec3::new(0.2, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        let b = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(b.cx, 0.5);
    }

    #[test]
    fn random_sets_satisfy_box_invariants() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let pts: Vec<Vec3> = (0..468)
                .map(|_| Vec3::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)))
                .collect();
            let b = BoundingBox::from_points(&pts).unwrap();
            assert!(b.min_x <= b.cx && b.cx <= b.max_x);
            assert!(b.min_y <= b.cy && b.cy <= b.max_y);
            assert!(b.min_z <= b.cz && b.cz <= b.max_z);
            assert_eq!(b.width, b.max_x - b.min_x);
            assert_eq!(b.height, b.max_y - b.min_y);
            for p in &pts {
                assert!(p.cmpge(b.min()).all() && p.cmple(b.max()).all());
            }
        }
    }
}
