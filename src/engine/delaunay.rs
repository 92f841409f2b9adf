// Bowyer–Watson Delaunay triangulation of a 2D point set.
//
// Used when no fixed triangle table is available for a point cloud. Points
// that coincide with an already inserted point are skipped (they stay
// unreferenced). Output triangles index into the input slice and are
// counter-clockwise in the input's (x, y) frame.

use glam::Vec2;

const EPSILON: f32 = 1e-9;

#[derive(Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    center: Vec2,
    radius_sq: f32,
}

impl Triangle {
    fn new(points: &[Vec2], a: usize, b: usize, c: usize) -> Self {
        // Orient CCW so every emitted triangle agrees.
        let (a, b, c) = if signed_area(points[a], points[b], points[c]) < 0.0 { (a, c, b) } else { (a, b, c) };
        let (center, radius_sq) = circumcircle(points[a], points[b], points[c]);
        Self { v: [a, b, c], center, radius_sq }
    }

    fn contains_in_circumcircle(&self, p: Vec2) -> bool {
        p.distance_squared(self.center) < self.radius_sq * (1.0 - 1e-6)
    }
}

fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

fn circumcircle(a: Vec2, b: Vec2, c: Vec2) -> (Vec2, f32) {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < EPSILON {
        // Collinear: an infinite circle keeps the triangle "bad" for any insert.
        return ((a + b + c) / 3.0, f32::INFINITY);
    }
    let (a2, b2, c2) = (a.length_squared(), b.length_squared(), c.length_squared());
    let center = Vec2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    );
    (center, center.distance_squared(a))
}

/// Triangulate `input`, returning CCW index triples.
pub fn triangulate(input: &[Vec2]) -> Vec<[usize; 3]> {
    let n = input.len();
    if n < 3 {
        return Vec::new();
    }

    let (mut min, mut max) = (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY));
    for p in input {
        min = min.min(*p);
        max = max.max(*p);
    }
    let span = (max - min).max_element().max(1e-3);
    let mid = (min + max) * 0.5;

    // Super-triangle vertices live at indices n, n+1, n+2.
    let mut points = input.to_vec();
    points.push(mid + Vec2::new(-20.0 * span, -span));
    points.push(mid + Vec2::new(0.0, 20.0 * span));
    points.push(mid + Vec2::new(20.0 * span, -span));

    let mut triangles = vec![Triangle::new(&points, n, n + 1, n + 2)];
    let mut inserted: Vec<usize> = Vec::with_capacity(n);

    for i in 0..n {
        let p = points[i];
        if inserted.iter().any(|&j| points[j].distance_squared(p) < EPSILON) {
            continue;
        }

        let (bad, good): (Vec<Triangle>, Vec<Triangle>) =
            triangles.into_iter().partition(|t| t.contains_in_circumcircle(p));
        triangles = good;
        if bad.is_empty() {
            continue;
        }

        // Boundary of the cavity: edges belonging to exactly one bad triangle.
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for t in &bad {
            for k in 0..3 {
                let e = (t.v[k], t.v[(k + 1) % 3]);
                if let Some(pos) = edges.iter().position(|&(a, b)| a == e.1 && b == e.0) {
                    edges.swap_remove(pos);
                } else {
                    edges.push(e);
                }
            }
        }

        for (a, b) in edges {
            triangles.push(Triangle::new(&points, a, b, i));
        }
        inserted.push(i);
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .filter(|t| signed_area(points[t.v[0]], points[t.v[1]], points[t.v[2]]).abs() > EPSILON)
        .map(|t| t.v)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_gives_two_ccw_triangles() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), 2);
        for t in tris {
            assert!(signed_area(pts[t[0]], pts[t[1]], pts[t[2]]) > 0.0);
        }
    }

    #[test]
    fn pentagon_with_center_is_fully_covered() {
        let mut pts = vec![Vec2::ZERO];
        for k in 0..5 {
            let a = k as f32 * std::f32::consts::TAU / 5.0;
            pts.push(Vec2::new(a.cos(), a.sin()));
        }
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), 5);

        let area: f32 = tris.iter().map(|t| signed_area(pts[t[0]], pts[t[1]], pts[t[2]]) * 0.5).sum();
        let pentagon = 2.5 * (std::f32::consts::TAU / 5.0).sin();
        assert!((area - pentagon).abs() < 1e-4);
    }

    #[test]
    fn duplicates_and_degenerate_input_do_not_panic() {
        assert!(triangulate(&[Vec2::ZERO; 10]).is_empty());
        let tris = triangulate(&[Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::Y]);
        assert_eq!(tris.len(), 1);
    }
}
