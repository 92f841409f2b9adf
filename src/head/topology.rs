// Face topology: the fixed index tables that give landmark indices meaning.
//
// Loaded once from a TOML data file and validated before any build uses it,
// so a detector/topology mismatch surfaces as a descriptive error instead of
// out-of-range reads deep inside a builder. The face triangle table is part
// of that contract: every build meshes the face with the same indices.

use std::fs;
use std::path::{Path, PathBuf};
use glam::Vec2;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::engine::delaunay;
use super::landmarks::{LandmarkError, Landmarks};

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("failed to access topology file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse topology file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("failed to serialize topology: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("landmark_count must be positive")]
    NoLandmarks,
    #[error("{table}[{position}] = {index} is out of range for {count} landmarks")]
    IndexOutOfRange { table: &'static str, position: usize, index: usize, count: usize },
    #[error("{table} needs at least {min} entries, has {found}")]
    TooFew { table: &'static str, min: usize, found: usize },
    #[error("triangle {position} repeats a vertex: {tri:?}")]
    DegenerateTriangle { position: usize, tri: [u32; 3] },
    #[error("topology has no face triangle table; add `triangles` or run `head_sculpt freeze-topology <reference photo>`")]
    NoTriangles,
    #[error("reference landmarks: {0}")]
    Reference(#[from] LandmarkError),
}

/// Index tables over one detector's landmark ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceTopology {
    /// Number of landmarks the detector emits.
    pub landmark_count: usize,
    /// Landmarks averaged to find the nose center.
    pub nose_center: Vec<usize>,
    /// Landmarks pulled toward the nose center before meshing.
    #[serde(default)]
    pub nose_adjacent: Vec<usize>,
    /// Landmarks whose surrounding pixels are averaged for the skin tone.
    #[serde(default)]
    pub skin_samples: Vec<usize>,
    /// Closed jaw/forehead loop lofted into the back shell.
    pub back_ring: Vec<usize>,
    /// Closed outline of the visible face, used as the texture clip path.
    pub face_contour: Vec<usize>,
    /// Face triangles in detector winding. Required; an absent key parses
    /// as empty so validation can name the problem.
    #[serde(default)]
    pub triangles: Vec<[u32; 3]>,
}

impl FaceTopology {
    /// Read and fully validate a topology file, triangle table included.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let topology = Self::read(path)?;
        topology.validate()?;
        info!(
            "loaded face topology from {}: {} landmarks, {} triangles, ring {}, contour {}",
            path.display(),
            topology.landmark_count,
            topology.triangles.len(),
            topology.back_ring.len(),
            topology.face_contour.len(),
        );
        Ok(topology)
    }

    /// Read a topology file that may still lack its triangle table.
    pub fn load_tables(path: &Path) -> Result<Self, TopologyError> {
        let topology = Self::read(path)?;
        topology.validate_tables()?;
        Ok(topology)
    }

    fn read(path: &Path) -> Result<Self, TopologyError> {
        let text = fs::read_to_string(path)
            .map_err(|source| TopologyError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| TopologyError::Parse { path: path.to_path_buf(), source })
    }

    /// Write the topology, triangle table included, as TOML.
    pub fn save(&self, path: &Path) -> Result<(), TopologyError> {
        let text = format!("# Face topology with a frozen triangle table.\n\n{}", toml::to_string(self)?);
        fs::write(path, text).map_err(|source| TopologyError::Io { path: path.to_path_buf(), source })?;
        info!("wrote face topology with {} triangles to {}", self.triangles.len(), path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        self.validate_tables()?;
        if self.triangles.is_empty() {
            return Err(TopologyError::NoTriangles);
        }
        Ok(())
    }

    /// Everything `validate` checks except that a triangle table exists.
    pub fn validate_tables(&self) -> Result<(), TopologyError> {
        if self.landmark_count == 0 {
            return Err(TopologyError::NoLandmarks);
        }
        let count = self.landmark_count;

        let check = |table: &'static str, indices: &[usize], min: usize| -> Result<(), TopologyError> {
            if indices.len() < min {
                return Err(TopologyError::TooFew { table, min, found: indices.len() });
            }
            match indices.iter().position(|&i| i >= count) {
                Some(position) => Err(TopologyError::IndexOutOfRange { table, position, index: indices[position], count }),
                None => Ok(()),
            }
        };
        check("nose_center", &self.nose_center, 1)?;
        check("nose_adjacent", &self.nose_adjacent, 0)?;
        check("skin_samples", &self.skin_samples, 0)?;
        check("back_ring", &self.back_ring, 3)?;
        check("face_contour", &self.face_contour, 3)?;

        for (position, tri) in self.triangles.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= count) {
                return Err(TopologyError::IndexOutOfRange {
                    table: "triangles",
                    position,
                    index: index as usize,
                    count,
                });
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(TopologyError::DegenerateTriangle { position, tri: *tri });
            }
        }
        Ok(())
    }

    /// Derive the triangle table once from a frontal reference landmark set
    /// and store it, replacing any existing table. Returns the triangle count.
    ///
    /// The reference's (x, y) projection is Delaunay-triangulated. Delaunay
    /// output is counter-clockwise in the builder frame, which faces +z; it
    /// is stored reversed so the face-front flip restores it, exactly as for
    /// a detector-supplied table.
    pub fn freeze_triangles(&mut self, reference: &Landmarks) -> Result<usize, TopologyError> {
        reference.validate(self.landmark_count)?;
        let projected: Vec<Vec2> = reference.points().iter().map(|p| p.truncate()).collect();
        let triangles: Vec<[u32; 3]> = delaunay::triangulate(&projected)
            .into_iter()
            .map(|[a, b, c]| [a as u32, c as u32, b as u32])
            .collect();
        if triangles.is_empty() {
            return Err(TopologyError::NoTriangles);
        }
        self.triangles = triangles;
        self.validate()?;
        info!("froze face triangle table: {} triangles", self.triangles.len());
        Ok(self.triangles.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn small_topology() -> FaceTopology {
        FaceTopology {
            landmark_count: 5,
            nose_center: vec![4],
            nose_adjacent: vec![],
            skin_samples: vec![4],
            back_ring: vec![0, 1, 2, 3],
            face_contour: vec![0, 1, 2, 3],
            triangles: vec![],
        }
    }

    #[test]
    fn parses_and_validates_toml() {
        let text = r#"
            landmark_count = 4
            nose_center = [3]
            back_ring = [0, 1, 2]
            face_contour = [0, 1, 2]
            triangles = [[0, 1, 2], [0, 2, 3]]
        "#;
        let topology: FaceTopology = toml::from_str(text).unwrap();
        topology.validate().unwrap();
        assert!(topology.nose_adjacent.is_empty());
        assert_eq!(topology.triangles[1], [0, 2, 3]);
    }

    #[test]
    fn out_of_range_index_is_named() {
        let mut topology = small_topology();
        topology.back_ring.push(9);
        match topology.validate() {
            Err(TopologyError::IndexOutOfRange { table, position, index, count }) => {
                assert_eq!((table, position, index, count), ("back_ring", 4, 9, 5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_ring_and_degenerate_triangle_are_rejected() {
        let mut topology = small_topology();
        topology.face_contour = vec![0, 1];
        assert!(matches!(topology.validate(), Err(TopologyError::TooFew { table: "face_contour", .. })));

        let mut topology = small_topology();
        topology.triangles = vec![[0, 1, 1]];
        assert!(matches!(topology.validate(), Err(TopologyError::DegenerateTriangle { .. })));
    }

    #[test]
    fn missing_triangle_table_is_rejected() {
        let topology = small_topology();
        assert!(topology.validate_tables().is_ok());
        assert!(matches!(topology.validate(), Err(TopologyError::NoTriangles)));
    }

    fn square_with_nose() -> Landmarks {
        Landmarks::new(vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(0.1, 0.05, 0.2),
        ])
    }

    #[test]
    fn frozen_triangles_are_clockwise_in_builder_frame() {
        let mut topology = small_topology();
        let landmarks = square_with_nose();
        assert_eq!(topology.freeze_triangles(&landmarks).unwrap(), 4);
        topology.validate().unwrap();
        for &[a, b, c] in &topology.triangles {
            let (pa, pb, pc) = (landmarks.points()[a as usize], landmarks.points()[b as usize], landmarks.points()[c as usize]);
            assert!((pb - pa).truncate().perp_dot((pc - pa).truncate()) < 0.0);
        }
    }

    #[test]
    fn freezing_rejects_wrong_reference_and_collapsed_points() {
        let mut topology = small_topology();
        let short = Landmarks::new(vec![Vec3::ZERO; 3]);
        assert!(matches!(topology.freeze_triangles(&short), Err(TopologyError::Reference(_))));

        let collapsed = Landmarks::new(vec![Vec3::ZERO; 5]);
        assert!(matches!(topology.freeze_triangles(&collapsed), Err(TopologyError::NoTriangles)));
        assert!(topology.triangles.is_empty());
    }

    #[test]
    fn saved_table_loads_back() {
        let mut topology = small_topology();
        topology.freeze_triangles(&square_with_nose()).unwrap();
        let path = std::env::temp_dir().join(format!("head_sculpt_topology_{}.toml", std::process::id()));
        topology.save(&path).unwrap();
        let loaded = FaceTopology::load(&path).unwrap();
        assert_eq!(loaded.triangles, topology.triangles);
        assert_eq!(loaded.back_ring, topology.back_ring);
        let _ = fs::remove_file(&path);
    }
}
