// Scene: the ECS world plus the single "current head" slot.
//
// Exactly one HeadSlot entity exists once a head (or the placeholder) is
// shown. Replacing despawns every previous HeadSlot entity first, so
// repeated builds never accumulate orphaned heads.

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};
use log::{debug, info};
use crate::head::HeadNode;
use super::components::*;
use super::mesh::{triangulate_smooth, PolyMesh, RenderMesh};
use super::systems::spin_system;

pub const PLACEHOLDER_NAME: &str = "placeholder-head";

/// What the head slot displays.
#[derive(Component)]
pub enum HeadModel {
    Placeholder(RenderMesh),
    Built(Box<HeadNode>),
}

/// Issued when a build starts; only the newest ticket may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTicket(u64);

pub struct Scene {
    pub world: World,
    idle_spin: f32,
    issued: u64,
    revision: u64,
}

impl Scene {
    pub fn new(idle_spin: f32) -> Self {
        Self { world: World::new(), idle_spin, issued: 0, revision: 0 }
    }

    /// Show the startup ellipsoid.
    pub fn show_placeholder(&mut self) -> Entity {
        let mesh = placeholder_head(Vec3::new(0.32, 0.42, 0.36), 24, 32);
        self.replace_head(PLACEHOLDER_NAME, HeadModel::Placeholder(mesh), Vec3::ZERO)
    }

    /// Despawn whatever occupies the head slot and spawn `model` in it.
    pub fn replace_head(&mut self, name: &str, model: HeadModel, translation: Vec3) -> Entity {
        let old: Vec<Entity> = self
            .world
            .query_filtered::<Entity, With<HeadSlot>>()
            .iter(&self.world)
            .collect();
        for entity in &old {
            self.world.despawn(*entity);
        }

        let entity = self
            .world
            .spawn((
                HeadSlot,
                Name(name.to_string()),
                Transform::from_position(translation),
                Spin { radians_per_sec: self.idle_spin },
                model,
            ))
            .id();
        self.revision += 1;
        debug!("head slot: replaced {} entities with {name}", old.len());
        entity
    }

    pub fn begin_build(&mut self) -> BuildTicket {
        self.issued += 1;
        BuildTicket(self.issued)
    }

    /// Install a finished head unless a newer build has started since
    /// `ticket` was issued. Returns whether the head was installed.
    pub fn commit_head(&mut self, ticket: BuildTicket, node: HeadNode) -> bool {
        if ticket.0 != self.issued {
            info!("dropping stale build {} (newest is {})", ticket.0, self.issued);
            return false;
        }
        let name = node.name.clone();
        let translation = node.translation;
        self.replace_head(&name, HeadModel::Built(Box::new(node)), translation);
        true
    }

    pub fn head_count(&mut self) -> usize {
        self.world.query_filtered::<(), With<HeadSlot>>().iter(&self.world).count()
    }

    /// Name, placement and content of the displayed head.
    pub fn current_head(&mut self) -> Option<(&Name, &Transform, &HeadModel)> {
        self.world
            .query_filtered::<(&Name, &Transform, &HeadModel), With<HeadSlot>>()
            .iter(&self.world)
            .next()
    }

    /// Bumped on every slot replacement; lets the renderer re-upload lazily.
    pub fn revision(&self) -> u64 { self.revision }

    pub fn update(&mut self, delta_time: f32) {
        spin_system(&mut self.world, delta_time);
    }
}

/// Smooth ellipsoid with the given radii, facing +z like a built head.
pub fn placeholder_head(radii: Vec3, stacks: usize, slices: usize) -> RenderMesh {
    let stacks = stacks.max(2);
    let slices = slices.max(3);
    let mut poly = PolyMesh::new();

    let top = poly.add_vertex(Vec3::new(0.0, radii.y, 0.0));
    let mut rows: Vec<Vec<usize>> = Vec::with_capacity(stacks - 1);
    for i in 1..stacks {
        let theta = i as f32 / stacks as f32 * std::f32::consts::PI;
        let row = (0..slices)
            .map(|j| {
                let phi = j as f32 / slices as f32 * std::f32::consts::TAU;
                let dir = Vec3::new(theta.sin() * phi.sin(), theta.cos(), theta.sin() * phi.cos());
                poly.add_vertex(dir * radii)
            })
            .collect();
        rows.push(row);
    }
    let bottom = poly.add_vertex(Vec3::new(0.0, -radii.y, 0.0));

    for j in 0..slices {
        let k = (j + 1) % slices;
        poly.add_face(vec![top, rows[0][j], rows[0][k]]);
        for pair in rows.windows(2) {
            let (upper, lower) = (&pair[0], &pair[1]);
            poly.add_face(vec![lower[j], lower[k], upper[k], upper[j]]);
        }
        let last = &rows[rows.len() - 1];
        poly.add_face(vec![bottom, last[k], last[j]]);
    }

    triangulate_smooth(&poly, |p| Vec2::new(0.5 - p.x, 0.5 + p.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_faces_outward() {
        let mesh = placeholder_head(Vec3::new(0.3, 0.4, 0.3), 8, 12);
        assert_eq!(mesh.vertices.len(), 2 + 7 * 12);
        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            assert!(Vec3::from(v.normal).dot(p) > 0.0);
        }
    }

    #[test]
    fn replacing_keeps_exactly_one_head() {
        let mut scene = Scene::new(0.5);
        scene.show_placeholder();
        assert_eq!(scene.head_count(), 1);
        scene.show_placeholder();
        assert_eq!(scene.head_count(), 1);
        assert_eq!(scene.revision(), 2);
        let (name, _, model) = scene.current_head().unwrap();
        assert_eq!(name.0, PLACEHOLDER_NAME);
        assert!(matches!(model, HeadModel::Placeholder(_)));
    }

    #[test]
    fn tickets_increase() {
        let mut scene = Scene::new(0.0);
        let a = scene.begin_build();
        let b = scene.begin_build();
        assert_ne!(a, b);
    }

    #[test]
    fn update_spins_the_slot() {
        let mut scene = Scene::new(1.0);
        scene.show_placeholder();
        scene.update(0.5);
        let (_, transform, _) = scene.current_head().unwrap();
        assert!(transform.rotation.angle_between(glam::Quat::IDENTITY) > 0.4);
    }
}
