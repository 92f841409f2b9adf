// ECS systems run once per frame against the scene world

use bevy_ecs::prelude::*;
use glam::Quat;
use super::components::*;

/// Turn every spinning entity about its local Y axis.
pub fn spin_system(world: &mut World, delta_time: f32) {
    let mut query = world.query::<(&mut Transform, &Spin)>();
    for (mut transform, spin) in query.iter_mut(world) {
        let step = Quat::from_rotation_y(spin.radians_per_sec * delta_time);
        transform.rotation = (step * transform.rotation).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn spin_accumulates_rotation() {
        let mut world = World::new();
        let e = world.spawn((Transform::default(), Spin { radians_per_sec: std::f32::consts::PI })).id();
        for _ in 0..10 {
            spin_system(&mut world, 0.05);
        }
        let rotation = world.get::<Transform>(e).unwrap().rotation;
        // Quarter turn: +z maps to +x.
        assert!((rotation * Vec3::Z - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn entities_without_spin_stay_put() {
        let mut world = World::new();
        let e = world.spawn(Transform::default()).id();
        spin_system(&mut world, 1.0);
        assert_eq!(world.get::<Transform>(e).unwrap().rotation, Quat::IDENTITY);
    }
}
