// Core ECS components for the scene

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// Placement of an entity: rotation is applied about the local origin,
/// after the translation has moved the content there.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }

    /// Model matrix: rotate(translate(p)).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation) * Mat4::from_translation(self.position)
    }
}

/// RGB color, each channel in [0, 1].
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Quantise to 8-bit RGBA with full alpha.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), 255]
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }
}

impl From<[f32; 3]> for Color {
    fn from(c: [f32; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Constant rotation about the Y axis (radians per second).
#[derive(Component, Debug, Clone, Copy)]
pub struct Spin {
    pub radians_per_sec: f32,
}

/// Stable lookup name for an entity.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

/// Marks the single displayed head (or the startup placeholder).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct HeadSlot;
