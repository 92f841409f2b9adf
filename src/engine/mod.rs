// Engine module - reusable rendering, geometry and scene components

pub mod camera;
pub mod components;
pub mod delaunay;
pub mod geometry;
pub mod hud;
pub mod input;
pub mod mesh;
pub mod render;
pub mod scene;
pub mod systems;

// Re-export commonly used items
pub use components::*;
