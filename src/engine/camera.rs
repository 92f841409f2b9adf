// Orbit camera for inspecting a single object at the origin.
//
// Camera model:
//   - A fixed target point the camera looks at (the recentered head sits at the origin)
//   - Yaw/pitch around the target, changed by dragging with the left mouse button
//   - Zoom by adjusting distance along the look vector (mouse wheel)

use glam::{Mat4, Vec3};
use winit::event::MouseButton;
use super::input::InputState;

pub struct OrbitCamera {
    pub target: Vec3,

    /// Distance from target along the look direction.
    /// Private: always clamped to [min_distance, max_distance] in update(). Use distance() to read.
    distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    /// Elevation angle in radians (0 = level with the target).
    pub pitch: f32,
    /// Horizontal rotation in radians (0 = looking along -Z from +Z).
    pub yaw: f32,

    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// Radians of rotation per pixel dragged.
    pub drag_speed: f32,
    /// Distance change per scroll line, as a fraction of the current distance.
    pub zoom_speed: f32,
}

impl OrbitCamera {
    pub fn new(distance: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            distance,
            min_distance: distance * 0.25,
            max_distance: distance * 4.0,
            pitch: 0.1,
            yaw: 0.0,
            fov: 35.0_f32.to_radians(),
            near: 0.01,
            far: 100.0,
            drag_speed: 0.008,
            zoom_speed: 0.1,
        }
    }

    /// Update orientation and zoom from input. Call once per frame before rendering.
    pub fn update(&mut self, input: &InputState) {
        if input.is_button_held(MouseButton::Left) {
            let (dx, dy) = input.mouse_delta;
            self.yaw -= dx * self.drag_speed;
            self.pitch += dy * self.drag_speed;
        }
        let limit = 85.0_f32.to_radians();
        self.pitch = self.pitch.clamp(-limit, limit);

        // Scroll up (positive delta) zooms in.
        self.distance *= 1.0 - input.scroll_delta * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }

    /// World-space position of the camera eye.
    pub fn camera_position(&self) -> Vec3 {
        self.target + self.eye_offset()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.camera_position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn distance(&self) -> f32 { self.distance }

    fn eye_offset(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos() * self.distance,
            self.pitch.sin() * self.distance,
            self.yaw.cos() * self.pitch.cos() * self.distance,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_eye_sits_in_front_of_target() {
        let mut cam = OrbitCamera::new(2.0);
        cam.pitch = 0.0;
        let eye = cam.camera_position();
        assert!((eye - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = OrbitCamera::new(2.0);
        let mut input = InputState::new();
        input.scroll_delta = 1000.0;
        cam.update(&input);
        assert!((cam.distance() - cam.min_distance).abs() < 1e-6);
    }
}
