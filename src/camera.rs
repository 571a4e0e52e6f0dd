//! Damped orbit camera.
//!
//! Left-drag orbits around the target, the wheel zooms. Input does not move
//! the camera directly: it accumulates a pending delta that [`OrbitCamera::update`]
//! bleeds off a little each frame, which gives the soft glide after release.

use glam::{Mat4, Vec2, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Radians of orbit per pixel of drag.
const ROTATE_SPEED: f32 = 0.005;
/// Log-distance change per wheel line.
const ZOOM_SPEED: f32 = 0.1;
/// Keeps the camera off the poles so `look_at` stays well defined.
const PITCH_LIMIT: f32 = 1.5;
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 20.0;

/// Orbit camera with damped rotation and zoom.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Fraction of the pending motion applied per update. `0` disables damping.
    pub damping: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    pending_zoom: f32,
    dragging: bool,
    last_cursor: Option<Vec2>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    /// Camera 1.5 units out on +Z, looking at the origin.
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: 1.5,
            target: Vec3::ZERO,
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
            damping: 0.05,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_zoom: 0.0,
            dragging: false,
            last_cursor: None,
        }
    }

    /// Set the damping factor.
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Perspective projection for the given aspect ratio.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far)
    }

    /// Combined view-projection matrix.
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view_matrix()
    }

    /// Feed a window event. Returns true if the camera used it.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => self.begin_drag(),
                    ElementState::Released => self.end_drag(),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.drag_to(Vec2::new(position.x as f32, position.y as f32))
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                self.zoom(lines);
                true
            }
            _ => false,
        }
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
        self.last_cursor = None;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
        self.last_cursor = None;
    }

    /// Cursor moved to `cursor` (pixels). Returns true while dragging.
    pub fn drag_to(&mut self, cursor: Vec2) -> bool {
        if !self.dragging {
            return false;
        }
        if let Some(last) = self.last_cursor {
            let delta = cursor - last;
            self.pending_yaw -= delta.x * ROTATE_SPEED;
            self.pending_pitch += delta.y * ROTATE_SPEED;
        }
        self.last_cursor = Some(cursor);
        true
    }

    /// Zoom by wheel lines. Positive moves closer.
    pub fn zoom(&mut self, lines: f32) {
        self.pending_zoom -= lines * ZOOM_SPEED;
    }

    /// Whether any motion is still gliding.
    pub fn is_moving(&self) -> bool {
        self.pending_yaw.abs() > 1e-6 || self.pending_pitch.abs() > 1e-6 || self.pending_zoom.abs() > 1e-6
    }

    /// Apply pending motion. Call once per frame.
    pub fn update(&mut self) {
        let f = if self.damping > 0.0 { self.damping } else { 1.0 };

        self.yaw += self.pending_yaw * f;
        self.pitch = (self.pitch + self.pending_pitch * f).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.distance = (self.distance * (self.pending_zoom * f).exp()).clamp(MIN_DISTANCE, MAX_DISTANCE);

        let keep = 1.0 - f;
        self.pending_yaw *= keep;
        self.pending_pitch *= keep;
        self.pending_zoom *= keep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_pose() {
        let cam = OrbitCamera::new();
        assert!((cam.position() - Vec3::new(0.0, 0.0, 1.5)).length() < 1e-6);
    }

    #[test]
    fn test_projection_maps_target_to_center() {
        let cam = OrbitCamera::new();
        let clip = cam.view_proj(16.0 / 9.0) * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_drag_requires_button() {
        let mut cam = OrbitCamera::new();
        assert!(!cam.drag_to(Vec2::new(10.0, 10.0)));
        cam.update();
        assert_eq!(cam.yaw, 0.0);
    }

    #[test]
    fn test_damped_drag_converges() {
        let mut cam = OrbitCamera::new();
        cam.begin_drag();
        cam.drag_to(Vec2::new(100.0, 100.0));
        cam.drag_to(Vec2::new(200.0, 100.0));
        cam.end_drag();

        cam.update();
        let first = cam.yaw;
        assert!(first < 0.0);
        // One damped step applies only a fraction of the motion
        assert!((first - (-100.0 * ROTATE_SPEED * 0.05)).abs() < 1e-6);

        for _ in 0..500 {
            cam.update();
        }
        assert!((cam.yaw - (-100.0 * ROTATE_SPEED)).abs() < 1e-3);
        assert!(!cam.is_moving());
    }

    #[test]
    fn test_undamped_applies_immediately() {
        let mut cam = OrbitCamera::new().with_damping(0.0);
        cam.begin_drag();
        cam.drag_to(Vec2::new(0.0, 0.0));
        cam.drag_to(Vec2::new(0.0, 40.0));
        cam.update();
        assert!((cam.pitch - 40.0 * ROTATE_SPEED).abs() < 1e-6);
        assert!(!cam.is_moving());
    }

    #[test]
    fn test_pitch_clamped() {
        let mut cam = OrbitCamera::new().with_damping(0.0);
        cam.begin_drag();
        cam.drag_to(Vec2::ZERO);
        cam.drag_to(Vec2::new(0.0, 10_000.0));
        cam.update();
        assert_eq!(cam.pitch, PITCH_LIMIT);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut cam = OrbitCamera::new().with_damping(0.0);
        cam.zoom(1000.0);
        cam.update();
        assert_eq!(cam.distance, MIN_DISTANCE);
        cam.zoom(-1000.0);
        cam.update();
        assert_eq!(cam.distance, MAX_DISTANCE);
    }
}
