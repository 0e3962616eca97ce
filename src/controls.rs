//! Orbit controls: rotate, dolly and pan the camera around its target.
//!
//! Left drag orbits, the mouse wheel dollies, right drag pans in the camera
//! plane. The camera is mutated immediately when an input event arrives.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Rad, Vector3};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use crate::camera::PerspectiveCamera;

const EPS: f32 = 0.000001;
/// Pixel-precise wheels report in pixels; this many count as one wheel notch.
const PIXELS_PER_LINE: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragState {
    None,
    Rotate,
    Pan,
}

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub enabled: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    state: DragState,
    cursor: Option<PhysicalPosition<f64>>,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitControls {
    pub fn new() -> Self {
        Self {
            enabled: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            state: DragState::None,
            cursor: None,
        }
    }

    /// Feeds a window event to the controls. `element_height` is the height of
    /// the element the controls are bound to, in the same pixels as the cursor.
    ///
    /// Returns whether the camera moved.
    pub fn handle_window_event(
        &mut self,
        event: &WindowEvent,
        camera: &mut PerspectiveCamera,
        element_height: f32,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.state = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => DragState::Rotate,
                    (ElementState::Pressed, MouseButton::Right) => DragState::Pan,
                    (ElementState::Released, _) => DragState::None,
                    _ => self.state,
                };
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace(*position);
                let Some(previous) = previous else {
                    return false;
                };
                let dx = (position.x - previous.x) as f32;
                let dy = (position.y - previous.y) as f32;
                match self.state {
                    DragState::Rotate => {
                        self.rotate(camera, dx, dy, element_height);
                        true
                    }
                    DragState::Pan => {
                        self.pan(camera, dx, dy, element_height);
                        true
                    }
                    DragState::None => false,
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.state = DragState::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
                };
                if notches == 0.0 {
                    return false;
                }
                // scrolling up (positive) moves the camera closer
                self.dolly(camera, self.zoom_scale().powf(notches));
                true
            }
            _ => false,
        }
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    /// Orbits by the given pointer movement; a drag across the full element
    /// height turns the camera once around the target.
    pub fn rotate(&self, camera: &mut PerspectiveCamera, dx: f32, dy: f32, element_height: f32) {
        if element_height <= 0.0 {
            return;
        }
        let angle_left = 2.0 * PI * dx / element_height * self.rotate_speed;
        let angle_up = 2.0 * PI * dy / element_height * self.rotate_speed;
        self.apply_spherical(camera, |spherical| {
            spherical.theta -= angle_left;
            spherical.phi -= angle_up;
        });
    }

    /// Multiplies the distance to the target by `scale` (< 1 moves closer).
    pub fn dolly(&self, camera: &mut PerspectiveCamera, scale: f32) {
        self.apply_spherical(camera, |spherical| spherical.radius *= scale);
    }

    /// Moves camera and target together in the camera plane.
    pub fn pan(&self, camera: &mut PerspectiveCamera, dx: f32, dy: f32, element_height: f32) {
        if element_height <= 0.0 {
            return;
        }
        let offset = camera.position - camera.target;
        let half_fov: Rad<f32> = (camera.fov / 2.0).into();
        let target_distance = offset.magnitude() * half_fov.0.tan();
        let forward = -offset.normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);

        let pan = right * (-2.0 * dx * target_distance / element_height * self.pan_speed)
            + up * (2.0 * dy * target_distance / element_height * self.pan_speed);
        camera.position += pan;
        camera.target += pan;
    }

    fn apply_spherical(&self, camera: &mut PerspectiveCamera, change: impl FnOnce(&mut Spherical)) {
        let offset = camera.position - camera.target;
        let mut spherical = Spherical::from_offset(offset);
        change(&mut spherical);
        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius = spherical.radius.clamp(self.min_distance, self.max_distance);
        camera.position = camera.target + spherical.to_offset();
    }
}

/// Y-up spherical coordinates of the camera relative to its target.
#[derive(Clone, Copy, Debug)]
struct Spherical {
    radius: f32,
    /// Polar angle from the +y axis.
    phi: f32,
    /// Azimuth around +y, measured from +z.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}
