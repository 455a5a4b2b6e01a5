//! Camera controller — turns the smoothed pointer and the mode into an
//! eased orbit around the origin, and exposes the matrices the pick
//! resolver unprojects through.

use glam::{vec3, Mat4, Vec3};
use std::f32::consts::PI;

use super::modes::SceneMode;
use crate::hand::pointer::Pointer;

/// Azimuth sweep per unit of pointer x, radians.
const ORBIT_AZIMUTH_GAIN: f32 = 0.15 * PI;
/// Polar sweep per unit of pointer y, radians.
const ORBIT_POLAR_GAIN: f32 = PI / 12.0;
/// Radius reduction per unit of pointer z.
const ZOOM_RANGE: f32 = 5.0;
/// Easing gain in tree and photo view.
const EASE_GAIN_SNAPPY: f32 = 2.0;
/// Easing gain while orbiting scattered (heavier, feels weighted).
const EASE_GAIN_ORBIT: f32 = 0.8;
/// Keep the polar angle off the poles.
const POLAR_MARGIN: f32 = 1e-3;

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 200.0;

/// Eased camera pose looking at the origin.
#[derive(Debug)]
pub struct CameraController {
    position: Vec3,
    camera_z: f32,
    fov_deg: f32,
    aspect: f32,
}

impl CameraController {
    pub fn new(camera_z: f32, fov_deg: f32, aspect: f32) -> Self {
        Self {
            position: vec3(0.0, 0.0, camera_z),
            camera_z,
            fov_deg,
            aspect,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// The pose this mode and pointer are steering toward.
    pub fn target_for(&self, mode: SceneMode, pointer: Pointer) -> Vec3 {
        match mode {
            SceneMode::Tree => vec3(0.0, 0.0, self.camera_z),
            SceneMode::Scattered | SceneMode::PhotoView => {
                let theta = pointer.x * ORBIT_AZIMUTH_GAIN;
                let phi = (PI / 2.0 - pointer.y * ORBIT_POLAR_GAIN)
                    .clamp(POLAR_MARGIN, PI - POLAR_MARGIN);
                let r = self.camera_z - pointer.z * ZOOM_RANGE;
                vec3(
                    r * phi.sin() * theta.sin(),
                    r * phi.cos(),
                    r * phi.sin() * theta.cos(),
                )
            }
        }
    }

    /// Ease toward the target over `dt` seconds. Negative dt is a clock
    /// regression and freezes the pose for the tick.
    pub fn advance(&mut self, dt: f32, mode: SceneMode, pointer: Pointer) {
        if dt <= 0.0 {
            return;
        }
        let gain = match mode {
            SceneMode::Scattered => EASE_GAIN_ORBIT,
            SceneMode::Tree | SceneMode::PhotoView => EASE_GAIN_SNAPPY,
        };
        let target = self.target_for(mode, pointer);
        self.position += (dt * gain).clamp(0.0, 1.0) * (target - self.position);
    }

    /// View matrix: pose looking at the origin, y up.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    /// Perspective projection with OpenGL depth range, matching the NDC
    /// convention the pick resolver unprojects from.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_deg.to_radians(),
            self.aspect,
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    /// Direction from the camera toward the origin.
    pub fn forward(&self) -> Vec3 {
        (-self.position).normalize_or_zero()
    }

    /// Snap home (tests and IPC reset).
    pub fn reset(&mut self) {
        self.position = vec3(0.0, 0.0, self.camera_z);
    }

    /// Format camera status as an s-expression for IPC.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:x {:.3} :y {:.3} :z {:.3} :fov {:.1} :aspect {:.3})",
            self.position.x, self.position.y, self.position.z, self.fov_deg, self.aspect,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
