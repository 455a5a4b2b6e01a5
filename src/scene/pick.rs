//! Pick resolver — casts a ray from the pointer through the camera and
//! returns the nearest photo whose bounding sphere it crosses.
//!
//! The pointer's y is already up-positive; no second flip happens here.

use glam::{vec3, Vec3};
use tracing::debug;

use super::camera::CameraController;
use super::photos::PhotoArena;
use crate::hand::pointer::Pointer;

/// Resolve the pointer to a photo slot id, or None when the ray misses
/// every pickable slot. Ties on the ray parameter go to the lower id.
pub fn resolve(
    pointer: Pointer,
    camera: &CameraController,
    photos: &PhotoArena,
) -> Option<usize> {
    let ndc = vec3(pointer.x, pointer.y, -1.0);
    let inverse_view_proj = (camera.projection() * camera.view()).inverse();
    let near_point = inverse_view_proj.project_point3(ndc);

    let origin = camera.position();
    let direction = (near_point - origin).normalize_or_zero();
    if direction == Vec3::ZERO {
        return None;
    }

    let mut best: Option<(f32, usize)> = None;
    for (id, slot) in photos.pickable() {
        if let Some(t) = ray_sphere(origin, direction, slot.pose().position, slot.pick_radius()) {
            let closer = match best {
                None => true,
                Some((best_t, _)) => t < best_t,
            };
            if closer {
                best = Some((t, id));
            }
        }
    }

    if let Some((t, id)) = best {
        debug!(slot = id, t, "pick resolved");
    }
    best.map(|(_, id)| id)
}

/// Smallest positive ray parameter where the ray enters the sphere.
fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let t = -b - sqrt_d;
    if t > 0.0 {
        return Some(t);
    }
    let t = -b + sqrt_d;
    (t > 0.0).then_some(t)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::photos::{PhotoPose, TextureHandle};
    use glam::Vec3;

    fn camera() -> CameraController {
        CameraController::new(15.0, 50.0, 16.0 / 9.0)
    }

    fn arena_with_photo_at(position: Vec3, aspect: f32) -> PhotoArena {
        let mut arena = PhotoArena::new();
        let id = arena.push(0, aspect);
        arena.attach_texture(id, TextureHandle(1));
        arena.write_pose(
            id,
            PhotoPose {
                position,
                ..PhotoPose::default()
            },
        );
        arena
    }

    #[test]
    fn test_center_pointer_hits_origin_photo() {
        let arena = arena_with_photo_at(Vec3::ZERO, 1.0);
        assert_eq!(resolve(Pointer::ORIGIN, &camera(), &arena), Some(0));
    }

    #[test]
    fn test_far_pointer_misses() {
        let arena = arena_with_photo_at(Vec3::ZERO, 1.0);
        let result = resolve(Pointer::new(0.9, 0.9, 0.0), &camera(), &arena);
        assert_eq!(result, None);
    }

    #[test]
    fn test_pointer_y_is_not_reflipped() {
        // A photo above the origin: in view from (0,0,15) with a 50 deg
        // fov it projects to ndc y = 2 / (tan(25 deg) * 15) = +0.286.
        let arena = arena_with_photo_at(vec3(0.0, 2.0, 0.0), 1.0);
        let cam = camera();
        assert_eq!(
            resolve(Pointer::new(0.0, 0.286, 0.0), &cam, &arena),
            Some(0),
            "up-positive pointer y reaches the upper photo",
        );
        assert_eq!(
            resolve(Pointer::new(0.0, -0.286, 0.0), &cam, &arena),
            None,
            "a flipped y would have hit",
        );
    }

    #[test]
    fn test_nearest_hit_wins() {
        let mut arena = PhotoArena::new();
        for z in [-5.0f32, 5.0, 0.0] {
            let id = arena.push(0, 1.0);
            arena.attach_texture(id, TextureHandle(id as u32));
            arena.write_pose(
                id,
                PhotoPose {
                    position: vec3(0.0, 0.0, z),
                    ..PhotoPose::default()
                },
            );
        }
        // Camera sits at +z; the slot at z = +5 is closest along the ray.
        assert_eq!(resolve(Pointer::ORIGIN, &camera(), &arena), Some(1));
    }

    #[test]
    fn test_tie_broken_by_lower_id() {
        let mut arena = PhotoArena::new();
        for _ in 0..2 {
            let id = arena.push(0, 1.0);
            arena.attach_texture(id, TextureHandle(0));
            arena.write_pose(id, PhotoPose::default());
        }
        assert_eq!(resolve(Pointer::ORIGIN, &camera(), &arena), Some(0));
    }

    #[test]
    fn test_untextured_slot_invisible_to_ray() {
        let mut arena = PhotoArena::new();
        let bare = arena.push(0, 1.0);
        arena.write_pose(bare, PhotoPose::default());
        assert_eq!(resolve(Pointer::ORIGIN, &camera(), &arena), None);

        let behind = arena.push(1, 1.0);
        arena.attach_texture(behind, TextureHandle(2));
        arena.write_pose(
            behind,
            PhotoPose {
                position: vec3(0.0, 0.0, -3.0),
                ..PhotoPose::default()
            },
        );
        // The textured photo wins even though the bare one is nearer.
        assert_eq!(resolve(Pointer::ORIGIN, &camera(), &arena), Some(behind));
    }

    #[test]
    fn test_photo_behind_camera_ignored() {
        let arena = arena_with_photo_at(vec3(0.0, 0.0, 30.0), 1.0);
        assert_eq!(resolve(Pointer::ORIGIN, &camera(), &arena), None);
    }

    #[test]
    fn test_ray_sphere_direct_hit() {
        let t = ray_sphere(vec3(0.0, 0.0, 10.0), vec3(0.0, 0.0, -1.0), Vec3::ZERO, 1.0);
        assert!((t.unwrap() - 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_sphere_miss() {
        let t = ray_sphere(
            vec3(0.0, 5.0, 10.0),
            vec3(0.0, 0.0, -1.0),
            Vec3::ZERO,
            1.0,
        );
        assert!(t.is_none());
    }

    #[test]
    fn test_ray_sphere_from_inside() {
        let t = ray_sphere(Vec3::ZERO, vec3(0.0, 0.0, -1.0), Vec3::ZERO, 2.0);
        assert!((t.unwrap() - 2.0).abs() < 1e-5, "exit point counts");
    }
}
