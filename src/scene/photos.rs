//! Photo slots — a contiguous arena of pickable photo quads, each bound
//! to a particle index for placement.
//!
//! Write discipline: only the pipeline writes poses, via `write_pose`.
//! A slot without a texture is invisible to the pick resolver.

use glam::Vec3;

/// Opaque handle to an uploaded texture, owned by the outer shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle(pub u32);

/// Pose of a photo quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoPose {
    pub position: Vec3,
    /// Euler angles, radians.
    pub rotation: Vec3,
    pub scale: f32,
}

impl Default for PhotoPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

/// One photo: particle binding, plane aspect, optional texture, pose.
#[derive(Debug, Clone)]
pub struct PhotoSlot {
    /// Index of the particle this photo rides in tree/scattered modes.
    pub particle_index: usize,
    /// Width over height of the source image; the quad is `aspect` x 1.
    pub aspect: f32,
    texture: Option<TextureHandle>,
    pose: PhotoPose,
}

impl PhotoSlot {
    /// Bounding-sphere radius for picking: 0.7 of the larger plane extent.
    pub fn pick_radius(&self) -> f32 {
        self.aspect.max(1.0) * 0.7
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn pose(&self) -> &PhotoPose {
        &self.pose
    }
}

/// Dense arena of photo slots; the slot id is the index.
#[derive(Debug, Default)]
pub struct PhotoArena {
    slots: Vec<PhotoSlot>,
}

impl PhotoArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot bound to `particle_index`; returns its id.
    pub fn push(&mut self, particle_index: usize, aspect: f32) -> usize {
        self.slots.push(PhotoSlot {
            particle_index,
            aspect,
            texture: None,
            pose: PhotoPose::default(),
        });
        self.slots.len() - 1
    }

    /// Attach a lazily loaded texture. Until this happens the slot has
    /// no pick proxy.
    pub fn attach_texture(&mut self, id: usize, handle: TextureHandle) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) => {
                slot.texture = Some(handle);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&PhotoSlot> {
        self.slots.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PhotoSlot)> {
        self.slots.iter().enumerate()
    }

    /// Slots eligible for picking: texture ready, in id order.
    pub fn pickable(&self) -> impl Iterator<Item = (usize, &PhotoSlot)> {
        self.iter().filter(|(_, slot)| slot.texture.is_some())
    }

    /// Overwrite a slot's pose. The single mutation point for transforms.
    pub fn write_pose(&mut self, id: usize, pose: PhotoPose) {
        if let Some(slot) = self.slots.get_mut(id) {
            slot.pose = pose;
        }
    }

    /// Format the slot list as an s-expression for IPC.
    pub fn list_sexp(&self) -> String {
        if self.slots.is_empty() {
            return "nil".to_string();
        }
        let mut out = String::from("(");
        for (id, slot) in self.iter() {
            if id > 0 {
                out.push(' ');
            }
            out.push_str(&format!(
                "(:id {} :particle {} :aspect {:.3} :texture {} :x {:.3} :y {:.3} :z {:.3})",
                id,
                slot.particle_index,
                slot.aspect,
                if slot.texture.is_some() { "t" } else { "nil" },
                slot.pose.position.x,
                slot.pose.position.y,
                slot.pose.position.z,
            ));
        }
        out.push(')');
        out
    }
}

// ── Tests ──────────────────────────────────────────────────
