//! Core configuration — every tunable the pipeline accepts at construction.
//!
//! A single flat table rather than per-component structs: the pipeline is
//! built exactly once and components copy the fields they need. A subset
//! (pinch thresholds, smoothing, mirroring) is also settable at runtime
//! over IPC.

/// All pipeline tunables with their calibrated defaults.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Thumb-index distance below which the pinch latch engages.
    pub pinch_enter: f32,
    /// Thumb-index distance above which the pinch latch releases.
    /// Must be strictly greater than `pinch_enter`.
    pub pinch_exit: f32,
    /// Pointer smoothing factor per frame at a 60 Hz render rate.
    /// Other rates are rescaled so the time constant stays invariant.
    pub pointer_alpha_60hz: f32,
    /// Minimum interval between detector inferences (milliseconds).
    pub detector_min_interval_ms: f64,
    /// With no hand for this long, the raw pointer collapses to origin.
    pub no_hand_decay_ms: f64,
    /// With no hand for this long in photo view, fall back to scattered.
    pub photo_view_grace_ms: f64,
    /// Number of particles N shared by both formations.
    pub particle_count: usize,
    /// Half-side of the scatter cube.
    pub scatter_bounds: f32,
    /// Vertical extent of the tree formation.
    pub tree_height: f32,
    /// Baseline camera distance on the z axis.
    pub camera_z: f32,
    /// True when the upstream image is mirrored (selfie view).
    pub mirror_input: bool,
    /// Vertical field of view for the picking projection (degrees).
    pub camera_fov_deg: f32,
    /// Aspect ratio for the picking projection.
    pub camera_aspect: f32,
    /// Number of photo slots P. Clamped to `particle_count`.
    pub photo_slots: usize,
    /// Seed for deterministic formation generation.
    pub formation_seed: u64,
    /// Distance in front of the camera at which a held photo floats.
    pub photo_hold_distance: f32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            pinch_enter: 0.06,
            pinch_exit: 0.10,
            pointer_alpha_60hz: 0.15,
            detector_min_interval_ms: 32.0,
            no_hand_decay_ms: 200.0,
            photo_view_grace_ms: 1000.0,
            particle_count: 800,
            scatter_bounds: 10.0,
            tree_height: 8.0,
            camera_z: 15.0,
            mirror_input: true,
            camera_fov_deg: 50.0,
            camera_aspect: 16.0 / 9.0,
            photo_slots: 12,
            formation_seed: 7,
            photo_hold_distance: 4.0,
        }
    }
}

impl CoreConfig {
    /// Validate threshold ordering and bounds. Returns a human-readable
    /// reason on the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.pinch_enter < self.pinch_exit) {
            return Err(format!(
                "pinch_enter ({}) must be strictly below pinch_exit ({})",
                self.pinch_enter, self.pinch_exit,
            ));
        }
        if !(0.0..=1.0).contains(&self.pointer_alpha_60hz) {
            return Err(format!(
                "pointer_alpha_60hz ({}) must be within [0, 1]",
                self.pointer_alpha_60hz,
            ));
        }
        if self.particle_count == 0 {
            return Err("particle_count must be positive".into());
        }
        if self.photo_slots > self.particle_count {
            return Err(format!(
                "photo_slots ({}) exceeds particle_count ({})",
                self.photo_slots, self.particle_count,
            ));
        }
        if self.detector_min_interval_ms < 0.0 {
            return Err("detector_min_interval_ms must be non-negative".into());
        }
        if self.camera_fov_deg <= 0.0 || self.camera_fov_deg >= 180.0 {
            return Err(format!(
                "camera_fov_deg ({}) must be within (0, 180)",
                self.camera_fov_deg,
            ));
        }
        Ok(())
    }

    /// Format the full table as an s-expression for IPC.
    pub fn sexp(&self) -> String {
        format!(
            "(:pinch-enter {:.3} :pinch-exit {:.3} :pointer-alpha-60hz {:.3} \
             :detector-min-interval-ms {:.0} :no-hand-decay-ms {:.0} \
             :photo-view-grace-ms {:.0} :particle-count {} :scatter-bounds {:.1} \
             :tree-height {:.1} :camera-z {:.1} :mirror-input {} \
             :camera-fov-deg {:.1} :camera-aspect {:.3} :photo-slots {} \
             :formation-seed {} :photo-hold-distance {:.1})",
            self.pinch_enter,
            self.pinch_exit,
            self.pointer_alpha_60hz,
            self.detector_min_interval_ms,
            self.no_hand_decay_ms,
            self.photo_view_grace_ms,
            self.particle_count,
            self.scatter_bounds,
            self.tree_height,
            self.camera_z,
            if self.mirror_input { "t" } else { "nil" },
            self.camera_fov_deg,
            self.camera_aspect,
            self.photo_slots,
            self.formation_seed,
            self.photo_hold_distance,
        )
    }
}
