//! Core orchestrator — wires the hand pipeline into the scene and
//! advances both clocks.
//!
//! Two ticks drive everything. The detector tick runs whenever a new
//! landmark sample arrives, rate-limited by a throttle: classify, update
//! the raw pointer, step the mode machine, maybe resolve a pick. The
//! render tick runs at display rate: smooth the pointer, advance the
//! morph and the camera, write photo poses. Both share state through
//! this single owner; no other component writes mode, morph, or pointer.

use glam::vec3;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::events::SceneEvent;
use crate::hand::gesture::{GestureClassifier, GestureConfig};
use crate::hand::landmarks::HandSample;
use crate::hand::pointer::{Pointer, PointerSmoother};
use crate::scene::camera::CameraController;
use crate::scene::formation::Formation;
use crate::scene::modes::{ModeMachine, SceneMode};
use crate::scene::morph::MorphController;
use crate::scene::photos::{PhotoArena, PhotoPose, TextureHandle};
use crate::scene::pick;

/// Aspect ratios cycled across the demo photo set.
const PHOTO_ASPECTS: [f32; 4] = [1.5, 1.0, 0.75, 4.0 / 3.0];
/// Scale of a photo held in front of the camera.
const PHOTO_HOLD_SCALE: f32 = 1.5;

/// The full gesture-to-scene pipeline behind one `&mut` handle.
pub struct Pipeline {
    config: CoreConfig,
    classifier: GestureClassifier,
    modes: ModeMachine,
    smoother: PointerSmoother,
    morph: MorphController,
    camera: CameraController,
    photos: PhotoArena,

    raw_pointer: Pointer,
    start_ms: Option<f64>,
    /// Last accepted detector tick (throttle reference).
    last_detector_ms: Option<f64>,
    /// Last sample that actually contained a hand.
    last_hand_ms: Option<f64>,
    last_render_ms: Option<f64>,

    malformed_samples: u64,
    clock_regressions: u64,
    dropped_samples: u64,

    events: Vec<SceneEvent>,
}

impl Pipeline {
    /// Build the pipeline: generate both formations from the seed and
    /// bind photo slots to the first P particles.
    pub fn new(config: CoreConfig) -> Self {
        let tree = Formation::tree(
            config.particle_count,
            config.tree_height,
            config.formation_seed,
        );
        let scatter = Formation::scatter(
            config.particle_count,
            config.scatter_bounds,
            config.photo_slots,
            config.formation_seed.wrapping_add(1),
        );

        let mut photos = PhotoArena::new();
        for slot in 0..config.photo_slots.min(config.particle_count) {
            photos.push(slot, PHOTO_ASPECTS[slot % PHOTO_ASPECTS.len()]);
        }

        info!(
            particles = config.particle_count,
            photos = photos.len(),
            seed = config.formation_seed,
            "pipeline constructed",
        );

        Self {
            classifier: GestureClassifier::new(GestureConfig {
                pinch_enter: config.pinch_enter,
                pinch_exit: config.pinch_exit,
                mirror_input: config.mirror_input,
            }),
            modes: ModeMachine::new(config.photo_view_grace_ms),
            smoother: PointerSmoother::new(config.pointer_alpha_60hz),
            morph: MorphController::new(tree, scatter),
            camera: CameraController::new(
                config.camera_z,
                config.camera_fov_deg,
                config.camera_aspect,
            ),
            photos,
            raw_pointer: Pointer::ORIGIN,
            start_ms: None,
            last_detector_ms: None,
            last_hand_ms: None,
            last_render_ms: None,
            malformed_samples: 0,
            clock_regressions: 0,
            dropped_samples: 0,
            events: Vec::new(),
            config,
        }
    }

    // ── Detector tick ──────────────────────────────────────

    /// Process one detector frame. Returns false when the throttle
    /// dropped it.
    pub fn detector_tick(&mut self, now_ms: f64, sample: Option<HandSample>) -> bool {
        self.start_ms.get_or_insert(now_ms);

        if let Some(last) = self.last_detector_ms {
            if now_ms < last {
                self.clock_regressions += 1;
            }
            if now_ms - last < self.config.detector_min_interval_ms {
                self.dropped_samples += 1;
                return false;
            }
        }
        let dt_ms = self
            .last_detector_ms
            .map(|last| (now_ms - last).max(0.0))
            .unwrap_or(0.0);
        self.last_detector_ms = Some(now_ms);

        // Malformed input downgrades to "no hand" and is counted.
        let sample = match sample {
            Some(s) if !s.is_well_formed() => {
                self.malformed_samples += 1;
                None
            }
            other => other,
        };

        let classification = self.classifier.classify(sample.as_ref());
        if let Some(pointer) = classification.pointer {
            self.raw_pointer = pointer;
            self.last_hand_ms = Some(now_ms);
        } else if self.hand_expired(now_ms) {
            self.raw_pointer = Pointer::ORIGIN;
        }

        let Self {
            modes,
            camera,
            photos,
            raw_pointer,
            events,
            ..
        } = self;
        modes.tick(
            classification.symbol,
            classification.pinch_latched,
            dt_ms,
            || pick::resolve(*raw_pointer, camera, photos),
            events,
        );
        true
    }

    /// No hand seen for longer than the decay timeout.
    fn hand_expired(&self, now_ms: f64) -> bool {
        match self.last_hand_ms {
            Some(t) => now_ms - t >= self.config.no_hand_decay_ms,
            None => true,
        }
    }

    // ── Render tick ────────────────────────────────────────

    /// Advance the render-rate side: smoother, morph, camera, photo
    /// poses. Publishes one pointer event per call.
    pub fn render_tick(&mut self, now_ms: f64) {
        let start = *self.start_ms.get_or_insert(now_ms);

        let dt = match self.last_render_ms {
            Some(last) if now_ms < last => {
                self.clock_regressions += 1;
                warn!(now_ms, last, "render clock went backward");
                0.0
            }
            Some(last) => (now_ms - last) / 1000.0,
            None => 0.0,
        };
        self.last_render_ms = Some(now_ms);

        let smoothed = if self.hand_expired(now_ms) {
            self.raw_pointer = Pointer::ORIGIN;
            self.smoother.decay(dt)
        } else {
            self.smoother.update(self.raw_pointer, dt)
        };
        self.events.push(SceneEvent::PointerUpdated {
            x: smoothed.x,
            y: smoothed.y,
            z: smoothed.z,
            visible: self.smoother.visible(),
        });

        let mode = self.modes.mode();
        let t = ((now_ms - start) / 1000.0) as f32;
        self.morph.advance(dt as f32, mode);
        self.camera.advance(dt as f32, mode, smoothed);
        self.write_photo_poses(t, mode);
    }

    /// Photos ride their particle, except the held one, which locks to
    /// the camera.
    fn write_photo_poses(&mut self, t: f32, mode: SceneMode) {
        let selection = self.modes.selection();
        let camera_pos = self.camera.position();
        let hold_pos = camera_pos + self.camera.forward() * self.config.photo_hold_distance;

        for id in 0..self.photos.len() {
            let pose = if mode == SceneMode::PhotoView && selection == Some(id) {
                let to_camera = camera_pos - hold_pos;
                PhotoPose {
                    position: hold_pos,
                    rotation: vec3(0.0, to_camera.x.atan2(to_camera.z), 0.0),
                    scale: PHOTO_HOLD_SCALE,
                }
            } else {
                let particle_index = match self.photos.get(id) {
                    Some(slot) => slot.particle_index,
                    None => continue,
                };
                let particle = self.morph.particle(particle_index, t, mode);
                let to_camera = camera_pos - particle.position;
                PhotoPose {
                    position: particle.position,
                    rotation: vec3(0.0, to_camera.x.atan2(to_camera.z), 0.0),
                    scale: particle.scale,
                }
            };
            self.photos.write_pose(id, pose);
        }
    }

    // ── Accessors ──────────────────────────────────────────

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn mode(&self) -> SceneMode {
        self.modes.mode()
    }

    pub fn selection(&self) -> Option<usize> {
        self.modes.selection()
    }

    pub fn grabbing(&self) -> bool {
        self.modes.grabbing()
    }

    pub fn morph(&self) -> &MorphController {
        &self.morph
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn photos(&self) -> &PhotoArena {
        &self.photos
    }

    pub fn smoothed_pointer(&self) -> Pointer {
        self.smoother.current()
    }

    pub fn pointer_visible(&self) -> bool {
        self.smoother.visible()
    }

    /// Drain all pending events for broadcast.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Attach a lazily loaded photo texture.
    pub fn attach_photo_texture(&mut self, id: usize, handle: TextureHandle) -> bool {
        self.photos.attach_texture(id, handle)
    }

    /// Count a malformed sample rejected before reaching the pipeline
    /// (short buffers in a source or over IPC).
    pub fn record_malformed(&mut self) {
        self.malformed_samples += 1;
    }

    // ── Runtime tuning (IPC) ───────────────────────────────

    /// Update the pinch thresholds. Rejects non-hysteretic pairs.
    pub fn set_pinch_thresholds(&mut self, enter: f32, exit: f32) -> Result<(), String> {
        if !(enter < exit) {
            return Err(format!("enter ({enter}) must be strictly below exit ({exit})"));
        }
        self.config.pinch_enter = enter;
        self.config.pinch_exit = exit;
        self.classifier.config.pinch_enter = enter;
        self.classifier.config.pinch_exit = exit;
        debug!(enter, exit, "pinch thresholds updated");
        Ok(())
    }

    pub fn set_pointer_alpha(&mut self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        self.config.pointer_alpha_60hz = alpha;
        self.smoother.set_alpha(alpha);
    }

    pub fn set_mirror_input(&mut self, mirror: bool) {
        self.config.mirror_input = mirror;
        self.classifier.config.mirror_input = mirror;
    }

    /// Back to power-on state. Formations and photo bindings survive.
    pub fn reset(&mut self) {
        self.classifier.reset();
        self.modes.reset();
        self.smoother.reset();
        self.morph.set_morph(0.0);
        self.camera.reset();
        self.raw_pointer = Pointer::ORIGIN;
        self.start_ms = None;
        self.last_detector_ms = None;
        self.last_hand_ms = None;
        self.last_render_ms = None;
        self.events.clear();
        info!("pipeline reset");
    }

    /// Format orchestrator status as an s-expression for IPC.
    pub fn status_sexp(&self) -> String {
        let pointer = self.smoother.current();
        let selection = match self.modes.selection() {
            Some(index) => index.to_string(),
            None => "nil".to_string(),
        };
        format!(
            "(:mode :{} :selection {} :grabbing {} :morph {:.4} \
             :pointer (:x {:.4} :y {:.4} :z {:.4} :visible {}) \
             :malformed-samples {} :dropped-samples {} :clock-regressions {})",
            self.modes.mode().as_str(),
            selection,
            if self.modes.grabbing() { "t" } else { "nil" },
            self.morph.morph(),
            pointer.x,
            pointer.y,
            pointer.z,
            if self.smoother.visible() { "t" } else { "nil" },
            self.malformed_samples,
            self.dropped_samples,
            self.clock_regressions,
        )
    }

    pub fn classifier_status_sexp(&self) -> String {
        self.classifier.status_sexp()
    }

    pub fn modes_status_sexp(&self) -> String {
        self.modes.status_sexp()
    }

    pub fn morph_status_sexp(&self) -> String {
        self.morph.status_sexp()
    }

    pub fn camera_status_sexp(&self) -> String {
        self.camera.status_sexp()
    }

    pub fn photos_sexp(&self) -> String {
        self.photos.list_sexp()
    }
}

// ── Tests ──────────────────────────────────────────────────
