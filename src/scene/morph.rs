//! Morph controller — a scalar parameter sliding the particle field
//! between the tree and the scatter cloud.
//!
//! The parameter chases a mode-derived target exponentially; per-particle
//! transforms are sampled on demand so nothing is stored per frame.

use glam::{vec3, Vec3};

use super::formation::Formation;
use super::modes::SceneMode;

/// Exponential gain toward the target (closes ~86% of the gap in 0.5 s).
const MORPH_GAIN: f32 = 2.0;
/// Idle float kicks in above this morph level.
const FLOAT_THRESHOLD: f32 = 0.5;
/// Idle float amplitude.
const FLOAT_AMPLITUDE: f32 = 0.02;
/// Continuous yaw spin, radians per second.
const SPIN_RATE: f32 = 0.1;
/// Scale boost applied outside the tree.
const SCATTER_SCALE_BOOST: f32 = 1.5;

/// Transform of one particle at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleTransform {
    pub position: Vec3,
    /// Euler angles, radians.
    pub rotation: Vec3,
    pub scale: f32,
    pub color: Vec3,
}

/// Owns both formations and the morph parameter.
#[derive(Debug)]
pub struct MorphController {
    tree: Formation,
    scatter: Formation,
    m: f32,
}

impl MorphController {
    /// Both formations must have the same particle count.
    pub fn new(tree: Formation, scatter: Formation) -> Self {
        assert_eq!(
            tree.len(),
            scatter.len(),
            "formations must be index-parallel",
        );
        Self {
            tree,
            scatter,
            m: 0.0,
        }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Current morph parameter in [0, 1].
    pub fn morph(&self) -> f32 {
        self.m
    }

    /// Target for a mode: pure tree at 0, pure scatter at 1.
    pub fn target_for(mode: SceneMode) -> f32 {
        match mode {
            SceneMode::Tree => 0.0,
            SceneMode::Scattered | SceneMode::PhotoView => 1.0,
        }
    }

    /// Advance the parameter by `dt` seconds toward the mode target.
    pub fn advance(&mut self, dt: f32, mode: SceneMode) {
        let target = Self::target_for(mode);
        self.m += (dt * MORPH_GAIN).clamp(0.0, 1.0) * (target - self.m);
        self.m = self.m.clamp(0.0, 1.0);
    }

    /// The blended position without time-dependent decoration.
    pub fn base_position(&self, index: usize) -> Vec3 {
        self.tree.positions[index].lerp(self.scatter.positions[index], self.m)
    }

    /// Sample particle `index` at elapsed time `t` seconds.
    pub fn particle(&self, index: usize, t: f32, mode: SceneMode) -> ParticleTransform {
        let mut position = self.base_position(index);
        if self.m > FLOAT_THRESHOLD {
            let phase = index as f32;
            position += vec3(
                (t * 0.5 + phase).cos() * FLOAT_AMPLITUDE,
                (t + phase).sin() * FLOAT_AMPLITUDE,
                0.0,
            );
        }

        let rotation = self.tree.rotations[index] * (1.0 - self.m)
            + self.scatter.rotations[index] * self.m
            + vec3(0.0, t * SPIN_RATE, 0.0);

        let scale = self.tree.scales[index]
            * if mode == SceneMode::Tree {
                1.0
            } else {
                SCATTER_SCALE_BOOST
            };

        let pulse = 1.5 + 0.5 * (2.0 * t + 13.0 * index as f32).sin();
        let color = self.tree.colors[index] * pulse;

        ParticleTransform {
            position,
            rotation,
            scale,
            color,
        }
    }

    /// Force the parameter (tests and IPC reset).
    pub fn set_morph(&mut self, m: f32) {
        self.m = m.clamp(0.0, 1.0);
    }

    /// Format morph status as an s-expression for IPC.
    pub fn status_sexp(&self) -> String {
        format!("(:morph {:.4} :particles {})", self.m, self.len())
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn controller(n: usize) -> MorphController {
        MorphController::new(
            Formation::tree(n, 8.0, 7),
            Formation::scatter(n, 10.0, 4, 7),
        )
    }

    #[test]
    fn test_starts_at_tree() {
        let c = controller(50);
        assert_eq!(c.morph(), 0.0);
    }

    #[test]
    fn test_targets() {
        assert_eq!(MorphController::target_for(SceneMode::Tree), 0.0);
        assert_eq!(MorphController::target_for(SceneMode::Scattered), 1.0);
        assert_eq!(MorphController::target_for(SceneMode::PhotoView), 1.0);
    }

    #[test]
    fn test_zero_morph_is_exact_tree() {
        let c = controller(50);
        for i in 0..c.len() {
            assert_eq!(c.base_position(i), c.tree.positions[i]);
        }
    }

    #[test]
    fn test_full_morph_is_exact_scatter() {
        let mut c = controller(50);
        c.set_morph(1.0);
        for i in 0..c.len() {
            assert_eq!(c.base_position(i), c.scatter.positions[i]);
        }
    }

    #[test]
    fn test_advance_converges_and_stays_bounded() {
        let mut c = controller(10);
        for _ in 0..180 {
            c.advance(FRAME, SceneMode::Scattered);
            assert!((0.0..=1.0).contains(&c.morph()));
        }
        assert!(c.morph() > 0.95, "m after 3 s: {}", c.morph());

        for _ in 0..180 {
            c.advance(FRAME, SceneMode::Tree);
        }
        assert!(c.morph() < 0.05, "m back toward tree: {}", c.morph());
    }

    #[test]
    fn test_round_trip_restores_tree() {
        let mut c = controller(10);
        // One second scattered, then two seconds back.
        for _ in 0..60 {
            c.advance(FRAME, SceneMode::Scattered);
        }
        for _ in 0..120 {
            c.advance(FRAME, SceneMode::Tree);
        }
        assert!(c.morph() < 0.02, "residual m {}", c.morph());
    }

    #[test]
    fn test_half_second_closes_most_of_gap() {
        let mut c = controller(10);
        for _ in 0..30 {
            c.advance(FRAME, SceneMode::Scattered);
        }
        assert!(
            (0.55..0.75).contains(&c.morph()),
            "after 0.5 s expected ~0.63, got {}",
            c.morph(),
        );
    }

    #[test]
    fn test_no_idle_float_below_threshold() {
        let c = controller(10);
        let a = c.particle(3, 0.0, SceneMode::Tree);
        let b = c.particle(3, 5.0, SceneMode::Tree);
        assert_eq!(a.position, b.position, "tree particles hold still");
    }

    #[test]
    fn test_idle_float_above_threshold() {
        let mut c = controller(10);
        c.set_morph(1.0);
        let a = c.particle(3, 0.0, SceneMode::Scattered);
        let b = c.particle(3, 1.0, SceneMode::Scattered);
        assert_ne!(a.position, b.position, "scattered particles drift");
        let drift = (a.position - b.position).length();
        assert!(drift < 0.1, "drift stays subtle: {drift}");
    }

    #[test]
    fn test_scale_boost_outside_tree() {
        let mut c = controller(10);
        c.set_morph(1.0);
        let tree = c.particle(0, 0.0, SceneMode::Tree);
        let scattered = c.particle(0, 0.0, SceneMode::Scattered);
        assert!((scattered.scale / tree.scale - SCATTER_SCALE_BOOST).abs() < 1e-6);
    }

    #[test]
    fn test_spin_accumulates_yaw() {
        let c = controller(10);
        let a = c.particle(0, 0.0, SceneMode::Tree);
        let b = c.particle(0, 10.0, SceneMode::Tree);
        assert!((b.rotation.y - a.rotation.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_color_pulse_bounded() {
        let mut c = controller(10);
        c.set_morph(1.0);
        let base = c.tree.colors[2];
        for step in 0..100 {
            let t = step as f32 * 0.1;
            let color = c.particle(2, t, SceneMode::Scattered).color;
            // Pulse factor stays within [1, 2].
            assert!(color.x >= base.x - 1e-5 && color.x <= base.x * 2.0 + 1e-5);
        }
    }

    #[test]
    #[should_panic(expected = "index-parallel")]
    fn test_mismatched_formations_rejected() {
        let _ = MorphController::new(
            Formation::tree(10, 8.0, 7),
            Formation::scatter(11, 10.0, 4, 7),
        );
    }
}
