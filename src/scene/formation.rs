//! Particle formations — the precomputed tree and scatter layouts.
//!
//! Both formations share the same particle count and index order so the
//! morph can interpolate index-parallel. Generation is seeded: the same
//! seed always yields the same layout, bit for bit.

use glam::{vec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::f32::consts::TAU;

/// Number of stratified layers in the tree cone.
const TREE_LAYERS: usize = 12;
/// Base disc radius as a fraction of the tree height.
const TREE_RADIUS_FACTOR: f32 = 0.45;
/// Exponent shaping the cone profile.
const TREE_TAPER: f32 = 0.7;
/// Positional jitter applied to every tree particle.
const TREE_JITTER: f32 = 0.1;
/// Photo-bearing particles scatter inside this fraction of the cube.
const PHOTO_CLUSTER_FACTOR: f32 = 0.6;

/// Layer palette, cycled from the bottom up.
const PALETTE: [Vec3; 3] = [
    vec3(0.16, 0.55, 0.25), // green
    vec3(0.85, 0.68, 0.20), // gold
    vec3(0.75, 0.15, 0.15), // red
];

/// An immutable particle layout. Entry `i` of every array describes the
/// same particle.
#[derive(Debug, Clone)]
pub struct Formation {
    pub positions: Vec<Vec3>,
    /// Euler angles, radians.
    pub rotations: Vec<Vec3>,
    pub scales: Vec<f32>,
    pub colors: Vec<Vec3>,
}

impl Formation {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Conical tree: `TREE_LAYERS` discs stacked from the crown down,
    /// each holding a particle count proportional to its squared radius.
    pub fn tree(count: usize, height: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let base_radius = height * TREE_RADIUS_FACTOR;

        // Layer radii and particle budgets.
        let mut radii = [0.0f32; TREE_LAYERS];
        let mut weights = [0.0f32; TREE_LAYERS];
        let mut total_weight = 0.0;
        for (j, (radius, weight)) in radii.iter_mut().zip(weights.iter_mut()).enumerate() {
            let y = height / 2.0 - j as f32 * (height / TREE_LAYERS as f32);
            *radius = base_radius * (1.0 - y / height).powf(TREE_TAPER);
            *weight = *radius * *radius;
            total_weight += *weight;
        }

        let mut formation = Formation {
            positions: Vec::with_capacity(count),
            rotations: Vec::with_capacity(count),
            scales: Vec::with_capacity(count),
            colors: Vec::with_capacity(count),
        };

        for j in 0..TREE_LAYERS {
            let y = height / 2.0 - j as f32 * (height / TREE_LAYERS as f32);
            let layer_count = if j == TREE_LAYERS - 1 {
                count - formation.len()
            } else {
                ((weights[j] / total_weight) * count as f32).round() as usize
            };
            let layer_count = layer_count.min(count - formation.len());
            let color = PALETTE[j % PALETTE.len()];

            for _ in 0..layer_count {
                // Uniform in the disc, then jitter off the plane.
                let r = radii[j] * rng.random_range(0.0f32..1.0).sqrt();
                let angle = rng.random_range(0.0..TAU);
                let jitter = vec3(
                    rng.random_range(-TREE_JITTER..TREE_JITTER),
                    rng.random_range(-TREE_JITTER..TREE_JITTER),
                    rng.random_range(-TREE_JITTER..TREE_JITTER),
                );
                formation
                    .positions
                    .push(vec3(r * angle.cos(), y, r * angle.sin()) + jitter);
                formation.rotations.push(vec3(
                    rng.random_range(-0.3..0.3),
                    rng.random_range(0.0..TAU),
                    rng.random_range(-0.3..0.3),
                ));
                formation.scales.push(rng.random_range(0.6..1.2));
                formation.colors.push(color);
            }
        }

        debug_assert_eq!(formation.len(), count);
        formation
    }

    /// Uniform cloud in a cube of half-side `bounds`. The first
    /// `photo_count` particles land in a tighter sub-cube so photo
    /// bearers cluster near the origin.
    pub fn scatter(count: usize, bounds: f32, photo_count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut formation = Formation {
            positions: Vec::with_capacity(count),
            rotations: Vec::with_capacity(count),
            scales: Vec::with_capacity(count),
            colors: Vec::with_capacity(count),
        };

        for i in 0..count {
            let extent = if i < photo_count {
                bounds * PHOTO_CLUSTER_FACTOR
            } else {
                bounds
            };
            formation.positions.push(vec3(
                rng.random_range(-extent..extent),
                rng.random_range(-extent..extent),
                rng.random_range(-extent..extent),
            ));
            formation.rotations.push(vec3(
                rng.random_range(0.0..TAU),
                rng.random_range(0.0..TAU),
                rng.random_range(0.0..TAU),
            ));
            formation.scales.push(rng.random_range(0.6..1.2));
            formation.colors.push(PALETTE[i % PALETTE.len()]);
        }

        formation
    }
}

// ── Tests ──────────────────────────────────────────────────
