//! Hand landmark data model — the 21 canonical keypoints produced by the
//! upstream detector, in normalized image coordinates.
//!
//! Validation downgrades malformed samples (wrong count, non-finite
//! coordinates) to "absent" so the rest of the pipeline only ever sees
//! well-formed hands.

use glam::Vec3;
use tracing::debug;

// ── Landmark indices ───────────────────────────────────────

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

/// Number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

/// (tip, pip) index pairs for the curl test, thumb excluded.
pub const CURL_FINGERS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_MCP),
    (MIDDLE_TIP, MIDDLE_MCP),
    (RING_TIP, RING_MCP),
    (PINKY_TIP, PINKY_MCP),
];

// ── Handedness ─────────────────────────────────────────────

/// Reported handedness. Accepted from the detector but unused by the
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ── Sample ─────────────────────────────────────────────────

/// One detector frame containing a hand.
///
/// Points are normalized image coordinates: x,y in [0,1] with the origin
/// at the top-left, z a unitless relative depth (smaller is closer).
#[derive(Debug, Clone)]
pub struct HandSample {
    /// Capture timestamp, monotonic milliseconds.
    pub timestamp_ms: f64,
    /// The 21 landmarks, indexed per the constants above.
    pub points: [Vec3; LANDMARK_COUNT],
    /// Optional handedness hint.
    pub handedness: Option<Handedness>,
}

impl HandSample {
    /// Build a sample from a flat `[x0, y0, z0, x1, ...]` buffer.
    /// Returns None when the buffer is short or contains non-finite values.
    pub fn from_flat(timestamp_ms: f64, flat: &[f32]) -> Option<Self> {
        if flat.len() < LANDMARK_COUNT * 3 {
            debug!(
                got = flat.len(),
                want = LANDMARK_COUNT * 3,
                "landmark buffer too short",
            );
            return None;
        }
        let mut points = [Vec3::ZERO; LANDMARK_COUNT];
        for (i, point) in points.iter_mut().enumerate() {
            let base = i * 3;
            *point = Vec3::new(flat[base], flat[base + 1], flat[base + 2]);
        }
        let sample = Self {
            timestamp_ms,
            points,
            handedness: None,
        };
        if !sample.is_well_formed() {
            return None;
        }
        Some(sample)
    }

    /// All coordinates finite.
    pub fn is_well_formed(&self) -> bool {
        self.points.iter().all(|p| p.is_finite())
    }

    /// Palm center: midpoint of the wrist and the middle-finger MCP.
    pub fn palm_center(&self) -> Vec3 {
        (self.points[WRIST] + self.points[MIDDLE_MCP]) / 2.0
    }

    /// Palm size: wrist to middle-finger MCP distance. A cheap proxy for
    /// how close the hand is to the camera.
    pub fn palm_size(&self) -> f32 {
        self.points[WRIST].distance(self.points[MIDDLE_MCP])
    }

    /// Thumb-tip to index-tip distance, the pinch measure.
    pub fn pinch_distance(&self) -> f32 {
        self.points[THUMB_TIP].distance(self.points[INDEX_TIP])
    }

    /// Finger-curl test: a finger is curled when its tip sits closer to
    /// the wrist than its knuckle does (squared distances, no sqrt).
    pub fn finger_curled(&self, tip: usize, pip: usize) -> bool {
        let wrist = self.points[WRIST];
        self.points[tip].distance_squared(wrist) < self.points[pip].distance_squared(wrist)
    }

    /// True when all four non-thumb fingers are curled.
    pub fn all_fingers_curled(&self) -> bool {
        CURL_FINGERS
            .iter()
            .all(|&(tip, pip)| self.finger_curled(tip, pip))
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A flat, open hand centered at `(cx, cy)` in image coordinates.
/// Fingers point up (decreasing image y), tips well above their knuckles.
#[cfg(test)]
pub fn open_hand(timestamp_ms: f64, cx: f32, cy: f32) -> HandSample {
    let mut points = [Vec3::ZERO; LANDMARK_COUNT];
    for (i, &(tip, pip)) in CURL_FINGERS.iter().enumerate() {
        let x = cx + (i as f32 - 1.5) * 0.03;
        points[pip] = Vec3::new(x, cy - 0.07, 0.0);
        points[tip] = Vec3::new(x, cy - 0.18, 0.0);
    }
    // Wrist below center, middle MCP above, so the palm midpoint lands on
    // (cx, cy) and palm_size is a realistic 0.16. Set after the curl-finger
    // loop so it isn't clobbered by the middle finger's knuckle entry.
    points[WRIST] = Vec3::new(cx, cy + 0.08, 0.0);
    points[MIDDLE_MCP] = Vec3::new(cx, cy - 0.08, 0.0);
    // Thumb out to the side, far from the index tip.
    points[THUMB_TIP] = Vec3::new(cx - 0.12, cy, 0.0);
    HandSample {
        timestamp_ms,
        points,
        handedness: None,
    }
}

/// A fist: every fingertip pulled in next to the wrist.
#[cfg(test)]
pub fn fist_hand(timestamp_ms: f64, cx: f32, cy: f32) -> HandSample {
    let mut sample = open_hand(timestamp_ms, cx, cy);
    let wrist = sample.points[WRIST];
    for &(tip, _) in CURL_FINGERS.iter() {
        sample.points[tip] = wrist + Vec3::new(0.01, -0.02, 0.0);
    }
    sample.points[THUMB_TIP] = wrist + Vec3::new(0.03, -0.02, 0.0);
    sample
}

/// An open hand with the thumb and index tips `gap` apart.
#[cfg(test)]
pub fn pinch_hand(timestamp_ms: f64, cx: f32, cy: f32, gap: f32) -> HandSample {
    let mut sample = open_hand(timestamp_ms, cx, cy);
    let index = sample.points[INDEX_TIP];
    sample.points[THUMB_TIP] = index + Vec3::new(gap, 0.0, 0.0);
    sample
}

// ── Tests ──────────────────────────────────────────────────
