//! Synthetic source — a scripted hand for demos and display-free runs.
//!
//! Loops through a fixed scene tour: open the hand to scatter, orbit,
//! pinch to grab a photo, release, fist back to the tree, then drop out
//! entirely. Deterministic in the tick timestamp, so two runs over the
//! same timeline produce identical samples.

use glam::Vec3;

use super::SampleSource;
use crate::hand::landmarks::{HandSample, CURL_FINGERS, LANDMARK_COUNT, MIDDLE_MCP, THUMB_TIP, WRIST};

/// One scripted phase: duration and hand shape.
#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Open palm drifting in a slow circle.
    Open { seconds: f64 },
    /// Pinched fingers, palm centered.
    Pinch { seconds: f64 },
    /// Clenched fist.
    Fist { seconds: f64 },
    /// No hand at all.
    Absent { seconds: f64 },
}

impl Phase {
    fn seconds(&self) -> f64 {
        match *self {
            Phase::Open { seconds }
            | Phase::Pinch { seconds }
            | Phase::Fist { seconds }
            | Phase::Absent { seconds } => seconds,
        }
    }
}

/// The scripted tour, looped forever.
const SCRIPT: [Phase; 6] = [
    Phase::Open { seconds: 3.0 },
    Phase::Pinch { seconds: 1.5 },
    Phase::Open { seconds: 1.5 },
    Phase::Fist { seconds: 2.0 },
    Phase::Open { seconds: 2.0 },
    Phase::Absent { seconds: 1.5 },
];

/// Scripted gesture generator.
#[derive(Debug, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }

    fn phase_at(seconds: f64) -> Phase {
        let total: f64 = SCRIPT.iter().map(Phase::seconds).sum();
        let mut remainder = seconds % total;
        for phase in SCRIPT {
            if remainder < phase.seconds() {
                return phase;
            }
            remainder -= phase.seconds();
        }
        SCRIPT[0]
    }
}

impl SampleSource for SyntheticSource {
    fn sample(&mut self, now_ms: f64) -> Option<HandSample> {
        let seconds = now_ms / 1000.0;
        match Self::phase_at(seconds) {
            Phase::Absent { .. } => None,
            Phase::Open { .. } => {
                // Slow circle around image center.
                let cx = 0.5 + 0.15 * (seconds * 0.6).cos() as f32;
                let cy = 0.5 + 0.10 * (seconds * 0.6).sin() as f32;
                Some(hand_sample(now_ms, cx, cy, 0.15, false))
            }
            Phase::Pinch { .. } => Some(hand_sample(now_ms, 0.5, 0.5, 0.03, false)),
            Phase::Fist { .. } => Some(hand_sample(now_ms, 0.5, 0.5, 0.03, true)),
        }
    }
}

/// Build a plausible hand at `(cx, cy)` with the requested thumb-index
/// gap; `fist` pulls every fingertip in under its knuckle.
fn hand_sample(timestamp_ms: f64, cx: f32, cy: f32, pinch_gap: f32, fist: bool) -> HandSample {
    let mut points = [Vec3::ZERO; LANDMARK_COUNT];
    points[WRIST] = Vec3::new(cx, cy + 0.08, 0.0);
    points[MIDDLE_MCP] = Vec3::new(cx, cy - 0.08, 0.0);

    for (i, &(tip, pip)) in CURL_FINGERS.iter().enumerate() {
        let x = cx + (i as f32 - 1.5) * 0.03;
        points[pip] = Vec3::new(x, cy - 0.07, 0.0);
        points[tip] = if fist {
            points[WRIST] + Vec3::new(0.01, -0.02, 0.0)
        } else {
            Vec3::new(x, cy - 0.18, 0.0)
        };
    }

    points[THUMB_TIP] = if fist {
        points[WRIST] + Vec3::new(0.03, -0.02, 0.0)
    } else {
        // Place the thumb at the pinch gap from the index tip.
        points[CURL_FINGERS[0].0] + Vec3::new(pinch_gap, 0.0, 0.0)
    };

    HandSample {
        timestamp_ms,
        points,
        handedness: None,
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let mut a = SyntheticSource::new();
        let mut b = SyntheticSource::new();
        for tick in 0..100 {
            let now = tick as f64 * 33.0;
            let sa = a.sample(now);
            let sb = b.sample(now);
            match (sa, sb) {
                (Some(sa), Some(sb)) => assert_eq!(sa.points, sb.points),
                (None, None) => {}
                other => panic!("mismatch at {now}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_script_covers_all_shapes() {
        let mut source = SyntheticSource::new();
        let mut open = false;
        let mut pinched = false;
        let mut fisted = false;
        let mut absent = false;
        // One full loop is 11.5 s.
        for tick in 0..400 {
            let now = tick as f64 * 33.0;
            match source.sample(now) {
                None => absent = true,
                Some(sample) => {
                    if sample.all_fingers_curled() {
                        fisted = true;
                    } else if sample.pinch_distance() < 0.06 {
                        pinched = true;
                    } else {
                        open = true;
                    }
                }
            }
        }
        assert!(open && pinched && fisted && absent);
    }

    #[test]
    fn test_samples_well_formed() {
        let mut source = SyntheticSource::new();
        for tick in 0..400 {
            if let Some(sample) = source.sample(tick as f64 * 33.0) {
                assert!(sample.is_well_formed());
                assert!(sample.palm_size() > 0.1);
            }
        }
    }

    #[test]
    fn test_never_finishes() {
        let source = SyntheticSource::new();
        assert!(!source.finished());
    }
}
