//! Gesture classification — one landmark sample in, one symbol out.
//!
//! Pure per sample apart from the pinch latch, which carries hysteresis
//! state across samples so a trembling thumb cannot chatter the grab
//! signal. Also derives the raw pointer, since both read the same palm
//! geometry.

use tracing::debug;

use super::landmarks::HandSample;
use super::pointer::Pointer;

/// Palm size at which the zoom factor starts rising from 0.
const ZOOM_PALM_BASE: f32 = 0.10;
/// Zoom factor gain per unit of palm size above the base.
const ZOOM_PALM_GAIN: f32 = 3.33;

// ── Symbol ─────────────────────────────────────────────────

/// The discrete hand shape for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureSymbol {
    /// All four fingers curled.
    Fist,
    /// Hand present, neither fist nor pinch.
    Open,
    /// Pinch latch engaged. Dominates Open.
    Pinch,
    /// No hand in this sample.
    NoHand,
}

impl GestureSymbol {
    /// String representation for IPC and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fist => "fist",
            Self::Open => "open",
            Self::Pinch => "pinch",
            Self::NoHand => "no-hand",
        }
    }
}

// ── Classification ─────────────────────────────────────────

/// Classifier output for one sample.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub symbol: GestureSymbol,
    /// Pinch latch level after this sample.
    pub pinch_latched: bool,
    /// Raw pointer derived from the palm; None when the sample was absent
    /// (the previous raw pointer stays in effect downstream).
    pub pointer: Option<Pointer>,
}

// ── Config ─────────────────────────────────────────────────

/// Classifier thresholds, runtime-tunable over IPC.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Thumb-index distance below which the latch engages (strict).
    pub pinch_enter: f32,
    /// Thumb-index distance above which the latch releases (strict).
    pub pinch_exit: f32,
    /// Negate pointer x for mirrored (selfie) input.
    pub mirror_input: bool,
}

// ── Classifier ─────────────────────────────────────────────

/// Stateful gesture classifier. The only state is the pinch latch.
#[derive(Debug)]
pub struct GestureClassifier {
    pub config: GestureConfig,
    latched: bool,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            latched: false,
        }
    }

    /// Classify one detector frame. `None` means no hand was detected;
    /// the latch and pointer are left untouched in that case.
    pub fn classify(&mut self, sample: Option<&HandSample>) -> Classification {
        let sample = match sample {
            Some(s) if s.is_well_formed() => s,
            Some(_) => {
                debug!("malformed sample treated as absent");
                return Classification {
                    symbol: GestureSymbol::NoHand,
                    pinch_latched: self.latched,
                    pointer: None,
                };
            }
            None => {
                return Classification {
                    symbol: GestureSymbol::NoHand,
                    pinch_latched: self.latched,
                    pointer: None,
                };
            }
        };

        let pointer = self.derive_pointer(sample);

        if sample.all_fingers_curled() {
            // A fist is never a pinch.
            if self.latched {
                debug!("fist cleared pinch latch");
            }
            self.latched = false;
            return Classification {
                symbol: GestureSymbol::Fist,
                pinch_latched: false,
                pointer: Some(pointer),
            };
        }

        let d = sample.pinch_distance();
        if !self.latched && d < self.config.pinch_enter {
            self.latched = true;
            debug!(distance = d, "pinch latch engaged");
        } else if self.latched && d > self.config.pinch_exit {
            self.latched = false;
            debug!(distance = d, "pinch latch released");
        }

        let symbol = if self.latched {
            GestureSymbol::Pinch
        } else {
            GestureSymbol::Open
        };
        Classification {
            symbol,
            pinch_latched: self.latched,
            pointer: Some(pointer),
        }
    }

    /// Map the palm into pointer space. The image-space y flip happens
    /// here and nowhere else.
    fn derive_pointer(&self, sample: &HandSample) -> Pointer {
        let c = sample.palm_center();
        let x = if self.config.mirror_input {
            (0.5 - c.x) * 2.0
        } else {
            (c.x - 0.5) * 2.0
        };
        let y = (0.5 - c.y) * 2.0;
        let z = ((sample.palm_size() - ZOOM_PALM_BASE) * ZOOM_PALM_GAIN).clamp(0.0, 1.0);
        Pointer::new(x, y, z)
    }

    /// Current latch level.
    pub fn latched(&self) -> bool {
        self.latched
    }

    /// Drop the latch (used when the pipeline resets).
    pub fn reset(&mut self) {
        self.latched = false;
    }

    /// Format classifier status as an s-expression for IPC.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:latched {} :pinch-enter {:.3} :pinch-exit {:.3} :mirror {})",
            if self.latched { "t" } else { "nil" },
            self.config.pinch_enter,
            self.config.pinch_exit,
            if self.config.mirror_input { "t" } else { "nil" },
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
