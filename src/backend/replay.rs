//! Replay source — feeds recorded landmark captures back into the
//! pipeline on their original schedule.
//!
//! Capture format: one s-expression per line, either
//! `(:t <ms> :landmarks (<63 numbers>))` or `(:t <ms> :none t)`.
//! Lines starting with `;` are comments. Frames must be in time order.

use std::fs;
use std::path::Path;

use lexpr::Value;
use tracing::{info, warn};

use super::SampleSource;
use crate::hand::landmarks::HandSample;

/// One recorded detector frame.
#[derive(Debug, Clone)]
struct Frame {
    t_ms: f64,
    /// Flat landmark buffer, or None for a no-hand frame.
    landmarks: Option<Vec<f32>>,
}

/// Plays a capture file forward against the live clock.
pub struct ReplaySource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl ReplaySource {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        let source = Self::parse(&text);
        info!(
            path = %path.display(),
            frames = source.frames.len(),
            "replay capture loaded",
        );
        Ok(source)
    }

    fn parse(text: &str) -> Self {
        let mut frames = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            match lexpr::parse::from_str_elisp(line) {
                Ok(value) => match parse_frame(&value) {
                    Some(frame) => frames.push(frame),
                    None => warn!(line = line_no + 1, "capture line missing :t, skipped"),
                },
                Err(e) => warn!(line = line_no + 1, "unparsable capture line: {e}"),
            }
        }
        frames.sort_by(|a, b| a.t_ms.total_cmp(&b.t_ms));
        Self { frames, cursor: 0 }
    }
}

impl SampleSource for ReplaySource {
    fn sample(&mut self, now_ms: f64) -> Option<HandSample> {
        // Deliver the newest frame that is due; older due frames are
        // superseded, exactly as a live detector would drop them.
        let mut due = None;
        while self.cursor < self.frames.len() && self.frames[self.cursor].t_ms <= now_ms {
            due = Some(self.cursor);
            self.cursor += 1;
        }
        let frame = &self.frames[due?];
        let flat = frame.landmarks.as_ref()?;
        HandSample::from_flat(now_ms, flat)
    }

    fn finished(&self) -> bool {
        self.cursor >= self.frames.len()
    }
}

fn parse_frame(value: &Value) -> Option<Frame> {
    let mut t_ms = None;
    let mut landmarks = None;

    let mut cursor = value;
    while let Value::Cons(pair) = cursor {
        if let Value::Keyword(key) = pair.car() {
            if let Value::Cons(rest) = pair.cdr() {
                match key.as_ref() {
                    "t" => t_ms = rest.car().as_f64(),
                    "landmarks" => {
                        let mut flat = Vec::new();
                        collect_numbers(rest.car(), &mut flat);
                        landmarks = Some(flat);
                    }
                    _ => {}
                }
            }
        }
        cursor = pair.cdr();
    }

    Some(Frame {
        t_ms: t_ms?,
        landmarks,
    })
}

fn collect_numbers(value: &Value, out: &mut Vec<f32>) {
    match value {
        Value::Cons(pair) => {
            collect_numbers(pair.car(), out);
            collect_numbers(pair.cdr(), out);
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                out.push(f as f32);
            }
        }
        _ => {}
    }
}

// ── Tests ──────────────────────────────────────────────────
