//! Mode state machine — TREE, SCATTERED, and PHOTO_VIEW transitions
//! driven by gesture symbols and pick results.
//!
//! Transitions fire on edges, not levels: a photo is picked only on the
//! rising edge of the pinch latch, and released on its falling edge. A
//! fist resets toward TREE from anywhere. All events are emitted exactly
//! once per transition.

use tracing::{debug, warn};

use crate::events::SceneEvent;
use crate::hand::gesture::GestureSymbol;

// ── Mode ───────────────────────────────────────────────────

/// The application mode. Exactly one is in effect at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneMode {
    /// Particles form the tree. Initial mode.
    Tree,
    /// Particles scattered; orbit and pick are live.
    Scattered,
    /// One photo held in front of the camera.
    PhotoView,
}

impl SceneMode {
    /// String representation for IPC and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Scattered => "scattered",
            Self::PhotoView => "photo-view",
        }
    }
}

// ── State machine ──────────────────────────────────────────

/// Owns the mode, the selection, and the grab level.
#[derive(Debug)]
pub struct ModeMachine {
    mode: SceneMode,
    selection: Option<usize>,
    grab: bool,
    prev_latched: bool,
    /// Milliseconds of continuous NoHand while in PhotoView.
    none_elapsed_ms: f64,
    /// Grace before NoHand in PhotoView falls back to Scattered.
    grace_ms: f64,
    /// Diagnostic counter for coerced illegal combinations.
    coercions: u64,
}

impl ModeMachine {
    pub fn new(grace_ms: f64) -> Self {
        Self {
            mode: SceneMode::Tree,
            selection: None,
            grab: false,
            prev_latched: false,
            none_elapsed_ms: 0.0,
            grace_ms,
            coercions: 0,
        }
    }

    pub fn mode(&self) -> SceneMode {
        self.mode
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn grabbing(&self) -> bool {
        self.grab
    }

    pub fn coercions(&self) -> u64 {
        self.coercions
    }

    /// Advance the machine by one detector tick.
    ///
    /// `resolve` is invoked at most once, and only on the rising edge of
    /// the pinch latch while SCATTERED with nothing selected.
    pub fn tick<F>(
        &mut self,
        symbol: GestureSymbol,
        latched: bool,
        dt_ms: f64,
        resolve: F,
        events: &mut Vec<SceneEvent>,
    ) where
        F: FnOnce() -> Option<usize>,
    {
        let dt_ms = dt_ms.max(0.0);
        let rising = latched && !self.prev_latched;
        self.prev_latched = latched;

        let old_mode = self.mode;
        let old_grab = self.grab;
        let old_selection = self.selection;
        let mut new_grab = false;

        // Selection outside PhotoView cannot happen through legal
        // transitions; coerce rather than trust it.
        if self.selection.is_some() && self.mode != SceneMode::PhotoView {
            warn!(
                mode = self.mode.as_str(),
                "selection held outside photo view, clearing",
            );
            self.selection = None;
            self.coercions += 1;
        }

        match (self.mode, symbol) {
            // TREE
            (SceneMode::Tree, GestureSymbol::Fist) | (SceneMode::Tree, GestureSymbol::NoHand) => {}
            (SceneMode::Tree, GestureSymbol::Open) | (SceneMode::Tree, GestureSymbol::Pinch) => {
                self.mode = SceneMode::Scattered;
                new_grab = symbol == GestureSymbol::Pinch;
            }

            // SCATTERED
            (SceneMode::Scattered, GestureSymbol::Fist) => {
                self.mode = SceneMode::Tree;
            }
            (SceneMode::Scattered, GestureSymbol::Pinch) => {
                new_grab = true;
                if rising {
                    if let Some(index) = resolve() {
                        self.selection = Some(index);
                        self.mode = SceneMode::PhotoView;
                    } else {
                        debug!("grab resolved no photo");
                    }
                }
            }
            (SceneMode::Scattered, GestureSymbol::Open)
            | (SceneMode::Scattered, GestureSymbol::NoHand) => {}

            // PHOTO_VIEW
            (SceneMode::PhotoView, GestureSymbol::Pinch) => {
                new_grab = true;
            }
            (SceneMode::PhotoView, GestureSymbol::Open)
            | (SceneMode::PhotoView, GestureSymbol::Fist) => {
                // Falling edge or fist: back to scattered. A standing
                // fist then takes scattered to tree on the next tick.
                self.mode = SceneMode::Scattered;
                self.selection = None;
            }
            (SceneMode::PhotoView, GestureSymbol::NoHand) => {
                // Selection survives brief tracking loss.
                self.none_elapsed_ms += dt_ms;
                if self.none_elapsed_ms > self.grace_ms {
                    debug!(
                        elapsed_ms = self.none_elapsed_ms,
                        "hand lost past grace, leaving photo view",
                    );
                    self.mode = SceneMode::Scattered;
                    self.selection = None;
                }
            }
        }

        if !(self.mode == SceneMode::PhotoView && symbol == GestureSymbol::NoHand) {
            self.none_elapsed_ms = 0.0;
        }

        self.grab = new_grab;

        if self.grab != old_grab {
            events.push(SceneEvent::GrabEdge {
                grabbing: self.grab,
            });
        }
        if self.mode != old_mode {
            debug!(from = old_mode.as_str(), to = self.mode.as_str(), "mode changed");
            events.push(SceneEvent::ModeChanged { mode: self.mode });
        }
        if self.selection != old_selection {
            events.push(SceneEvent::SelectionChanged {
                selection: self.selection,
            });
        }
    }

    /// Back to the initial state without emitting events.
    pub fn reset(&mut self) {
        self.mode = SceneMode::Tree;
        self.selection = None;
        self.grab = false;
        self.prev_latched = false;
        self.none_elapsed_ms = 0.0;
    }

    /// Format machine status as an s-expression for IPC.
    pub fn status_sexp(&self) -> String {
        let selection = match self.selection {
            Some(index) => index.to_string(),
            None => "nil".to_string(),
        };
        format!(
            "(:mode :{} :selection {} :grabbing {} :coercions {})",
            self.mode.as_str(),
            selection,
            if self.grab { "t" } else { "nil" },
            self.coercions,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TICK_MS: f64 = 33.0;

    fn machine() -> ModeMachine {
        ModeMachine::new(1000.0)
    }

    fn no_pick() -> Option<usize> {
        None
    }

    fn tick_simple(
        m: &mut ModeMachine,
        symbol: GestureSymbol,
        latched: bool,
    ) -> Vec<SceneEvent> {
        let mut events = Vec::new();
        m.tick(symbol, latched, TICK_MS, no_pick, &mut events);
        events
    }

    #[test]
    fn test_initial_mode_is_tree() {
        let m = machine();
        assert_eq!(m.mode(), SceneMode::Tree);
        assert!(m.selection().is_none());
        assert!(!m.grabbing());
    }

    #[test]
    fn test_fist_then_open_scatters_once() {
        let mut m = machine();
        let mut transitions = 0;
        for _ in 0..30 {
            let events = tick_simple(&mut m, GestureSymbol::Fist, false);
            assert!(events.is_empty());
            assert_eq!(m.mode(), SceneMode::Tree);
        }
        for _ in 0..30 {
            let events = tick_simple(&mut m, GestureSymbol::Open, false);
            transitions += events
                .iter()
                .filter(|e| matches!(e, SceneEvent::ModeChanged { .. }))
                .count();
            assert!(!m.grabbing());
        }
        assert_eq!(m.mode(), SceneMode::Scattered);
        assert_eq!(transitions, 1, "mode change fires exactly once");
    }

    #[test]
    fn test_pinch_in_tree_scatters_with_grab() {
        let mut m = machine();
        let events = tick_simple(&mut m, GestureSymbol::Pinch, true);
        assert_eq!(m.mode(), SceneMode::Scattered);
        assert!(m.grabbing());
        assert!(events.contains(&SceneEvent::GrabEdge { grabbing: true }));
        assert!(events.contains(&SceneEvent::ModeChanged {
            mode: SceneMode::Scattered,
        }));
        // The edge was consumed by the tree transition: no pick happened
        // and none may happen until the latch cycles.
        assert!(m.selection().is_none());
    }

    #[test]
    fn test_pick_on_rising_edge_only() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        assert_eq!(m.mode(), SceneMode::Scattered);

        let mut calls = 0;
        // Sustained pinch after the first tick: resolver runs once.
        for i in 0..5 {
            let mut events = Vec::new();
            m.tick(
                GestureSymbol::Pinch,
                true,
                TICK_MS,
                || {
                    calls += 1;
                    None
                },
                &mut events,
            );
            if i == 0 {
                assert!(events.contains(&SceneEvent::GrabEdge { grabbing: true }));
            } else {
                assert!(events.is_empty());
            }
        }
        assert_eq!(calls, 1, "resolver invoked once per rising edge");
        assert_eq!(m.mode(), SceneMode::Scattered, "no photo, no photo view");
        assert!(m.grabbing());
    }

    #[test]
    fn test_successful_pick_enters_photo_view() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);

        let mut events = Vec::new();
        m.tick(GestureSymbol::Pinch, true, TICK_MS, || Some(0), &mut events);
        assert_eq!(m.mode(), SceneMode::PhotoView);
        assert_eq!(m.selection(), Some(0));
        assert_eq!(
            events,
            vec![
                SceneEvent::GrabEdge { grabbing: true },
                SceneEvent::ModeChanged {
                    mode: SceneMode::PhotoView,
                },
                SceneEvent::SelectionChanged { selection: Some(0) },
            ],
        );
    }

    #[test]
    fn test_release_returns_to_scattered() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        let mut events = Vec::new();
        m.tick(GestureSymbol::Pinch, true, TICK_MS, || Some(2), &mut events);
        assert_eq!(m.mode(), SceneMode::PhotoView);

        let events = tick_simple(&mut m, GestureSymbol::Open, false);
        assert_eq!(m.mode(), SceneMode::Scattered);
        assert!(m.selection().is_none());
        assert_eq!(
            events,
            vec![
                SceneEvent::GrabEdge { grabbing: false },
                SceneEvent::ModeChanged {
                    mode: SceneMode::Scattered,
                },
                SceneEvent::SelectionChanged { selection: None },
            ],
        );

        // Nothing further without new input edges.
        let events = tick_simple(&mut m, GestureSymbol::Open, false);
        assert!(events.is_empty());
    }

    #[test]
    fn test_fist_from_photo_view_reaches_tree_in_two_ticks() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        let mut events = Vec::new();
        m.tick(GestureSymbol::Pinch, true, TICK_MS, || Some(1), &mut events);

        let events = tick_simple(&mut m, GestureSymbol::Fist, false);
        assert_eq!(m.mode(), SceneMode::Scattered);
        assert!(events.contains(&SceneEvent::ModeChanged {
            mode: SceneMode::Scattered,
        }));

        let events = tick_simple(&mut m, GestureSymbol::Fist, false);
        assert_eq!(m.mode(), SceneMode::Tree);
        assert!(events.contains(&SceneEvent::ModeChanged {
            mode: SceneMode::Tree,
        }));
    }

    #[test]
    fn test_fist_in_scattered_clears_to_tree() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        let events = tick_simple(&mut m, GestureSymbol::Fist, false);
        assert_eq!(m.mode(), SceneMode::Tree);
        assert!(events.contains(&SceneEvent::ModeChanged {
            mode: SceneMode::Tree,
        }));
    }

    #[test]
    fn test_no_hand_grace_in_photo_view() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        let mut events = Vec::new();
        m.tick(GestureSymbol::Pinch, true, TICK_MS, || Some(0), &mut events);
        assert_eq!(m.mode(), SceneMode::PhotoView);

        // 40 NoHand ticks at 25 Hz = 1.6 s; the grace expires after 1 s.
        let mut falling_edges = 0;
        let mut mode_changes = Vec::new();
        for _ in 0..40 {
            let mut events = Vec::new();
            m.tick(GestureSymbol::NoHand, true, 40.0, no_pick, &mut events);
            for event in events {
                match event {
                    SceneEvent::GrabEdge { grabbing: false } => falling_edges += 1,
                    SceneEvent::ModeChanged { mode } => mode_changes.push(mode),
                    _ => {}
                }
            }
        }
        assert_eq!(falling_edges, 1, "grab drops once when the hand vanishes");
        assert_eq!(mode_changes, vec![SceneMode::Scattered]);
        assert!(m.selection().is_none());
    }

    #[test]
    fn test_selection_survives_short_dropout() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        let mut events = Vec::new();
        m.tick(GestureSymbol::Pinch, true, TICK_MS, || Some(4), &mut events);

        // 600 ms of NoHand: under the grace, selection retained.
        for _ in 0..15 {
            m.tick(GestureSymbol::NoHand, true, 40.0, no_pick, &mut Vec::new());
        }
        assert_eq!(m.mode(), SceneMode::PhotoView);
        assert_eq!(m.selection(), Some(4));

        // Hand returns pinching: grace resets, grab resumes, no pick.
        let mut calls = 0;
        let mut events = Vec::new();
        m.tick(
            GestureSymbol::Pinch,
            true,
            TICK_MS,
            || {
                calls += 1;
                None
            },
            &mut events,
        );
        assert_eq!(calls, 0);
        assert_eq!(m.mode(), SceneMode::PhotoView);
    }

    #[test]
    fn test_no_hand_outside_photo_view_keeps_mode() {
        let mut m = machine();
        for _ in 0..100 {
            tick_simple(&mut m, GestureSymbol::NoHand, false);
        }
        assert_eq!(m.mode(), SceneMode::Tree);

        tick_simple(&mut m, GestureSymbol::Open, false);
        for _ in 0..100 {
            tick_simple(&mut m, GestureSymbol::NoHand, false);
        }
        assert_eq!(m.mode(), SceneMode::Scattered);
    }

    #[test]
    fn test_grab_edges_match_latch_edges_in_scattered() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);

        let mut edges = 0;
        for cycle in 0..3 {
            let _ = cycle;
            for _ in 0..4 {
                let events = tick_simple(&mut m, GestureSymbol::Pinch, true);
                edges += events
                    .iter()
                    .filter(|e| matches!(e, SceneEvent::GrabEdge { .. }))
                    .count();
            }
            for _ in 0..4 {
                let events = tick_simple(&mut m, GestureSymbol::Open, false);
                edges += events
                    .iter()
                    .filter(|e| matches!(e, SceneEvent::GrabEdge { .. }))
                    .count();
            }
        }
        // Three pinch cycles, two edges each.
        assert_eq!(edges, 6);
    }

    #[test]
    fn test_illegal_selection_coerced() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        m.selection = Some(9);
        tick_simple(&mut m, GestureSymbol::Open, false);
        assert!(m.selection().is_none());
        assert_eq!(m.coercions(), 1);
    }

    #[test]
    fn test_reset() {
        let mut m = machine();
        tick_simple(&mut m, GestureSymbol::Open, false);
        let mut events = Vec::new();
        m.tick(GestureSymbol::Pinch, true, TICK_MS, || Some(0), &mut events);
        m.reset();
        assert_eq!(m.mode(), SceneMode::Tree);
        assert!(m.selection().is_none());
        assert!(!m.grabbing());
    }

    #[test]
    fn test_status_sexp() {
        let m = machine();
        let sexp = m.status_sexp();
        assert!(sexp.contains(":mode :tree"));
        assert!(sexp.contains(":selection nil"));
        assert!(sexp.contains(":grabbing nil"));
    }
}
