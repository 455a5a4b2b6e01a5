//! Scene events — the output bus of the core pipeline.
//!
//! Every observable state change leaves the pipeline as exactly one of
//! these; IPC renders them as s-expressions for broadcast.

use crate::scene::modes::SceneMode;

/// An event published by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneEvent {
    /// The mode state machine transitioned.
    ModeChanged { mode: SceneMode },
    /// The grab level flipped (rising or falling edge).
    GrabEdge { grabbing: bool },
    /// The smoothed pointer advanced (render rate).
    PointerUpdated {
        x: f32,
        y: f32,
        z: f32,
        visible: bool,
    },
    /// A photo was selected or the selection cleared.
    SelectionChanged { selection: Option<usize> },
}

impl SceneEvent {
    /// Event name for IPC and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModeChanged { .. } => "mode-changed",
            Self::GrabEdge { .. } => "grab-edge",
            Self::PointerUpdated { .. } => "pointer-updated",
            Self::SelectionChanged { .. } => "selection-changed",
        }
    }

    /// Render as an s-expression for the event bus.
    pub fn to_sexp(&self) -> String {
        match self {
            Self::ModeChanged { mode } => {
                format!("(:type :event :event :mode-changed :mode :{})", mode.as_str())
            }
            Self::GrabEdge { grabbing } => format!(
                "(:type :event :event :grab-edge :grabbing {})",
                if *grabbing { "t" } else { "nil" },
            ),
            Self::PointerUpdated { x, y, z, visible } => format!(
                "(:type :event :event :pointer-updated :x {:.4} :y {:.4} :z {:.4} :visible {})",
                x,
                y,
                z,
                if *visible { "t" } else { "nil" },
            ),
            Self::SelectionChanged { selection } => match selection {
                Some(index) => format!(
                    "(:type :event :event :selection-changed :selection {index})"
                ),
                None => "(:type :event :event :selection-changed :selection nil)".to_string(),
            },
        }
    }
}
