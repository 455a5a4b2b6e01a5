//! Hand pipeline — landmark samples, gesture classification, and pointer
//! smoothing. Everything upstream of the scene.

pub mod gesture;
pub mod landmarks;
pub mod pointer;

pub use gesture::{Classification, GestureClassifier, GestureConfig, GestureSymbol};
pub use landmarks::{HandSample, Handedness, LANDMARK_COUNT};
pub use pointer::{Pointer, PointerSmoother};
