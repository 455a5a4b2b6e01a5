//! Scene side of the pipeline — modes, particle formations, morphing,
//! the orbit camera, photo slots, and picking.

pub mod camera;
pub mod formation;
pub mod modes;
pub mod morph;
pub mod photos;
pub mod pick;

pub use camera::CameraController;
pub use formation::Formation;
pub use modes::{ModeMachine, SceneMode};
pub use morph::{MorphController, ParticleTransform};
pub use photos::{PhotoArena, PhotoPose, PhotoSlot, TextureHandle};
