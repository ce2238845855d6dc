//! # Mapping Module
//!
//! Pure per-cycle transform from a controller sample to virtual joystick
//! values: signal shaping, stick geometry, behavioral scripts and frame
//! assembly.

pub mod engine;
pub mod frame;
pub mod geometry;
pub mod pipeline;
pub mod scripts;
pub mod shaper;
pub mod slots;

pub use engine::MappingEngine;
pub use frame::OutputFrame;
pub use slots::{AxisValues, OutputSlot};
