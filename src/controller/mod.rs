//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - The XInput-style [`RawSample`] the mapping engine consumes
//! - PS5 controller detection and reading via evdev
//! - Picking a controller port by button press

pub mod mapper;
pub mod ps5;
pub mod sample;
pub mod source;

pub use sample::{LogicalButton, RawSample};
pub use source::{detect_active_port, SampleSource};
