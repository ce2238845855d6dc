//! # Pad Bridge Library
//!
//! Drive a virtual joystick from a PS5 DualSense controller.
//!
//! Each cycle the mapping engine reads one controller sample, shapes the
//! sticks and triggers through the profile's per-axis settings, runs the
//! racing scripts (winding steering, range modifier, auto clutch) and writes
//! the result to a `uinput` joystick.

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod mapping;
pub mod runtime;
pub mod telemetry;
