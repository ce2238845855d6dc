//! # Telemetry Module
//!
//! Records published frames to JSONL files with rotation.
//!
//! This module handles:
//! - Sampling the latest frame at a fixed interval
//! - Formatting as JSONL (JSON Lines)
//! - Rotating files after N records
//! - Retaining only the last M files

pub mod recorder;

pub use recorder::{FrameRecord, FrameRecorder, RecorderConfig};
