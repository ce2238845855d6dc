//! # Runtime Module
//!
//! Runs the mapping engine on a dedicated task and shares its inputs and
//! outputs with the rest of the process.

pub mod shared;
pub mod worker;

pub use shared::{frame_channel, FrameObserver, FramePublisher, ProfileHandle, PublishedFrame};
pub use worker::{MappingWorker, WorkerStats, LOG_INTERVAL_CYCLES};
