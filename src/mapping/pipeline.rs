//! # Transform Pipeline
//!
//! A cycle's axis values are built by an ordered list of [`Stage`]s. Each
//! stage receives the frame-in-progress and hands back the (possibly
//! modified) frame, so the override order is the list order:
//!
//! ```text
//! RawSample ──► [AxisChannels] ──► [Winding] ──► [RangeModifier] ──► [AutoClutch] ──► axes
//! ```
//!
//! [`AxisChannels`] is the first stage: it shapes the six physical axes and
//! routes them to their target slots.

use crate::config::{Profile, StickChannel};
use crate::controller::sample::{LogicalButton, RawSample};

use super::geometry::{normalize_pair, squarify};
use super::shaper::{normalize_trigger, StickShaping, TriggerShaping};
use super::slots::AxisValues;

/// Everything a stage may read during one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    pub sample: &'a RawSample,
    pub profile: &'a Profile,
    /// Seconds since the previous cycle.
    pub dt: f32,
}

/// Axis values under construction plus the button the range modifier mutes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInProgress {
    pub axes: AxisValues,
    pub muted: Option<LogicalButton>,
}

/// One step of the per-cycle transform.
pub trait Stage: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Transforms the frame for this cycle.
    fn apply(&mut self, input: &CycleInput<'_>, frame: FrameInProgress) -> FrameInProgress;
}

/// Shapes every mapped stick and trigger channel into its target slot.
///
/// Channels are written in the order LX, LY, RX, RY, LT, RT; when two
/// channels target the same slot the later one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisChannels;

impl AxisChannels {
    fn write_stick(axes: &mut AxisValues, channel: &StickChannel, value: f32) {
        if let Some(target) = channel.target {
            axes.insert(target, StickShaping::from(channel).apply(value));
        }
    }

    fn stick_pair(x_raw: i16, y_raw: i16, square: bool) -> (f32, f32) {
        if square {
            squarify(x_raw, y_raw)
        } else {
            normalize_pair(x_raw, y_raw)
        }
    }
}

impl Stage for AxisChannels {
    fn name(&self) -> &'static str {
        "axis_channels"
    }

    fn apply(&mut self, input: &CycleInput<'_>, mut frame: FrameInProgress) -> FrameInProgress {
        let sample = input.sample;
        let axes = &input.profile.axes;

        let (lx, ly) = Self::stick_pair(sample.left_x, sample.left_y, axes.lx.square);
        Self::write_stick(&mut frame.axes, &axes.lx, lx);
        Self::write_stick(&mut frame.axes, &axes.ly, ly);

        let (rx, ry) = Self::stick_pair(sample.right_x, sample.right_y, axes.rx.square);
        Self::write_stick(&mut frame.axes, &axes.rx, rx);
        Self::write_stick(&mut frame.axes, &axes.ry, ry);

        for (channel, raw) in [
            (&axes.lt, sample.left_trigger),
            (&axes.rt, sample.right_trigger),
        ] {
            if let Some(target) = channel.target {
                let value = TriggerShaping::from(channel).apply(normalize_trigger(raw));
                frame.axes.insert(target, value);
            }
        }

        frame
    }
}
