//! # Output Frame
//!
//! The single artifact produced per cycle: normalized axis values for the
//! populated slots and the set of pressed virtual buttons.

use std::collections::BTreeSet;

use serde::Serialize;

use super::slots::{AxisValues, OutputSlot};

/// One cycle's virtual joystick state, before encoding.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::frame::OutputFrame;
/// use pad_bridge::mapping::slots::OutputSlot;
///
/// let mut frame = OutputFrame::default();
/// frame.axes.insert(OutputSlot::X, -0.5);
/// frame.buttons.insert(3);
///
/// assert_eq!(frame.axis(OutputSlot::X), Some(-0.5));
/// assert!(frame.is_button_pressed(3));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputFrame {
    /// Values in `-1.0..=1.0` for every slot written this cycle.
    pub axes: AxisValues,
    /// Pressed virtual button indices, ascending.
    pub buttons: BTreeSet<u8>,
}

impl OutputFrame {
    /// Value of `slot`, if any channel or script wrote it.
    #[must_use]
    pub fn axis(&self, slot: OutputSlot) -> Option<f32> {
        self.axes.get(slot)
    }

    /// Returns true if virtual button `index` is pressed.
    #[must_use]
    pub fn is_button_pressed(&self, index: u8) -> bool {
        self.buttons.contains(&index)
    }
}
