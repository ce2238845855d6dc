//! # Range Modifier
//!
//! Scales one output slot by `press_mult` while a modifier button is held
//! and by `release_mult` otherwise. Typical use is halving steering
//! sensitivity until a button is held.

use crate::config::RangeModifierConfig;
use crate::controller::sample::{LogicalButton, RawSample};
use crate::mapping::pipeline::{CycleInput, FrameInProgress, Stage};
use crate::mapping::slots::AxisValues;

/// Scale the modified slot and return the button to mute, if any.
///
/// An unpopulated slot is left alone. Does nothing when the script is
/// disabled.
///
/// # Examples
///
/// ```
/// use pad_bridge::config::RangeModifierConfig;
/// use pad_bridge::controller::sample::{LogicalButton, RawSample};
/// use pad_bridge::mapping::scripts::range_modifier::apply_range_modifier;
/// use pad_bridge::mapping::slots::{AxisValues, OutputSlot};
///
/// let config = RangeModifierConfig { enabled: true, ..Default::default() };
/// let mut axes = AxisValues::new();
/// axes.insert(OutputSlot::X, 0.8);
///
/// // Modifier (X button) released: release_mult 0.5 applies
/// apply_range_modifier(&mut axes, &RawSample::default(), &config);
/// assert!((axes.get(OutputSlot::X).unwrap() - 0.4).abs() < 1e-6);
/// ```
pub fn apply_range_modifier(
    axes: &mut AxisValues,
    sample: &RawSample,
    config: &RangeModifierConfig,
) -> Option<LogicalButton> {
    if !config.enabled {
        return None;
    }

    let held = config
        .modifier_key
        .is_some_and(|button| sample.is_pressed(button));
    let mult = if held {
        config.press_mult
    } else {
        config.release_mult
    };

    if let Some(slot) = config.modified_axis {
        axes.update(slot, |value| (value * mult).clamp(-1.0, 1.0));
    }

    if config.mute_key {
        config.modifier_key
    } else {
        None
    }
}

/// Pipeline stage for [`apply_range_modifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeModifier;

impl Stage for RangeModifier {
    fn name(&self) -> &'static str {
        "range_modifier"
    }

    fn apply(&mut self, input: &CycleInput<'_>, mut frame: FrameInProgress) -> FrameInProgress {
        let config = &input.profile.scripts.range_modifier;
        if let Some(muted) = apply_range_modifier(&mut frame.axes, input.sample, config) {
            frame.muted = Some(muted);
        }
        frame
    }
}
