//! # Auto-Clutch
//!
//! While a shift button is held the clutch slot is pinned fully in, with an
//! optional throttle blip on downshifts and throttle lift on upshifts.

use crate::config::AutoClutchConfig;
use crate::controller::sample::{LogicalButton, RawSample};
use crate::mapping::pipeline::{CycleInput, FrameInProgress, Stage};
use crate::mapping::slots::AxisValues;

/// Force clutch and throttle slots for the current shift buttons.
///
/// Evaluated from scratch each cycle; nothing is latched.
pub fn apply_auto_clutch(axes: &mut AxisValues, sample: &RawSample, config: &AutoClutchConfig) {
    if !config.enabled {
        return;
    }

    let held = |button: Option<LogicalButton>| button.is_some_and(|b| sample.is_pressed(b));
    let upshift = held(config.upshift_btn);
    let downshift = held(config.downshift_btn);
    if !upshift && !downshift {
        return;
    }

    if let Some(clutch) = config.clutch_axis {
        axes.insert(clutch, 1.0);
    }

    let Some(throttle) = config.throttle_axis else {
        return;
    };
    if downshift && config.auto_blip {
        axes.insert(throttle, 1.0);
    }
    if upshift && config.auto_lift {
        axes.insert(throttle, -1.0);
    }
}

/// Pipeline stage for [`apply_auto_clutch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoClutch;

impl Stage for AutoClutch {
    fn name(&self) -> &'static str {
        "auto_clutch"
    }

    fn apply(&mut self, input: &CycleInput<'_>, mut frame: FrameInProgress) -> FrameInProgress {
        apply_auto_clutch(&mut frame.axes, input.sample, &input.profile.scripts.auto_clutch);
        frame
    }
}
