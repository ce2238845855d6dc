//! # Mapping Engine
//!
//! Assembles one [`OutputFrame`] per controller sample and writes it to a
//! [`VirtualDevice`].
//!
//! ## Cycle
//!
//! 1. Run the stage pipeline: axis channels, winding, range modifier,
//!    auto-clutch. Later stages override earlier ones.
//! 2. Resolve buttons: every mapped logical button whose bit is set presses
//!    its virtual button, except the one muted by the range modifier.
//!    Logical buttons sharing a virtual button are OR-ed.
//! 3. [`MappingEngine::drive`] encodes each populated slot and writes every
//!    mapped virtual button the sink exposes.
//!
//! ## Usage
//!
//! ```
//! use pad_bridge::config::Profile;
//! use pad_bridge::controller::sample::RawSample;
//! use pad_bridge::mapping::engine::MappingEngine;
//! use pad_bridge::mapping::slots::OutputSlot;
//!
//! let mut engine = MappingEngine::new();
//! let sample = RawSample { left_x: i16::MAX, ..RawSample::default() };
//!
//! let frame = engine.process(&sample, &Profile::default(), 0.001);
//! assert!((frame.axis(OutputSlot::X).unwrap() - 1.0).abs() < 0.001);
//! assert_eq!(frame.axis(OutputSlot::Y), Some(0.0));
//! ```

use std::collections::BTreeSet;

use crate::config::{ButtonMap, Profile};
use crate::controller::sample::{LogicalButton, RawSample};
use crate::device::{encode_axis, VirtualDevice, AXIS_CENTER};
use crate::error::Result;

use super::frame::OutputFrame;
use super::pipeline::{AxisChannels, CycleInput, FrameInProgress, Stage};
use super::scripts::{AutoClutch, RangeModifier, Winding};
use super::slots::OutputSlot;

/// Per-cycle transform with its stateful stages
pub struct MappingEngine {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MappingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingEngine")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl MappingEngine {
    /// Engine with the standard pipeline and centered winding state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(AxisChannels),
                Box::new(Winding::new()),
                Box::new(RangeModifier),
                Box::new(AutoClutch),
            ],
        }
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Transform one sample. `dt` is the time since the previous cycle in seconds.
    pub fn process(&mut self, sample: &RawSample, profile: &Profile, dt: f32) -> OutputFrame {
        let input = CycleInput {
            sample,
            profile,
            dt,
        };

        let frame = self
            .stages
            .iter_mut()
            .fold(FrameInProgress::default(), |frame, stage| {
                stage.apply(&input, frame)
            });

        OutputFrame {
            axes: frame.axes,
            buttons: pressed_buttons(sample, &profile.buttons, frame.muted),
        }
    }

    /// Write `frame` to `sink` and commit.
    ///
    /// Every write is attempted; the first failure is returned. Buttons past
    /// [`VirtualDevice::button_count`] are skipped, see [`buttons_beyond`].
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the sink.
    pub fn drive<D>(frame: &OutputFrame, profile: &Profile, sink: &mut D) -> Result<()>
    where
        D: VirtualDevice + ?Sized,
    {
        let mut first_error = None;
        let mut record = |result: Result<()>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };

        for (slot, value) in frame.axes.iter() {
            record(sink.set_axis(slot, encode_axis(value)));
        }
        let limit = sink.button_count();
        for index in mapped_buttons(&profile.buttons).into_iter().filter(|&i| i <= limit) {
            record(sink.set_button(index, frame.is_button_pressed(index)));
        }
        record(sink.commit());

        first_error.map_or(Ok(()), Err)
    }

    /// Center every axis and release every mapped button.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the sink.
    pub fn reset_device<D>(sink: &mut D, profile: &Profile) -> Result<()>
    where
        D: VirtualDevice + ?Sized,
    {
        for slot in OutputSlot::ALL {
            sink.set_axis(slot, AXIS_CENTER)?;
        }
        let limit = sink.button_count();
        for index in mapped_buttons(&profile.buttons).into_iter().filter(|&i| i <= limit) {
            sink.set_button(index, false)?;
        }
        sink.commit()
    }
}

/// Distinct virtual buttons the profile routes to.
#[must_use]
pub fn mapped_buttons(buttons: &ButtonMap) -> BTreeSet<u8> {
    buttons.iter().filter_map(|(_, target)| target).collect()
}

/// Logical buttons routed past a device's last button.
///
/// # Examples
///
/// ```
/// use pad_bridge::config::ButtonMap;
/// use pad_bridge::controller::sample::LogicalButton;
/// use pad_bridge::mapping::engine::buttons_beyond;
///
/// let mut buttons = ButtonMap::default();
/// buttons.set(LogicalButton::A, Some(100));
///
/// assert_eq!(buttons_beyond(&buttons, 56), vec![(LogicalButton::A, 100)]);
/// ```
#[must_use]
pub fn buttons_beyond(buttons: &ButtonMap, limit: u8) -> Vec<(LogicalButton, u8)> {
    buttons
        .iter()
        .filter_map(|(button, target)| target.filter(|&index| index > limit).map(|index| (button, index)))
        .collect()
}

fn pressed_buttons(
    sample: &RawSample,
    buttons: &ButtonMap,
    muted: Option<LogicalButton>,
) -> BTreeSet<u8> {
    buttons
        .iter()
        .filter(|&(button, _)| Some(button) != muted && sample.is_pressed(button))
        .filter_map(|(_, target)| target)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WindingSource, VIRTUAL_BUTTON_MAX};
    use crate::device::mocks::RecordingDevice;
    use crate::device::{MockVirtualDevice, AXIS_MAX, AXIS_MIN};
    use crate::error::PadBridgeError;
    use mockall::predicate::eq;

    const DT: f32 = 0.001;

    fn holding(buttons: &[LogicalButton]) -> RawSample {
        let mut sample = RawSample::default();
        for &button in buttons {
            sample.press(button);
        }
        sample
    }

    // ==================== Pipeline Tests ====================

    #[test]
    fn test_stage_order() {
        let engine = MappingEngine::new();
        assert_eq!(
            engine.stage_names(),
            vec!["axis_channels", "winding_steering", "range_modifier", "auto_clutch"]
        );
    }

    #[test]
    fn test_left_stick_full_right() {
        let mut engine = MappingEngine::new();
        let sample = RawSample {
            left_x: 32767,
            left_y: 0,
            ..RawSample::default()
        };
        let frame = engine.process(&sample, &Profile::default(), DT);
        assert!((frame.axis(OutputSlot::X).unwrap() - 1.0).abs() < 0.001);
        assert_eq!(frame.axis(OutputSlot::Y), Some(0.0));
    }

    #[test]
    fn test_half_trigger() {
        let mut engine = MappingEngine::new();
        let sample = RawSample {
            left_trigger: 128,
            ..RawSample::default()
        };
        let frame = engine.process(&sample, &Profile::default(), DT);
        assert!((frame.axis(OutputSlot::Z).unwrap() - 0.004).abs() < 0.001);
    }

    #[test]
    fn test_range_modifier_held() {
        let mut profile = Profile::default();
        profile.scripts.range_modifier.enabled = true;
        profile.scripts.range_modifier.press_mult = 0.5;

        let mut sample = holding(&[LogicalButton::X]);
        sample.left_x = i16::MAX;
        profile.axes.lx.dz_out = 0.01;

        let mut engine = MappingEngine::new();
        let frame = engine.process(&sample, &profile, DT);
        assert_eq!(frame.axis(OutputSlot::X), Some(0.5));
    }

    #[test]
    fn test_auto_clutch_downshift_blip() {
        let mut profile = Profile::default();
        profile.scripts.auto_clutch.enabled = true;
        profile.scripts.auto_clutch.auto_blip = true;

        let mut engine = MappingEngine::new();
        let frame = engine.process(&holding(&[LogicalButton::LeftBumper]), &profile, DT);
        assert_eq!(frame.axis(OutputSlot::Ry), Some(1.0));
        assert_eq!(frame.axis(OutputSlot::Rz), Some(1.0));
    }

    #[test]
    fn test_scripts_override_in_order() {
        // Winding writes X, the range modifier then scales it
        let mut profile = Profile::default();
        profile.scripts.winding_steering.enabled_for = WindingSource::RightStick;
        profile.scripts.winding_steering.unwind = 0.0;
        profile.scripts.range_modifier.enabled = true;

        let mut engine = MappingEngine::new();
        let up = RawSample {
            right_y: i16::MAX,
            left_x: i16::MAX,
            ..RawSample::default()
        };
        let left = RawSample {
            right_x: i16::MIN,
            left_x: i16::MAX,
            ..RawSample::default()
        };
        engine.process(&up, &profile, DT);
        let frame = engine.process(&left, &profile, DT);

        // 90 degrees of 900 -> 0.2, halved by release_mult
        assert!((frame.axis(OutputSlot::X).unwrap() - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_winding_state_persists_between_cycles() {
        let mut profile = Profile::default();
        profile.scripts.winding_steering.enabled_for = WindingSource::LeftStick;
        profile.scripts.winding_steering.unwind = 0.0;

        let mut engine = MappingEngine::new();
        let up = RawSample {
            left_y: i16::MAX,
            ..RawSample::default()
        };
        let left = RawSample {
            left_x: i16::MIN,
            ..RawSample::default()
        };
        engine.process(&up, &profile, DT);
        engine.process(&left, &profile, DT);
        let frame = engine.process(&RawSample::default(), &profile, DT);
        assert!(frame.axis(OutputSlot::X).unwrap() > 0.19);
    }

    // ==================== Buttons Tests ====================

    #[test]
    fn test_pressed_buttons_follow_map() {
        let mut engine = MappingEngine::new();
        let frame = engine.process(
            &holding(&[LogicalButton::A, LogicalButton::DpadLeft]),
            &Profile::default(),
            DT,
        );
        assert_eq!(frame.buttons, BTreeSet::from([1, 13]));
    }

    #[test]
    fn test_unmapped_button_ignored() {
        let mut profile = Profile::default();
        profile.buttons.set(LogicalButton::A, None);

        let mut engine = MappingEngine::new();
        let frame = engine.process(&holding(&[LogicalButton::A]), &profile, DT);
        assert!(frame.buttons.is_empty());
    }

    #[test]
    fn test_shared_virtual_button_is_ored() {
        let mut profile = Profile::default();
        profile.buttons.set(LogicalButton::B, Some(1));

        let mut engine = MappingEngine::new();
        let frame = engine.process(&holding(&[LogicalButton::B]), &profile, DT);
        assert!(frame.is_button_pressed(1));

        let mut sink = RecordingDevice::new();
        MappingEngine::drive(&frame, &profile, &mut sink).unwrap();
        assert_eq!(sink.button(1), Some(true));
    }

    #[test]
    fn test_muted_modifier_not_pressed() {
        let mut profile = Profile::default();
        profile.scripts.range_modifier.enabled = true;
        profile.scripts.range_modifier.mute_key = true;

        let mut engine = MappingEngine::new();
        let frame = engine.process(
            &holding(&[LogicalButton::X, LogicalButton::Y]),
            &profile,
            DT,
        );
        assert!(!frame.is_button_pressed(3));
        assert!(frame.is_button_pressed(4));
    }

    // ==================== Device writes Tests ====================

    #[test]
    fn test_drive_writes_axes_and_buttons() {
        let profile = Profile::default();
        let mut engine = MappingEngine::new();
        let sample = RawSample {
            left_x: i16::MIN,
            right_trigger: u8::MAX,
            ..holding(&[LogicalButton::Start])
        };
        let frame = engine.process(&sample, &profile, DT);

        let mut sink = RecordingDevice::new();
        MappingEngine::drive(&frame, &profile, &mut sink).unwrap();

        let state = sink.state();
        assert_eq!(state.axes.get(&OutputSlot::X), Some(&AXIS_MIN));
        assert_eq!(state.axes.get(&OutputSlot::Rz), Some(&AXIS_MAX));
        assert_eq!(state.axes.get(&OutputSlot::Sl0), None);
        assert_eq!(state.buttons.len(), 14);
        assert_eq!(state.buttons.get(&8), Some(&true));
        assert_eq!(state.buttons.get(&1), Some(&false));
        assert_eq!(state.commits, 1);
    }

    #[test]
    fn test_drive_with_mock_sink() {
        let mut profile = Profile::default();
        profile.unmap_all();
        profile.axes.lx.target = Some(OutputSlot::Sl1);
        profile.buttons.set(LogicalButton::A, Some(40));

        let mut engine = MappingEngine::new();
        let frame = engine.process(&holding(&[LogicalButton::A]), &profile, DT);

        let mut sink = MockVirtualDevice::new();
        sink.expect_set_axis()
            .with(eq(OutputSlot::Sl1), eq(encode_axis(0.0)))
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_set_button()
            .with(eq(40), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_commit().times(1).returning(|| Ok(()));
        sink.expect_button_count().return_const(VIRTUAL_BUTTON_MAX);

        MappingEngine::drive(&frame, &profile, &mut sink).unwrap();
    }

    #[test]
    fn test_drive_continues_after_error() {
        let profile = Profile::default();
        let frame = MappingEngine::new().process(&RawSample::default(), &profile, DT);

        let mut sink = MockVirtualDevice::new();
        sink.expect_set_axis()
            .times(6)
            .returning(|_, _| Err(PadBridgeError::Device("gone".to_string())));
        sink.expect_set_button().times(14).returning(|_, _| Ok(()));
        sink.expect_commit().times(1).returning(|| Ok(()));
        sink.expect_button_count().return_const(VIRTUAL_BUTTON_MAX);

        let result = MappingEngine::drive(&frame, &profile, &mut sink);
        assert!(matches!(result, Err(PadBridgeError::Device(_))));
    }

    #[test]
    fn test_reset_device_centers_and_releases() {
        let mut profile = Profile::default();
        profile.buttons.set(LogicalButton::B, Some(1));

        let mut sink = RecordingDevice::new();
        MappingEngine::reset_device(&mut sink, &profile).unwrap();

        let state = sink.state();
        assert_eq!(state.axes.len(), 8);
        assert!(state.axes.values().all(|&v| v == AXIS_CENTER));
        assert_eq!(state.buttons.len(), 13);
        assert!(state.buttons.values().all(|&pressed| !pressed));
        assert_eq!(state.commits, 1);
    }

    #[test]
    fn test_drive_skips_buttons_past_device_limit() {
        let mut profile = Profile::default();
        profile.buttons.set(LogicalButton::A, Some(100));
        let frame = MappingEngine::new().process(&holding(&[LogicalButton::A]), &profile, DT);
        assert!(frame.is_button_pressed(100));

        let mut sink = RecordingDevice::new();
        sink.set_button_count(56);
        MappingEngine::drive(&frame, &profile, &mut sink).unwrap();
        MappingEngine::reset_device(&mut sink, &profile).unwrap();

        let state = sink.state();
        assert_eq!(state.buttons.get(&100), None);
        assert_eq!(state.buttons.len(), 13);
    }

    #[test]
    fn test_buttons_beyond_limit() {
        let mut buttons = ButtonMap::default();
        assert!(buttons_beyond(&buttons, 56).is_empty());

        buttons.set(LogicalButton::B, Some(57));
        buttons.set(LogicalButton::DpadUp, Some(128));
        assert_eq!(
            buttons_beyond(&buttons, 56),
            vec![(LogicalButton::B, 57), (LogicalButton::DpadUp, 128)]
        );
        assert!(buttons_beyond(&buttons, VIRTUAL_BUTTON_MAX).is_empty());
    }

    #[test]
    fn test_mapped_buttons_deduplicated() {
        let mut buttons = ButtonMap::default();
        buttons.set(LogicalButton::Y, Some(2));
        buttons.set(LogicalButton::Start, None);
        let mapped = mapped_buttons(&buttons);
        assert_eq!(mapped.len(), 12);
        assert!(!mapped.contains(&4));
        assert!(!mapped.contains(&8));
    }
}
