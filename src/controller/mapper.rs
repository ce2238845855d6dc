//! # Controller Event Mapper
//!
//! Folds raw evdev events from a PS5 DualSense controller into a
//! [`RawSample`] with XInput conventions.
//!
//! ## Axis Codes (EV_ABS, `hid-playstation` layout)
//!
//! | Input | evdev Code | Raw Range | Sample Field |
//! |-------|------------|-----------|--------------|
//! | Left Stick X | ABS_X | 0-255 | `left_x` |
//! | Left Stick Y | ABS_Y | 0-255 (down positive) | `left_y` (up positive) |
//! | Right Stick X | ABS_RX | 0-255 | `right_x` |
//! | Right Stick Y | ABS_RY | 0-255 (down positive) | `right_y` (up positive) |
//! | L2 Trigger | ABS_Z | 0-255 | `left_trigger` |
//! | R2 Trigger | ABS_RZ | 0-255 | `right_trigger` |
//! | D-Pad X | ABS_HAT0X | -1/0/1 | `DPad_Left` / `DPad_Right` |
//! | D-Pad Y | ABS_HAT0Y | -1/0/1 | `DPad_Up` / `DPad_Down` |
//!
//! ## Button Codes (EV_KEY)
//!
//! | Button | evdev Code | Logical Button |
//! |--------|------------|----------------|
//! | Cross (×) | BTN_SOUTH | A |
//! | Circle (○) | BTN_EAST | B |
//! | Square (□) | BTN_WEST | X |
//! | Triangle (△) | BTN_NORTH | Y |
//! | L1 | BTN_TL | LB |
//! | R1 | BTN_TR | RB |
//! | Create | BTN_SELECT | Back |
//! | Options | BTN_START | Start |
//! | L3 | BTN_THUMBL | LS_Click |
//! | R3 | BTN_THUMBR | RS_Click |
//!
//! The PS button, touchpad and digital trigger clicks have no XInput
//! counterpart and are ignored.

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

use super::sample::{LogicalButton, RawSample};

/// Raw axis value range from DualSense controller.
pub const RAW_AXIS_MIN: i32 = 0;
/// Raw axis value range from DualSense controller.
pub const RAW_AXIS_MAX: i32 = 255;
/// Raw axis center value.
pub const RAW_AXIS_CENTER: i32 = 128;

/// D-Pad pressed negative direction (left or up).
pub const DPAD_NEGATIVE: i32 = -1;
/// D-Pad pressed positive direction (right or down).
pub const DPAD_POSITIVE: i32 = 1;

/// Converts a raw 0-255 stick value to the signed 16-bit range.
///
/// # Examples
///
/// ```
/// use pad_bridge::controller::mapper::stick_to_i16;
///
/// assert_eq!(stick_to_i16(0), i16::MIN);
/// assert_eq!(stick_to_i16(128), 0);
/// assert_eq!(stick_to_i16(255), i16::MAX);
/// ```
#[must_use]
pub fn stick_to_i16(raw: i32) -> i16 {
    let offset = raw.clamp(RAW_AXIS_MIN, RAW_AXIS_MAX) - RAW_AXIS_CENTER;
    if offset >= 0 {
        (offset * i32::from(i16::MAX) / (RAW_AXIS_MAX - RAW_AXIS_CENTER)) as i16
    } else {
        (offset * -i32::from(i16::MIN) / RAW_AXIS_CENTER) as i16
    }
}

/// Converts a raw trigger value to `0..=255`.
#[must_use]
pub fn trigger_to_u8(raw: i32) -> u8 {
    raw.clamp(RAW_AXIS_MIN, RAW_AXIS_MAX) as u8
}

/// Logical button for a DualSense key code.
#[must_use]
pub fn logical_button(key: Key) -> Option<LogicalButton> {
    Some(match key {
        Key::BTN_SOUTH => LogicalButton::A,
        Key::BTN_EAST => LogicalButton::B,
        Key::BTN_WEST => LogicalButton::X,
        Key::BTN_NORTH => LogicalButton::Y,
        Key::BTN_TL => LogicalButton::LeftBumper,
        Key::BTN_TR => LogicalButton::RightBumper,
        Key::BTN_SELECT => LogicalButton::Back,
        Key::BTN_START => LogicalButton::Start,
        Key::BTN_THUMBL => LogicalButton::LeftStickClick,
        Key::BTN_THUMBR => LogicalButton::RightStickClick,
        // Some drivers report the D-pad as buttons instead of a hat
        Key::BTN_DPAD_UP => LogicalButton::DpadUp,
        Key::BTN_DPAD_DOWN => LogicalButton::DpadDown,
        Key::BTN_DPAD_LEFT => LogicalButton::DpadLeft,
        Key::BTN_DPAD_RIGHT => LogicalButton::DpadRight,
        _ => return None,
    })
}

/// Parses raw evdev events and maintains the current sample.
///
/// Not thread-safe; each reader thread owns one.
///
/// # Examples
///
/// ```
/// use evdev::{EventType, InputEvent, Key};
/// use pad_bridge::controller::mapper::EventMapper;
/// use pad_bridge::controller::sample::LogicalButton;
///
/// let mut mapper = EventMapper::new();
/// mapper.process_event(&InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 1));
///
/// assert!(mapper.sample().is_pressed(LogicalButton::A));
/// ```
#[derive(Debug, Default)]
pub struct EventMapper {
    sample: RawSample,
}

impl EventMapper {
    /// Creates a new event mapper with a neutral sample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sample reflecting all events processed so far.
    #[must_use]
    pub fn sample(&self) -> RawSample {
        self.sample
    }

    /// Processes a single evdev input event.
    ///
    /// Sync and unknown events are ignored.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => {
                if let Some(button) = logical_button(key) {
                    self.sample.set(button, event.value() != 0);
                }
            }
            _ => {}
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        let sample = &mut self.sample;
        match axis {
            AbsoluteAxisType::ABS_X => sample.left_x = stick_to_i16(value),
            AbsoluteAxisType::ABS_Y => sample.left_y = stick_to_i16(value).saturating_neg(),
            AbsoluteAxisType::ABS_RX => sample.right_x = stick_to_i16(value),
            AbsoluteAxisType::ABS_RY => sample.right_y = stick_to_i16(value).saturating_neg(),
            AbsoluteAxisType::ABS_Z => sample.left_trigger = trigger_to_u8(value),
            AbsoluteAxisType::ABS_RZ => sample.right_trigger = trigger_to_u8(value),
            AbsoluteAxisType::ABS_HAT0X => {
                sample.set(LogicalButton::DpadLeft, value == DPAD_NEGATIVE);
                sample.set(LogicalButton::DpadRight, value == DPAD_POSITIVE);
            }
            AbsoluteAxisType::ABS_HAT0Y => {
                sample.set(LogicalButton::DpadUp, value == DPAD_NEGATIVE);
                sample.set(LogicalButton::DpadDown, value == DPAD_POSITIVE);
            }
            // Motion sensors live on a separate event node
            _ => {}
        }
    }

    /// Back to a neutral sample, used when a controller disconnects.
    pub fn reset(&mut self) {
        self.sample = RawSample::default();
    }
}
