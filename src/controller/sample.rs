//! # Raw Controller Sample
//!
//! One polling cycle's snapshot of a gamepad, in the XInput layout:
//! a 16-bit button bitmask, two 8-bit triggers and four signed 16-bit
//! stick axes (Y axes positive up).
//!
//! ## Logical Buttons
//!
//! | Button | Profile key | Mask |
//! |--------|-------------|------|
//! | D-Pad Up | `DPad_Up` | 0x0001 |
//! | D-Pad Down | `DPad_Down` | 0x0002 |
//! | D-Pad Left | `DPad_Left` | 0x0004 |
//! | D-Pad Right | `DPad_Right` | 0x0008 |
//! | Start | `Start` | 0x0010 |
//! | Back | `Back` | 0x0020 |
//! | Left stick click | `LS_Click` | 0x0040 |
//! | Right stick click | `RS_Click` | 0x0080 |
//! | Left bumper | `LB` | 0x0100 |
//! | Right bumper | `RB` | 0x0200 |
//! | A | `A` | 0x1000 |
//! | B | `B` | 0x2000 |
//! | X | `X` | 0x4000 |
//! | Y | `Y` | 0x8000 |

use std::fmt;
use std::str::FromStr;

/// Largest positive stick value.
pub const STICK_MAX: i16 = i16::MAX;
/// Largest negative stick value.
pub const STICK_MIN: i16 = i16::MIN;
/// Fully pressed trigger value.
pub const TRIGGER_MAX: u8 = u8::MAX;

/// One of the 14 fixed digital inputs on the physical controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalButton {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    Back,
    Start,
    LeftStickClick,
    RightStickClick,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl LogicalButton {
    /// Every logical button, in profile order.
    pub const ALL: [LogicalButton; 14] = [
        LogicalButton::A,
        LogicalButton::B,
        LogicalButton::X,
        LogicalButton::Y,
        LogicalButton::LeftBumper,
        LogicalButton::RightBumper,
        LogicalButton::Back,
        LogicalButton::Start,
        LogicalButton::LeftStickClick,
        LogicalButton::RightStickClick,
        LogicalButton::DpadUp,
        LogicalButton::DpadDown,
        LogicalButton::DpadLeft,
        LogicalButton::DpadRight,
    ];

    /// Bit of this button in [`RawSample::buttons`].
    #[must_use]
    pub const fn mask(self) -> u16 {
        match self {
            LogicalButton::DpadUp => 0x0001,
            LogicalButton::DpadDown => 0x0002,
            LogicalButton::DpadLeft => 0x0004,
            LogicalButton::DpadRight => 0x0008,
            LogicalButton::Start => 0x0010,
            LogicalButton::Back => 0x0020,
            LogicalButton::LeftStickClick => 0x0040,
            LogicalButton::RightStickClick => 0x0080,
            LogicalButton::LeftBumper => 0x0100,
            LogicalButton::RightBumper => 0x0200,
            LogicalButton::A => 0x1000,
            LogicalButton::B => 0x2000,
            LogicalButton::X => 0x4000,
            LogicalButton::Y => 0x8000,
        }
    }

    /// Profile key of this button.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LogicalButton::A => "A",
            LogicalButton::B => "B",
            LogicalButton::X => "X",
            LogicalButton::Y => "Y",
            LogicalButton::LeftBumper => "LB",
            LogicalButton::RightBumper => "RB",
            LogicalButton::Back => "Back",
            LogicalButton::Start => "Start",
            LogicalButton::LeftStickClick => "LS_Click",
            LogicalButton::RightStickClick => "RS_Click",
            LogicalButton::DpadUp => "DPad_Up",
            LogicalButton::DpadDown => "DPad_Down",
            LogicalButton::DpadLeft => "DPad_Left",
            LogicalButton::DpadRight => "DPad_Right",
        }
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalButton::ALL
            .into_iter()
            .find(|button| button.name() == s)
            .ok_or_else(|| format!("unknown logical button '{}'", s))
    }
}

/// One cycle's controller snapshot.
///
/// # Examples
///
/// ```
/// use pad_bridge::controller::sample::{LogicalButton, RawSample};
///
/// let mut sample = RawSample::default();
/// assert!(!sample.any_button_pressed());
///
/// sample.press(LogicalButton::A);
/// assert!(sample.is_pressed(LogicalButton::A));
/// assert_eq!(sample.buttons, 0x1000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    /// Button bitmask, see [`LogicalButton::mask`].
    pub buttons: u16,
    /// Left trigger, 0 = released, 255 = fully pressed.
    pub left_trigger: u8,
    /// Right trigger, 0 = released, 255 = fully pressed.
    pub right_trigger: u8,
    /// Left stick X, positive right.
    pub left_x: i16,
    /// Left stick Y, positive up.
    pub left_y: i16,
    /// Right stick X, positive right.
    pub right_x: i16,
    /// Right stick Y, positive up.
    pub right_y: i16,
}

impl RawSample {
    /// Returns true if `button` is held in this sample.
    #[must_use]
    pub fn is_pressed(&self, button: LogicalButton) -> bool {
        self.buttons & button.mask() != 0
    }

    /// Returns true if any digital button is held. Sticks and triggers are ignored.
    #[must_use]
    pub fn any_button_pressed(&self) -> bool {
        self.buttons != 0
    }

    /// Marks `button` as held.
    pub fn press(&mut self, button: LogicalButton) {
        self.buttons |= button.mask();
    }

    /// Marks `button` as released.
    pub fn release(&mut self, button: LogicalButton) {
        self.buttons &= !button.mask();
    }

    /// Sets `button` held or released.
    pub fn set(&mut self, button: LogicalButton, pressed: bool) {
        if pressed {
            self.press(button);
        } else {
            self.release(button);
        }
    }
}
