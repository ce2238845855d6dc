//! # Virtual Joystick Sink
//!
//! The mapping engine writes encoded axis values and button states to a
//! [`VirtualDevice`]. The Linux implementation lives in [`uinput`]; tests use
//! the mocks below.
//!
//! ## Axis Encoding
//!
//! Normalized values in `-1.0..=1.0` are encoded into the device range
//! `1..=32767`:
//!
//! | Normalized | Encoded |
//! |------------|---------|
//! | -1.0 | 1 |
//! | 0.0 | 16385 |
//! | 1.0 | 32767 |

pub mod uinput;

use crate::config::VIRTUAL_BUTTON_MAX;
use crate::error::Result;
use crate::mapping::slots::OutputSlot;

/// Lowest encoded axis value.
pub const AXIS_MIN: u16 = 1;

/// Highest encoded axis value.
pub const AXIS_MAX: u16 = 32767;

/// Value written to every axis when the device is released.
pub const AXIS_CENTER: u16 = 16384;

/// Half of the encoded span.
const AXIS_HALF_SPAN: f32 = 16383.5;

/// Encode a normalized axis value into the device range.
///
/// Input is clamped to `-1.0..=1.0`; NaN encodes as center.
///
/// # Examples
///
/// ```
/// use pad_bridge::device::{encode_axis, AXIS_MAX, AXIS_MIN};
///
/// assert_eq!(encode_axis(-1.0), AXIS_MIN);
/// assert_eq!(encode_axis(1.0), AXIS_MAX);
/// assert_eq!(encode_axis(0.0), 16385);
/// ```
#[must_use]
pub fn encode_axis(value: f32) -> u16 {
    let value = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    let encoded = ((value + 1.0) * AXIS_HALF_SPAN).round() as u32 + 1;
    encoded.min(u32::from(AXIS_MAX)) as u16
}

/// Output sink for one virtual joystick
#[cfg_attr(test, mockall::automock)]
pub trait VirtualDevice: Send {
    /// Set an axis to an encoded value in `AXIS_MIN..=AXIS_MAX`.
    fn set_axis(&mut self, slot: OutputSlot, value: u16) -> Result<()>;

    /// Press or release virtual button `index` (1-based).
    fn set_button(&mut self, index: u8, pressed: bool) -> Result<()>;

    /// Flush the writes of this cycle.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Highest button index this device exposes.
    fn button_count(&self) -> u8 {
        VIRTUAL_BUTTON_MAX
    }
}

impl<T: VirtualDevice + ?Sized> VirtualDevice for Box<T> {
    fn set_axis(&mut self, slot: OutputSlot, value: u16) -> Result<()> {
        (**self).set_axis(slot, value)
    }

    fn set_button(&mut self, index: u8, pressed: bool) -> Result<()> {
        (**self).set_button(index, pressed)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn button_count(&self) -> u8 {
        (**self).button_count()
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::PadBridgeError;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// Latest state written to a [`RecordingDevice`]
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct DeviceState {
        pub axes: BTreeMap<OutputSlot, u16>,
        pub buttons: BTreeMap<u8, bool>,
        pub commits: usize,
    }

    /// Device that records every write, shareable across tasks
    #[derive(Clone, Default)]
    pub struct RecordingDevice {
        state: Arc<Mutex<DeviceState>>,
        fail_writes: Arc<Mutex<bool>>,
        button_limit: Arc<Mutex<Option<u8>>>,
    }

    impl RecordingDevice {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn state(&self) -> DeviceState {
            self.state.lock().unwrap().clone()
        }

        pub fn axis(&self, slot: OutputSlot) -> Option<u16> {
            self.state.lock().unwrap().axes.get(&slot).copied()
        }

        pub fn button(&self, index: u8) -> Option<bool> {
            self.state.lock().unwrap().buttons.get(&index).copied()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            *self.fail_writes.lock().unwrap() = fail;
        }

        /// Limit the exposed buttons, like a real device would.
        pub fn set_button_count(&self, count: u8) {
            *self.button_limit.lock().unwrap() = Some(count);
        }

        fn check(&self) -> Result<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(PadBridgeError::Device("Mock write error".to_string()));
            }
            Ok(())
        }
    }

    impl VirtualDevice for RecordingDevice {
        fn set_axis(&mut self, slot: OutputSlot, value: u16) -> Result<()> {
            self.check()?;
            self.state.lock().unwrap().axes.insert(slot, value);
            Ok(())
        }

        fn set_button(&mut self, index: u8, pressed: bool) -> Result<()> {
            self.check()?;
            self.state.lock().unwrap().buttons.insert(index, pressed);
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            self.state.lock().unwrap().commits += 1;
            Ok(())
        }

        fn button_count(&self) -> u8 {
            self.button_limit.lock().unwrap().unwrap_or(VIRTUAL_BUTTON_MAX)
        }
    }
}
