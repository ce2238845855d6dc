//! # uinput Virtual Joystick
//!
//! Creates a joystick through `/dev/uinput` with eight absolute axes and up
//! to [`MAX_BUTTONS`] buttons.
//!
//! ## Axis Codes
//!
//! | Slot | evdev axis |
//! |------|------------|
//! | X, Y, Z | ABS_X, ABS_Y, ABS_Z |
//! | RX, RY, RZ | ABS_RX, ABS_RY, ABS_RZ |
//! | SL0 | ABS_THROTTLE |
//! | SL1 | ABS_RUDDER |
//!
//! Buttons 1-16 use the joystick block starting at `BTN_TRIGGER`, buttons
//! 17-56 use `BTN_TRIGGER_HAPPY1` onwards.
//!
//! Writes are buffered and emitted as one report on [`VirtualDevice::commit`].
//! Unchanged values are not re-sent.

use evdev::uinput::{VirtualDevice as EvdevVirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup};
use tracing::{debug, info};

use super::{VirtualDevice, AXIS_CENTER, AXIS_MAX, AXIS_MIN};
use crate::error::{PadBridgeError, Result};
use crate::mapping::slots::{OutputSlot, NUM_SLOTS};

/// Name shown by `evtest` and games.
pub const DEVICE_NAME: &str = "Pad Bridge Virtual Joystick";

/// Highest button index the device exposes.
pub const MAX_BUTTONS: u8 = 56;

/// Buttons mapped onto the `BTN_TRIGGER` block.
const JOYSTICK_BLOCK_BUTTONS: u8 = 16;

/// evdev axis for an output slot.
#[must_use]
pub fn abs_code(slot: OutputSlot) -> AbsoluteAxisType {
    match slot {
        OutputSlot::X => AbsoluteAxisType::ABS_X,
        OutputSlot::Y => AbsoluteAxisType::ABS_Y,
        OutputSlot::Z => AbsoluteAxisType::ABS_Z,
        OutputSlot::Rx => AbsoluteAxisType::ABS_RX,
        OutputSlot::Ry => AbsoluteAxisType::ABS_RY,
        OutputSlot::Rz => AbsoluteAxisType::ABS_RZ,
        OutputSlot::Sl0 => AbsoluteAxisType::ABS_THROTTLE,
        OutputSlot::Sl1 => AbsoluteAxisType::ABS_RUDDER,
    }
}

/// evdev key for a 1-based button index, `None` past [`MAX_BUTTONS`].
///
/// # Examples
///
/// ```
/// use evdev::Key;
/// use pad_bridge::device::uinput::button_code;
///
/// assert_eq!(button_code(1), Some(Key::BTN_TRIGGER));
/// assert_eq!(button_code(17), Some(Key::BTN_TRIGGER_HAPPY1));
/// assert_eq!(button_code(57), None);
/// ```
#[must_use]
pub fn button_code(index: u8) -> Option<Key> {
    match index {
        1..=JOYSTICK_BLOCK_BUTTONS => Some(Key::new(Key::BTN_TRIGGER.code() + u16::from(index - 1))),
        17..=MAX_BUTTONS => Some(Key::new(
            Key::BTN_TRIGGER_HAPPY1.code() + u16::from(index - JOYSTICK_BLOCK_BUTTONS - 1),
        )),
        _ => None,
    }
}

fn device_error(context: &str, e: std::io::Error) -> PadBridgeError {
    PadBridgeError::Device(format!("{}: {}", context, e))
}

/// Virtual joystick backed by uinput
pub struct UinputJoystick {
    device: EvdevVirtualDevice,
    pending: Vec<InputEvent>,
    axes: [Option<u16>; NUM_SLOTS],
    buttons: [Option<bool>; MAX_BUTTONS as usize],
}

impl UinputJoystick {
    /// Create the device. Axes start centered.
    ///
    /// # Errors
    ///
    /// Returns error if `/dev/uinput` cannot be opened (missing module or
    /// permissions) or the device cannot be registered.
    pub fn create(name: &str) -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for key in (1..=MAX_BUTTONS).filter_map(button_code) {
            keys.insert(key);
        }

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(|e| device_error("Cannot open /dev/uinput", e))?
            .name(name)
            .with_keys(&keys)
            .map_err(|e| device_error("Cannot register buttons", e))?;

        let info = AbsInfo::new(
            i32::from(AXIS_CENTER),
            i32::from(AXIS_MIN),
            i32::from(AXIS_MAX),
            0,
            0,
            1,
        );
        for slot in OutputSlot::ALL {
            let setup = UinputAbsSetup::new(abs_code(slot), info);
            builder = builder
                .with_absolute_axis(&setup)
                .map_err(|e| device_error("Cannot register axis", e))?;
        }

        let device = builder
            .build()
            .map_err(|e| device_error("Cannot create virtual joystick", e))?;

        info!(
            "Created virtual joystick '{}' ({} axes, {} buttons)",
            name, NUM_SLOTS, MAX_BUTTONS
        );

        Ok(Self {
            device,
            pending: Vec::with_capacity(NUM_SLOTS + usize::from(MAX_BUTTONS)),
            axes: [None; NUM_SLOTS],
            buttons: [None; MAX_BUTTONS as usize],
        })
    }
}

impl VirtualDevice for UinputJoystick {
    fn set_axis(&mut self, slot: OutputSlot, value: u16) -> Result<()> {
        let value = value.clamp(AXIS_MIN, AXIS_MAX);
        let cached = &mut self.axes[slot.index()];
        if *cached == Some(value) {
            return Ok(());
        }
        *cached = Some(value);

        self.pending.push(InputEvent::new(
            EventType::ABSOLUTE,
            abs_code(slot).0,
            i32::from(value),
        ));
        Ok(())
    }

    fn set_button(&mut self, index: u8, pressed: bool) -> Result<()> {
        let key = button_code(index).ok_or_else(|| {
            PadBridgeError::Device(format!(
                "Button {} exceeds the {} buttons of the virtual joystick",
                index, MAX_BUTTONS
            ))
        })?;

        let cached = &mut self.buttons[usize::from(index - 1)];
        if *cached == Some(pressed) {
            return Ok(());
        }
        *cached = Some(pressed);

        self.pending
            .push(InputEvent::new(EventType::KEY, key.code(), i32::from(pressed)));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        debug!("Emitting {} events", self.pending.len());
        let result = self.device.emit(&self.pending);
        self.pending.clear();
        result.map_err(|e| device_error("Failed to emit events", e))
    }

    fn button_count(&self) -> u8 {
        MAX_BUTTONS
    }
}
