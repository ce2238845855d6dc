//! # Output Slots
//!
//! The eight addressable axes of the virtual joystick and the per-cycle
//! storage of their normalized values.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Number of virtual joystick axes.
pub const NUM_SLOTS: usize = 8;

/// One of the eight virtual joystick axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputSlot {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
    Sl0,
    Sl1,
}

impl OutputSlot {
    /// Every slot, in index order.
    pub const ALL: [OutputSlot; NUM_SLOTS] = [
        OutputSlot::X,
        OutputSlot::Y,
        OutputSlot::Z,
        OutputSlot::Rx,
        OutputSlot::Ry,
        OutputSlot::Rz,
        OutputSlot::Sl0,
        OutputSlot::Sl1,
    ];

    /// Position of this slot in [`AxisValues`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Profile name of this slot.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OutputSlot::X => "X",
            OutputSlot::Y => "Y",
            OutputSlot::Z => "Z",
            OutputSlot::Rx => "RX",
            OutputSlot::Ry => "RY",
            OutputSlot::Rz => "RZ",
            OutputSlot::Sl0 => "SL0",
            OutputSlot::Sl1 => "SL1",
        }
    }
}

impl fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputSlot::ALL
            .into_iter()
            .find(|slot| slot.name() == s)
            .ok_or_else(|| format!("unknown output axis '{}'", s))
    }
}

/// Normalized value per output slot, `None` where nothing wrote this cycle.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::slots::{AxisValues, OutputSlot};
///
/// let mut axes = AxisValues::new();
/// axes.insert(OutputSlot::Rz, 0.25);
///
/// assert_eq!(axes.get(OutputSlot::Rz), Some(0.25));
/// assert_eq!(axes.get(OutputSlot::X), None);
/// assert_eq!(axes.len(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisValues {
    values: [Option<f32>; NUM_SLOTS],
}

impl AxisValues {
    /// Creates an empty set of values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value written to `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: OutputSlot) -> Option<f32> {
        self.values[slot.index()]
    }

    /// Writes `value` to `slot`, replacing any earlier value.
    pub fn insert(&mut self, slot: OutputSlot, value: f32) {
        self.values[slot.index()] = Some(value);
    }

    /// Rewrites the value of `slot` in place. No-op when `slot` is empty.
    pub fn update(&mut self, slot: OutputSlot, f: impl FnOnce(f32) -> f32) {
        if let Some(value) = self.values[slot.index()].as_mut() {
            *value = f(*value);
        }
    }

    /// Returns true if `slot` holds a value.
    #[must_use]
    pub fn contains(&self, slot: OutputSlot) -> bool {
        self.values[slot.index()].is_some()
    }

    /// Number of populated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Returns true if no slot is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Iterates populated slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (OutputSlot, f32)> + '_ {
        OutputSlot::ALL
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|value| (slot, value)))
    }
}

impl Serialize for AxisValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (slot, value) in self.iter() {
            map.serialize_entry(slot.name(), &value)?;
        }
        map.end()
    }
}
