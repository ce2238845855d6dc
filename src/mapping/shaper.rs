//! # Signal Shaper
//!
//! Applies deadzones, response curves and anti-deadzone to normalized
//! stick and trigger inputs.
//!
//! ## Deadzones
//!
//! The inner deadzone (`dz_in`) collapses small movements near rest to zero.
//! The outer deadzone (`dz_out`) saturates the last stretch of travel to full
//! output. The remaining range is rescaled to `0..1`.
//!
//! ## Linearity
//!
//! Linearity blends between a straight line and an eased curve:
//!
//! - `lin > 0`: towards `sin(n * π/2)` (more sensitive near center)
//! - `lin < 0`: towards `1 - cos(n * π/2)` (finer control near center)
//! - `lin = 0`: linear
//!
//! The blend factor is `|lin| / 100`, so ±100 is the fully eased curve.
//!
//! ## Anti-deadzone
//!
//! Sticks may add an output floor to every non-zero magnitude, to get past a
//! game's own deadzone. The center stays exactly zero.
//!
//! ## Usage
//!
//! ```
//! use pad_bridge::mapping::shaper::{shape_stick, shape_trigger};
//!
//! // 10% inner deadzone swallows small movements
//! assert_eq!(shape_stick(0.05, 0.1, 0.0, 0.0, 0, false), 0.0);
//!
//! // Full deflection is preserved
//! assert!((shape_stick(1.0, 0.1, 0.0, 0.0, 0, false) - 1.0).abs() < 1e-6);
//!
//! // Released trigger maps to the start of its output range
//! assert_eq!(shape_trigger(0.0, 0.0, 0.0, -1.0, 1.0, 0), -1.0);
//! ```

use std::f32::consts::FRAC_PI_2;

use crate::config::{StickChannel, TriggerChannel};

/// Converts a raw stick value to `-1.0..1.0`.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::shaper::normalize_stick;
///
/// assert_eq!(normalize_stick(i16::MIN), -1.0);
/// assert_eq!(normalize_stick(0), 0.0);
/// assert!((normalize_stick(i16::MAX) - 1.0).abs() < 0.001);
/// ```
#[must_use]
pub fn normalize_stick(raw: i16) -> f32 {
    f32::from(raw) / 32768.0
}

/// Converts a raw trigger value to `0.0..1.0`.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::shaper::normalize_trigger;
///
/// assert_eq!(normalize_trigger(0), 0.0);
/// assert_eq!(normalize_trigger(255), 1.0);
/// ```
#[must_use]
pub fn normalize_trigger(raw: u8) -> f32 {
    f32::from(raw) / 255.0
}

/// Applies the linearity curve to a magnitude in `0..1`.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::shaper::curve;
///
/// assert_eq!(curve(0.3, 0), 0.3);
/// assert!(curve(0.3, 100) > 0.3);
/// assert!(curve(0.3, -100) < 0.3);
/// ```
#[must_use]
pub fn curve(norm: f32, linearity: i32) -> f32 {
    if linearity == 0 {
        return norm;
    }

    let curved = if linearity > 0 {
        (norm * FRAC_PI_2).sin()
    } else {
        1.0 - (norm * FRAC_PI_2).cos()
    };
    let strength = linearity.unsigned_abs() as f32 / 100.0;

    norm * (1.0 - strength) + curved * strength
}

/// Rescales a magnitude past the inner deadzone, saturating inside the outer one.
#[inline]
fn rescale(magnitude: f32, dz_in: f32, dz_out: f32) -> f32 {
    if magnitude > 1.0 - dz_out {
        return 1.0;
    }

    let span = 1.0 - dz_out - dz_in;
    let span = if span > f32::EPSILON { span } else { 1.0 };
    (magnitude - dz_in) / span
}

/// Shapes one normalized stick axis (`-1.0..1.0`).
#[must_use]
pub fn shape_stick(
    value: f32,
    dz_in: f32,
    dz_out: f32,
    anti_dz: f32,
    linearity: i32,
    invert: bool,
) -> f32 {
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    let magnitude = value.abs();

    if magnitude < dz_in {
        return 0.0;
    }

    let mut shaped = curve(rescale(magnitude, dz_in, dz_out), linearity);
    if shaped > 0.0 {
        shaped = anti_dz + shaped * (1.0 - anti_dz);
    }

    let result = shaped * sign;
    if invert {
        -result
    } else {
        result
    }
}

/// Shapes one normalized trigger (`0.0..1.0`) into `out_start..out_end`.
///
/// `out_start > out_end` gives an inverted range.
#[must_use]
pub fn shape_trigger(
    value: f32,
    dz_in: f32,
    dz_out: f32,
    out_start: f32,
    out_end: f32,
    linearity: i32,
) -> f32 {
    if value < dz_in {
        return out_start;
    }

    let norm = curve(rescale(value, dz_in, dz_out), linearity);
    out_start + norm * (out_end - out_start)
}

/// Shaping parameters of one stick axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickShaping {
    pub dz_in: f32,
    pub dz_out: f32,
    pub anti_dz: f32,
    pub linearity: i32,
    pub invert: bool,
}

impl StickShaping {
    /// No deadzones, linear, not inverted.
    #[must_use]
    pub fn linear() -> Self {
        Self {
            dz_in: 0.0,
            dz_out: 0.0,
            anti_dz: 0.0,
            linearity: 0,
            invert: false,
        }
    }

    /// Shapes a normalized stick value.
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        shape_stick(
            value,
            self.dz_in,
            self.dz_out,
            self.anti_dz,
            self.linearity,
            self.invert,
        )
    }
}

impl From<&StickChannel> for StickShaping {
    fn from(channel: &StickChannel) -> Self {
        Self {
            dz_in: channel.dz_in,
            dz_out: channel.dz_out,
            anti_dz: channel.anti_dz,
            linearity: channel.lin,
            invert: channel.inv,
        }
    }
}

/// Shaping parameters of one trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerShaping {
    pub dz_in: f32,
    pub dz_out: f32,
    pub start: f32,
    pub end: f32,
    pub linearity: i32,
}

impl TriggerShaping {
    /// Shapes a normalized trigger value.
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        shape_trigger(
            value,
            self.dz_in,
            self.dz_out,
            self.start,
            self.end,
            self.linearity,
        )
    }
}

impl From<&TriggerChannel> for TriggerShaping {
    fn from(channel: &TriggerChannel) -> Self {
        Self {
            dz_in: channel.dz_in,
            dz_out: channel.dz_out,
            start: channel.start,
            end: channel.end,
            linearity: channel.lin,
        }
    }
}
