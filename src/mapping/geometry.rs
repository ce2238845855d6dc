//! # Stick Geometry
//!
//! A thumbstick's travel is bounded by a circle, so on a diagonal neither
//! axis reaches full scale. [`squarify`] stretches the circular envelope to a
//! square one so diagonal travel reaches the same per-axis extremes as
//! cardinal travel.

use super::shaper::normalize_stick;

/// Below this magnitude the stick is treated as centered.
const MIN_MAGNITUDE: f32 = 0.01;

/// Below this dominant component the stretch factor is unstable.
const MIN_COMPONENT: f32 = 0.001;

/// Normalizes a raw stick pair without remapping.
#[must_use]
pub fn normalize_pair(x_raw: i16, y_raw: i16) -> (f32, f32) {
    (normalize_stick(x_raw), normalize_stick(y_raw))
}

/// Normalizes a raw stick pair and expands the circular envelope to a square.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::geometry::squarify;
///
/// // Full diagonal reaches both extremes
/// let (x, y) = squarify(23170, 23170);
/// assert!((x - 1.0).abs() < 0.01);
/// assert!((y - 1.0).abs() < 0.01);
///
/// // Cardinal travel is unchanged
/// let (x, y) = squarify(16384, 0);
/// assert_eq!((x, y), (0.5, 0.0));
/// ```
#[must_use]
pub fn squarify(x_raw: i16, y_raw: i16) -> (f32, f32) {
    let (x, y) = normalize_pair(x_raw, y_raw);
    let magnitude = x.hypot(y);
    if magnitude < MIN_MAGNITUDE {
        return (x, y);
    }

    let dominant = x.abs().max(y.abs());
    if dominant < MIN_COMPONENT {
        return (x, y);
    }

    let scale = magnitude / dominant;
    ((x * scale).clamp(-1.0, 1.0), (y * scale).clamp(-1.0, 1.0))
}
