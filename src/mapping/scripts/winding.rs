//! # Winding-Stick Steering
//!
//! Turns a thumbstick into a steering wheel: rotating the stick around its
//! rim winds an angle up (like turning a wheel hand over hand) and releasing
//! it lets the angle unwind back to center.
//!
//! Headings use `atan2(-x, y)` in degrees, so straight up is 0 and a
//! clockwise turn winds the angle negative.

use crate::config::{WindingSource, WindingSteeringConfig};
use crate::mapping::geometry::normalize_pair;
use crate::mapping::pipeline::{CycleInput, FrameInProgress, Stage};

/// Stick must be pushed past this magnitude for rotation to count.
pub const ACTIVE_RADIUS: f32 = 0.1;

/// Below this magnitude the angle unwinds toward center.
pub const UNWIND_RADIUS: f32 = 0.95;

/// Accumulated wheel angle for one stick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindingState {
    angle: f32,
    previous: Option<(f32, f32)>,
}

impl WindingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wheel angle in degrees.
    #[must_use]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Back to center with no previous position.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance the wheel by one sample and return the output in `-1.0..=1.0`.
    ///
    /// `dt` is in seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::config::WindingSteeringConfig;
    /// use pad_bridge::mapping::scripts::winding::WindingState;
    ///
    /// let config = WindingSteeringConfig::default();
    /// let mut state = WindingState::new();
    ///
    /// // Push up, then sweep a quarter turn to the right
    /// state.process(0, i16::MAX, 0.001, &config);
    /// let output = state.process(i16::MAX, 0, 0.001, &config);
    ///
    /// assert!((state.angle() + 90.0).abs() < 0.01);
    /// assert!((output + 0.2).abs() < 0.001);
    /// ```
    pub fn process(&mut self, x_raw: i16, y_raw: i16, dt: f32, config: &WindingSteeringConfig) -> f32 {
        if !(config.range > 0.0) {
            return 0.0;
        }

        let (x, y) = normalize_pair(x_raw, y_raw);
        let magnitude = x.hypot(y);

        if magnitude > ACTIVE_RADIUS {
            if let Some((px, py)) = self.previous {
                let delta = shortest_delta(heading(x, y), heading(px, py));
                self.angle += delta * magnitude;
            }
        }

        if magnitude < UNWIND_RADIUS {
            let unwind = config.unwind.max(0.0) * (1.0 - magnitude) * dt.max(0.0);
            if unwind >= self.angle.abs() {
                self.angle = 0.0;
            } else {
                self.angle -= unwind * self.angle.signum();
            }
        }

        let limit = config.range / 2.0 + config.buffer.max(0.0);
        self.angle = self.angle.clamp(-limit, limit);

        self.previous = (magnitude > ACTIVE_RADIUS).then_some((x, y));

        (self.angle * 2.0 / config.range).clamp(-1.0, 1.0)
    }
}

/// Heading of a stick position in degrees, 0 pointing up.
fn heading(x: f32, y: f32) -> f32 {
    (-x).atan2(y).to_degrees()
}

/// Signed difference `current - previous` wrapped into `(-180, 180]`.
fn shortest_delta(current: f32, previous: f32) -> f32 {
    let delta = (current - previous).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

/// Pipeline stage driving the winding target slot.
///
/// Keeps one [`WindingState`] per stick so switching sides never carries an
/// angle over; disabling the script re-centers both.
#[derive(Debug, Clone, Default)]
pub struct Winding {
    left: WindingState,
    right: WindingState,
}

impl Winding {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of the stick `source` selects, if any.
    #[must_use]
    pub fn state(&self, source: WindingSource) -> Option<&WindingState> {
        match source {
            WindingSource::Disabled => None,
            WindingSource::LeftStick => Some(&self.left),
            WindingSource::RightStick => Some(&self.right),
        }
    }
}

impl Stage for Winding {
    fn name(&self) -> &'static str {
        "winding_steering"
    }

    fn apply(&mut self, input: &CycleInput<'_>, mut frame: FrameInProgress) -> FrameInProgress {
        let config = &input.profile.scripts.winding_steering;
        let sample = input.sample;

        let (state, x_raw, y_raw) = match config.enabled_for {
            WindingSource::Disabled => {
                self.left.reset();
                self.right.reset();
                return frame;
            }
            WindingSource::LeftStick => (&mut self.left, sample.left_x, sample.left_y),
            WindingSource::RightStick => (&mut self.right, sample.right_x, sample.right_y),
        };

        let output = state.process(x_raw, y_raw, input.dt, config);
        if let Some(target) = config.target_axis {
            frame.axes.insert(target, output);
        }
        frame
    }
}
