//! # Configuration Module
//!
//! Loads, validates and saves the mapping profile.
//!
//! The profile is a JSON document (a `.toml` file holding the same tree is
//! accepted too). Loading deep-merges the file onto the default profile
//! field by field, so files written by older or newer versions keep working:
//!
//! - objects are merged recursively
//! - a leaf of the same type replaces the default
//! - numeric strings (`"900"`) replace numeric defaults
//! - `"None"` unmaps a button
//! - any other type mismatch keeps the default and logs a warning
//!
//! Unknown top-level keys are kept and written back on save.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::sample::LogicalButton;
use crate::error::{PadBridgeError, Result};
use crate::mapping::slots::OutputSlot;

/// Marker used by the profile for unmapped buttons and axes.
pub const UNMAPPED: &str = "None";

/// Accepted range of `update_rate`, in Hz.
pub const UPDATE_RATE_MIN: u32 = 60;
/// Accepted range of `update_rate`, in Hz.
pub const UPDATE_RATE_MAX: u32 = 2000;

/// Highest virtual button index.
pub const VIRTUAL_BUTTON_MAX: u8 = 128;

/// Complete mapping profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub global_settings: GlobalSettings,

    #[serde(default)]
    pub scripts: Scripts,

    #[serde(default)]
    pub buttons: ButtonMap,

    #[serde(default)]
    pub axes: AxesConfig,

    /// Keys this crate does not interpret, preserved across save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Worker loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_update_rate", deserialize_with = "lenient::number_u32")]
    pub update_rate: u32,
}

/// Behavioral script settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scripts {
    #[serde(default)]
    pub winding_steering: WindingSteeringConfig,

    #[serde(default)]
    pub range_modifier: RangeModifierConfig,

    #[serde(default)]
    pub auto_clutch: AutoClutchConfig,
}

/// Stick that drives the winding script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindingSource {
    #[default]
    Disabled,
    LeftStick,
    RightStick,
}

impl WindingSource {
    /// Profile name of this source.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            WindingSource::Disabled => "Disabled",
            WindingSource::LeftStick => "Left Stick",
            WindingSource::RightStick => "Right Stick",
        }
    }
}

impl Serialize for WindingSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for WindingSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match &value {
            Value::Null => WindingSource::Disabled,
            Value::String(s) if s == "Disabled" => WindingSource::Disabled,
            Value::String(s) if s == "Left Stick" => WindingSource::LeftStick,
            Value::String(s) if s == "Right Stick" => WindingSource::RightStick,
            _ => {
                warn!("Unknown winding source {}, disabling winding", value);
                WindingSource::Disabled
            }
        })
    }
}

/// Winding-stick steering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindingSteeringConfig {
    #[serde(default)]
    pub enabled_for: WindingSource,

    #[serde(default = "default_winding_target", with = "slot_target")]
    pub target_axis: Option<OutputSlot>,

    /// Full lock-to-lock rotation in degrees.
    #[serde(default = "default_winding_range", deserialize_with = "lenient::number_f32")]
    pub range: f32,

    /// Extra degrees allowed past either lock.
    #[serde(default = "default_winding_buffer", deserialize_with = "lenient::number_f32")]
    pub buffer: f32,

    /// Return-to-center speed in degrees per second.
    #[serde(default = "default_winding_unwind", deserialize_with = "lenient::number_f32")]
    pub unwind: f32,
}

/// Range modifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeModifierConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_modifier_key", with = "button_name")]
    pub modifier_key: Option<LogicalButton>,

    /// Keep the modifier button itself from reaching the virtual device.
    #[serde(default)]
    pub mute_key: bool,

    #[serde(default = "default_modified_axis", with = "slot_target")]
    pub modified_axis: Option<OutputSlot>,

    #[serde(default = "default_press_mult", deserialize_with = "lenient::number_f32")]
    pub press_mult: f32,

    #[serde(default = "default_release_mult", deserialize_with = "lenient::number_f32")]
    pub release_mult: f32,
}

/// Auto-clutch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoClutchConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_upshift_btn", with = "button_name")]
    pub upshift_btn: Option<LogicalButton>,

    #[serde(default = "default_downshift_btn", with = "button_name")]
    pub downshift_btn: Option<LogicalButton>,

    #[serde(default = "default_throttle_axis", with = "slot_target")]
    pub throttle_axis: Option<OutputSlot>,

    #[serde(default = "default_clutch_axis", with = "slot_target")]
    pub clutch_axis: Option<OutputSlot>,

    /// Full throttle while downshifting.
    #[serde(default)]
    pub auto_blip: bool,

    /// Throttle cut while upshifting.
    #[serde(default)]
    pub auto_lift: bool,
}

/// Virtual button index per logical button, `None` when unmapped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonMap {
    #[serde(rename = "A", default, with = "button_target")]
    pub a: Option<u8>,
    #[serde(rename = "B", default, with = "button_target")]
    pub b: Option<u8>,
    #[serde(rename = "X", default, with = "button_target")]
    pub x: Option<u8>,
    #[serde(rename = "Y", default, with = "button_target")]
    pub y: Option<u8>,
    #[serde(rename = "LB", default, with = "button_target")]
    pub lb: Option<u8>,
    #[serde(rename = "RB", default, with = "button_target")]
    pub rb: Option<u8>,
    #[serde(rename = "Back", default, with = "button_target")]
    pub back: Option<u8>,
    #[serde(rename = "Start", default, with = "button_target")]
    pub start: Option<u8>,
    #[serde(rename = "LS_Click", default, with = "button_target")]
    pub ls_click: Option<u8>,
    #[serde(rename = "RS_Click", default, with = "button_target")]
    pub rs_click: Option<u8>,
    #[serde(rename = "DPad_Up", default, with = "button_target")]
    pub dpad_up: Option<u8>,
    #[serde(rename = "DPad_Down", default, with = "button_target")]
    pub dpad_down: Option<u8>,
    #[serde(rename = "DPad_Left", default, with = "button_target")]
    pub dpad_left: Option<u8>,
    #[serde(rename = "DPad_Right", default, with = "button_target")]
    pub dpad_right: Option<u8>,
}

impl ButtonMap {
    /// Returns the virtual button `button` is routed to.
    #[must_use]
    pub fn get(&self, button: LogicalButton) -> Option<u8> {
        *self.slot(button)
    }

    /// Routes `button` to a virtual button index, or unmaps it.
    pub fn set(&mut self, button: LogicalButton, target: Option<u8>) {
        *self.slot_mut(button) = target;
    }

    /// Iterates every logical button with its routing.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalButton, Option<u8>)> + '_ {
        LogicalButton::ALL
            .into_iter()
            .map(move |button| (button, self.get(button)))
    }

    fn slot(&self, button: LogicalButton) -> &Option<u8> {
        match button {
            LogicalButton::A => &self.a,
            LogicalButton::B => &self.b,
            LogicalButton::X => &self.x,
            LogicalButton::Y => &self.y,
            LogicalButton::LeftBumper => &self.lb,
            LogicalButton::RightBumper => &self.rb,
            LogicalButton::Back => &self.back,
            LogicalButton::Start => &self.start,
            LogicalButton::LeftStickClick => &self.ls_click,
            LogicalButton::RightStickClick => &self.rs_click,
            LogicalButton::DpadUp => &self.dpad_up,
            LogicalButton::DpadDown => &self.dpad_down,
            LogicalButton::DpadLeft => &self.dpad_left,
            LogicalButton::DpadRight => &self.dpad_right,
        }
    }

    fn slot_mut(&mut self, button: LogicalButton) -> &mut Option<u8> {
        match button {
            LogicalButton::A => &mut self.a,
            LogicalButton::B => &mut self.b,
            LogicalButton::X => &mut self.x,
            LogicalButton::Y => &mut self.y,
            LogicalButton::LeftBumper => &mut self.lb,
            LogicalButton::RightBumper => &mut self.rb,
            LogicalButton::Back => &mut self.back,
            LogicalButton::Start => &mut self.start,
            LogicalButton::LeftStickClick => &mut self.ls_click,
            LogicalButton::RightStickClick => &mut self.rs_click,
            LogicalButton::DpadUp => &mut self.dpad_up,
            LogicalButton::DpadDown => &mut self.dpad_down,
            LogicalButton::DpadLeft => &mut self.dpad_left,
            LogicalButton::DpadRight => &mut self.dpad_right,
        }
    }
}

/// Per-input axis channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesConfig {
    #[serde(rename = "LT")]
    pub lt: TriggerChannel,
    #[serde(rename = "RT")]
    pub rt: TriggerChannel,
    #[serde(rename = "LX")]
    pub lx: StickChannel,
    #[serde(rename = "LY")]
    pub ly: StickChannel,
    #[serde(rename = "RX")]
    pub rx: StickChannel,
    #[serde(rename = "RY")]
    pub ry: StickChannel,
}

/// Shaping and routing of one stick axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickChannel {
    #[serde(with = "slot_target")]
    pub target: Option<OutputSlot>,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub dz_in: f32,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub dz_out: f32,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub anti_dz: f32,
    #[serde(deserialize_with = "lenient::number_i32")]
    pub lin: i32,
    pub inv: bool,
    /// Circular-to-square remap; the X channel's flag applies to the whole stick.
    pub square: bool,
}

/// Shaping and routing of one trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerChannel {
    #[serde(with = "slot_target")]
    pub target: Option<OutputSlot>,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub dz_in: f32,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub dz_out: f32,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub start: f32,
    #[serde(deserialize_with = "lenient::number_f32")]
    pub end: f32,
    #[serde(deserialize_with = "lenient::number_i32")]
    pub lin: i32,
}

impl StickChannel {
    fn targeting(target: OutputSlot) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }
}

impl TriggerChannel {
    fn targeting(target: OutputSlot) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }
}

impl Default for StickChannel {
    fn default() -> Self {
        Self {
            target: None,
            dz_in: 0.0,
            dz_out: 0.0,
            anti_dz: 0.0,
            lin: 0,
            inv: false,
            square: false,
        }
    }
}

impl Default for TriggerChannel {
    fn default() -> Self {
        Self {
            target: None,
            dz_in: 0.0,
            dz_out: 0.0,
            start: -1.0,
            end: 1.0,
            lin: 0,
        }
    }
}

// Default value functions
fn default_update_rate() -> u32 { 1000 }

fn default_winding_target() -> Option<OutputSlot> { Some(OutputSlot::X) }
fn default_winding_range() -> f32 { 900.0 }
fn default_winding_buffer() -> f32 { 45.0 }
fn default_winding_unwind() -> f32 { 1800.0 }

fn default_modifier_key() -> Option<LogicalButton> { Some(LogicalButton::X) }
fn default_modified_axis() -> Option<OutputSlot> { Some(OutputSlot::X) }
fn default_press_mult() -> f32 { 1.0 }
fn default_release_mult() -> f32 { 0.5 }

fn default_upshift_btn() -> Option<LogicalButton> { Some(LogicalButton::RightBumper) }
fn default_downshift_btn() -> Option<LogicalButton> { Some(LogicalButton::LeftBumper) }
fn default_throttle_axis() -> Option<OutputSlot> { Some(OutputSlot::Rz) }
fn default_clutch_axis() -> Option<OutputSlot> { Some(OutputSlot::Ry) }

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            update_rate: default_update_rate(),
        }
    }
}

impl Default for WindingSteeringConfig {
    fn default() -> Self {
        Self {
            enabled_for: WindingSource::Disabled,
            target_axis: default_winding_target(),
            range: default_winding_range(),
            buffer: default_winding_buffer(),
            unwind: default_winding_unwind(),
        }
    }
}

impl Default for RangeModifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            modifier_key: default_modifier_key(),
            mute_key: false,
            modified_axis: default_modified_axis(),
            press_mult: default_press_mult(),
            release_mult: default_release_mult(),
        }
    }
}

impl Default for AutoClutchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            upshift_btn: default_upshift_btn(),
            downshift_btn: default_downshift_btn(),
            throttle_axis: default_throttle_axis(),
            clutch_axis: default_clutch_axis(),
            auto_blip: false,
            auto_lift: false,
        }
    }
}

impl Default for ButtonMap {
    /// Logical buttons in profile order on virtual buttons 1 to 14.
    fn default() -> Self {
        let mut map = Self {
            a: None,
            b: None,
            x: None,
            y: None,
            lb: None,
            rb: None,
            back: None,
            start: None,
            ls_click: None,
            rs_click: None,
            dpad_up: None,
            dpad_down: None,
            dpad_left: None,
            dpad_right: None,
        };
        for (index, button) in (1u8..).zip(LogicalButton::ALL) {
            map.set(button, Some(index));
        }
        map
    }
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            lt: TriggerChannel::targeting(OutputSlot::Z),
            rt: TriggerChannel::targeting(OutputSlot::Rz),
            lx: StickChannel::targeting(OutputSlot::X),
            ly: StickChannel::targeting(OutputSlot::Y),
            rx: StickChannel::targeting(OutputSlot::Rx),
            ry: StickChannel::targeting(OutputSlot::Ry),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            global_settings: GlobalSettings::default(),
            scripts: Scripts::default(),
            buttons: ButtonMap::default(),
            axes: AxesConfig::default(),
            extra: Map::new(),
        }
    }
}

impl Profile {
    /// Load a profile from a JSON (or `.toml`) file
    ///
    /// A missing file yields the default profile.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File exists but cannot be read
    /// - The file is not valid JSON / TOML
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pad_bridge::config::Profile;
    ///
    /// let profile = Profile::load("mapping_profile.json")?;
    /// println!("Polling at {} Hz", profile.global_settings.update_rate);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Profile {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let loaded: Value = if is_toml(path) {
            toml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };

        let profile = Self::from_value(loaded)?;
        info!("Loaded profile from {}", path.display());
        Ok(profile)
    }

    /// Load a profile, falling back to defaults on any error.
    #[must_use]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            warn!("Could not load profile {}: {}, using defaults", path.display(), e);
            Self::default()
        })
    }

    /// Build a profile by merging `loaded` onto the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `loaded` is not an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::config::Profile;
    /// use serde_json::json;
    ///
    /// let profile = Profile::from_value(json!({
    ///     "global_settings": { "update_rate": 500 },
    ///     "axes": { "LX": { "dz_in": 0.1 } }
    /// }))?;
    ///
    /// assert_eq!(profile.global_settings.update_rate, 500);
    /// assert_eq!(profile.axes.lx.dz_in, 0.1);
    /// // Untouched fields keep their defaults
    /// assert_eq!(profile.axes.ly.dz_in, 0.0);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_value(loaded: Value) -> Result<Self> {
        if !loaded.is_object() {
            return Err(PadBridgeError::Config(format!(
                "profile root must be an object, found {}",
                value_kind(&loaded)
            )));
        }

        let mut merged = serde_json::to_value(Self::default())?;
        merge_value(&mut merged, loaded, "");

        let mut profile: Profile = serde_json::from_value(merged)?;
        profile.sanitize();
        Ok(profile)
    }

    /// Save the profile as pretty JSON (or TOML for `.toml` paths).
    ///
    /// TOML cannot express `null`: null values inside preserved foreign keys
    /// are left out of a TOML save.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = if is_toml(path) {
            let mut profile = self.clone();
            profile.extra.retain(|key, value| {
                let keep = drop_nulls(value);
                if !keep {
                    warn!("TOML has no null, dropping preserved key '{}'", key);
                }
                keep
            });
            toml::to_string_pretty(&profile)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        fs::write(path, contents)?;
        info!("Profile saved to {}", path.display());
        Ok(())
    }

    /// Restore every setting to its default. Preserved foreign keys are dropped too.
    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }

    /// Unmap every button and every axis channel.
    pub fn unmap_all(&mut self) {
        for button in LogicalButton::ALL {
            self.buttons.set(button, None);
        }
        self.axes.lt.target = None;
        self.axes.rt.target = None;
        self.axes.lx.target = None;
        self.axes.ly.target = None;
        self.axes.rx.target = None;
        self.axes.ry.target = None;
    }

    /// Worker period derived from `update_rate`.
    #[must_use]
    pub fn update_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.global_settings.update_rate.max(1)))
    }

    /// Clamp values into the ranges the transform expects
    ///
    /// Out-of-range values are clamped (or reset to their default) with a
    /// warning instead of rejecting the whole profile.
    pub fn sanitize(&mut self) {
        let rate = &mut self.global_settings.update_rate;
        let clamped = (*rate).clamp(UPDATE_RATE_MIN, UPDATE_RATE_MAX);
        if clamped != *rate {
            warn!(
                "update_rate {} out of range, clamped to {}",
                rate, clamped
            );
            *rate = clamped;
        }

        for (name, channel) in [
            ("LX", &mut self.axes.lx),
            ("LY", &mut self.axes.ly),
            ("RX", &mut self.axes.rx),
            ("RY", &mut self.axes.ry),
        ] {
            clamp_field(name, "dz_in", &mut channel.dz_in, 0.0, 0.5);
            clamp_field(name, "dz_out", &mut channel.dz_out, 0.0, 0.5);
            clamp_field(name, "anti_dz", &mut channel.anti_dz, 0.0, 0.5);
            clamp_linearity(name, &mut channel.lin);
        }

        for (name, channel) in [("LT", &mut self.axes.lt), ("RT", &mut self.axes.rt)] {
            clamp_field(name, "dz_in", &mut channel.dz_in, 0.0, 0.5);
            clamp_field(name, "dz_out", &mut channel.dz_out, 0.0, 0.5);
            clamp_field(name, "start", &mut channel.start, -1.0, 1.0);
            clamp_field(name, "end", &mut channel.end, -1.0, 1.0);
            clamp_linearity(name, &mut channel.lin);
        }

        let winding = &mut self.scripts.winding_steering;
        if !(winding.range > 0.0) {
            warn!(
                "winding_steering range {} must be positive, using {}",
                winding.range,
                default_winding_range()
            );
            winding.range = default_winding_range();
        }
        clamp_field("winding_steering", "buffer", &mut winding.buffer, 0.0, f32::MAX);
        clamp_field("winding_steering", "unwind", &mut winding.unwind, 0.0, f32::MAX);
    }
}

fn clamp_field(section: &str, field: &str, value: &mut f32, min: f32, max: f32) {
    let clamped = value.clamp(min, max);
    if clamped != *value {
        warn!("{}.{} = {} out of range, clamped to {}", section, field, value, clamped);
        *value = clamped;
    }
}

fn clamp_linearity(section: &str, lin: &mut i32) {
    let clamped = (*lin).clamp(-100, 100);
    if clamped != *lin {
        warn!("{}.lin = {} out of range, clamped to {}", section, lin, clamped);
        *lin = clamped;
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remove nulls nested in `value`. Returns false if `value` itself is null.
fn drop_nulls(value: &mut Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => {
            map.retain(|_, v| drop_nulls(v));
            true
        }
        Value::Array(items) => {
            items.retain_mut(drop_nulls);
            true
        }
        _ => true,
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Deep-merge `incoming` onto `base`, keeping `base` where types disagree.
fn merge_value(base: &mut Value, incoming: Value, path: &str) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                match base_map.get_mut(&key) {
                    Some(existing) => merge_value(existing, value, &child_path),
                    None => {
                        debug!("Keeping unknown profile key {}", child_path);
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, incoming) => match merge_leaf(base, incoming, path) {
            Some(value) => *base = value,
            None => warn!("Profile value at '{}' has the wrong type, keeping default", path),
        },
    }
}

/// Returns the value to store for a leaf, or `None` to keep the default.
fn merge_leaf(base: &Value, incoming: Value, path: &str) -> Option<Value> {
    let unmappable = path.starts_with("buttons.");
    match (base, incoming) {
        (Value::Object(_), _) => None,
        (Value::Null, value) => Some(value),
        (Value::Bool(_), value @ Value::Bool(_)) => Some(value),
        (Value::Number(_), value @ Value::Number(_)) => Some(value),
        (Value::Number(_), Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) => serde_json::Number::from_f64(n).map(Value::Number),
            Err(_) if unmappable && s == UNMAPPED => Some(Value::String(s)),
            Err(_) => None,
        },
        (Value::Number(_), Value::Null) if unmappable => Some(Value::Null),
        (Value::String(_), value @ (Value::String(_) | Value::Null)) => Some(value),
        _ => None,
    }
}

/// Deserializers that accept numbers written as strings.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn expect_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        number(&value)
            .filter(|n| n.is_finite())
            .ok_or_else(|| D::Error::custom(format!("expected a number, got {}", value)))
    }

    pub fn number_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        expect_number(deserializer).map(|n| n as f32)
    }

    pub fn number_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        expect_number(deserializer).map(|n| n.round() as i32)
    }

    /// Negative values become 0.
    pub fn number_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        expect_number(deserializer).map(|n| n.max(0.0).round() as u32)
    }
}

/// Output slot name or `"None"`.
mod slot_target {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use tracing::warn;

    use super::UNMAPPED;
    use crate::mapping::slots::OutputSlot;

    pub fn serialize<S: Serializer>(target: &Option<OutputSlot>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(target.map_or(UNMAPPED, OutputSlot::name))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<OutputSlot>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) if s == UNMAPPED => None,
            Value::String(s) => s
                .parse()
                .map_err(|e| warn!("{}, leaving it unmapped", e))
                .ok(),
            other => {
                warn!("Output axis {} is not a name, leaving it unmapped", other);
                None
            }
        })
    }
}

/// Logical button name or `"None"`.
mod button_name {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use tracing::warn;

    use super::UNMAPPED;
    use crate::controller::sample::LogicalButton;

    pub fn serialize<S: Serializer>(button: &Option<LogicalButton>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(button.map_or(UNMAPPED, LogicalButton::name))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<LogicalButton>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) if s == UNMAPPED => None,
            Value::String(s) => s
                .parse()
                .map_err(|e| warn!("{}, script will never see it pressed", e))
                .ok(),
            other => {
                warn!("Logical button {} is not a name, ignoring it", other);
                None
            }
        })
    }
}

/// Virtual button index `1..=128` or `"None"`.
mod button_target {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use tracing::warn;

    use super::{UNMAPPED, VIRTUAL_BUTTON_MAX};

    pub fn serialize<S: Serializer>(target: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        match target {
            Some(index) => serializer.serialize_u8(*index),
            None => serializer.serialize_str(UNMAPPED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let index = match &value {
            Value::Null => return Ok(None),
            Value::String(s) if s == UNMAPPED => return Ok(None),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match index {
            Some(i) if i.fract() == 0.0 && (1.0..=f64::from(VIRTUAL_BUTTON_MAX)).contains(&i) => {
                Ok(Some(i as u8))
            }
            _ => {
                warn!(
                    "Virtual button {} outside 1..={}, leaving it unmapped",
                    value, VIRTUAL_BUTTON_MAX
                );
                Ok(None)
            }
        }
    }
}
