//! # PS5 DualSense Controller Module
//!
//! This module handles PS5 DualSense controller detection, connection, and input reading
//! using the Linux evdev interface.
//!
//! ## Controller Detection
//!
//! The DualSense controller is identified by:
//! - Vendor ID: 0x054c (Sony)
//! - Product ID: 0x0ce6 (DualSense, both wired and Bluetooth)
//!
//! The kernel exposes a gamepad node, a touchpad node and a motion sensor
//! node with those IDs. Only the gamepad node (face buttons plus a right
//! stick) is opened. Nodes are ordered by event number; port N is the N-th
//! controller found.
//!
//! ## Reading
//!
//! `fetch_events` blocks, so each controller gets a reader thread that folds
//! events through an [`EventMapper`] and publishes the latest [`RawSample`].
//! [`SampleSource::poll`] only copies that sample and never blocks.

use evdev::{AbsoluteAxisType, AttributeSetRef, Device, Key};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

use super::mapper::EventMapper;
use super::sample::RawSample;
use super::source::{SampleSource, MAX_PORTS};
use crate::error::{PadBridgeError, Result};

/// PS5 DualSense vendor ID (Sony)
const DUALSENSE_VENDOR_ID: u16 = 0x054c;

/// PS5 DualSense product ID (wired and Bluetooth)
const DUALSENSE_PRODUCT_ID: u16 = 0x0ce6;

/// Directory scanned for event devices
const INPUT_DIR: &str = "/dev/input";

/// Returns true for a Sony DualSense vendor/product pair.
#[must_use]
pub fn is_dualsense(vendor: u16, product: u16) -> bool {
    vendor == DUALSENSE_VENDOR_ID && product == DUALSENSE_PRODUCT_ID
}

/// Returns true for the gamepad node of a DualSense.
///
/// The touchpad node reports `BTN_LEFT`/`BTN_TOUCH` and the motion sensor
/// node reports accelerometer axes; neither has `BTN_SOUTH` and `ABS_RX`.
#[must_use]
pub fn is_gamepad_node(
    keys: Option<&AttributeSetRef<Key>>,
    axes: Option<&AttributeSetRef<AbsoluteAxisType>>,
) -> bool {
    keys.is_some_and(|keys| keys.contains(Key::BTN_SOUTH))
        && axes.is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_RX))
}

/// Number in an `eventN` file name.
fn event_index(path: &Path) -> Option<u32> {
    path.file_name()?.to_str()?.strip_prefix("event")?.parse().ok()
}

/// Latest state published by a reader thread
#[derive(Debug, Default)]
struct PortState {
    sample: RawSample,
    connected: bool,
}

/// One opened controller
struct Port {
    path: PathBuf,
    name: String,
    state: Arc<Mutex<PortState>>,
    /// Last connection state reported by `poll`, for transition logging.
    was_connected: bool,
}

/// All connected PS5 DualSense controllers
///
/// # Examples
///
/// ```no_run
/// use pad_bridge::controller::ps5::DualSenseSource;
/// use pad_bridge::controller::source::SampleSource;
///
/// let mut source = DualSenseSource::open()?;
/// if let Some(sample) = source.poll(0) {
///     println!("Left stick X: {}", sample.left_x);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DualSenseSource {
    ports: Vec<Port>,
    shutdown: Arc<AtomicBool>,
}

impl DualSenseSource {
    /// Detect and open every available PS5 DualSense controller
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: No DualSense controller found on the system
    /// - `Controller`: `/dev/input` is missing or unreadable
    /// - `Io`: A reader thread could not be spawned
    pub fn open() -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut ports = Vec::new();

        for (path, device) in scan_dualsense_devices(Path::new(INPUT_DIR))? {
            if ports.len() == MAX_PORTS {
                warn!("Ignoring controller at {}: only {} ports", path.display(), MAX_PORTS);
                continue;
            }

            let name = device.name().unwrap_or("DualSense").to_string();
            let state = Arc::new(Mutex::new(PortState {
                sample: RawSample::default(),
                connected: true,
            }));

            let port = ports.len();
            spawn_reader(port, device, Arc::clone(&state), Arc::clone(&shutdown))?;
            debug!("Started reader for port {}", port);

            ports.push(Port {
                path,
                name,
                state,
                was_connected: true,
            });
        }

        if ports.is_empty() {
            return Err(PadBridgeError::ControllerNotFound);
        }
        Ok(Self { ports, shutdown })
    }

    /// Number of opened controllers.
    #[must_use]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Device path and name of each port.
    pub fn describe(&self) -> impl Iterator<Item = (usize, &Path, &str)> + '_ {
        self.ports
            .iter()
            .enumerate()
            .map(|(i, port)| (i, port.path.as_path(), port.name.as_str()))
    }
}

impl SampleSource for DualSenseSource {
    fn poll(&mut self, port: usize) -> Option<RawSample> {
        let entry = self.ports.get_mut(port)?;
        let (sample, connected) = match entry.state.lock() {
            Ok(state) => (state.sample, state.connected),
            Err(_) => (RawSample::default(), false),
        };

        if connected != entry.was_connected {
            if connected {
                info!("Controller on port {} reconnected", port);
            } else {
                warn!("Controller on port {} disconnected", port);
            }
            entry.was_connected = connected;
        }

        connected.then_some(sample)
    }
}

impl Drop for DualSenseSource {
    fn drop(&mut self) {
        // Readers notice on their next event; a silent device keeps its thread parked
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Open every DualSense gamepad node under `input_dir`, ordered by event number.
fn scan_dualsense_devices(input_dir: &Path) -> Result<Vec<(PathBuf, Device)>> {
    if !input_dir.exists() {
        return Err(PadBridgeError::Controller(format!(
            "{} directory not found",
            input_dir.display()
        )));
    }

    let entries = std::fs::read_dir(input_dir)
        .map_err(|e| PadBridgeError::Controller(format!("Failed to read {}: {}", input_dir.display(), e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PadBridgeError::Controller(format!("Failed to read directory entry: {}", e)))?;

    let mut nodes: Vec<PathBuf> = entries.into_iter().map(|entry| entry.path()).collect();
    sort_event_nodes(&mut nodes);

    let mut found = Vec::new();
    for path in nodes {
        match Device::open(&path) {
            Ok(device) => {
                let id = device.input_id();
                debug!(
                    "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                    path.display(),
                    id.vendor(),
                    id.product()
                );

                if is_dualsense(id.vendor(), id.product())
                    && is_gamepad_node(device.supported_keys(), device.supported_absolute_axes())
                {
                    found.push((path, device));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Ok(found)
}

/// Keep `eventN` nodes only, ordered by `N` so `event10` follows `event9`.
fn sort_event_nodes(nodes: &mut Vec<PathBuf>) {
    nodes.retain(|path| event_index(path).is_some());
    nodes.sort_by_key(|path| event_index(path));
}

fn spawn_reader(
    port: usize,
    mut device: Device,
    state: Arc<Mutex<PortState>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    thread::Builder::new()
        .name(format!("dualsense-{}", port))
        .spawn(move || {
            let mut mapper = EventMapper::new();
            while !shutdown.load(Ordering::Relaxed) {
                match device.fetch_events() {
                    Ok(events) => {
                        for event in events {
                            mapper.process_event(&event);
                        }
                        if let Ok(mut shared) = state.lock() {
                            shared.sample = mapper.sample();
                        }
                    }
                    Err(e) => {
                        debug!("Reader for port {} stopped: {}", port, e);
                        mapper.reset();
                        if let Ok(mut shared) = state.lock() {
                            shared.sample = mapper.sample();
                            shared.connected = false;
                        }
                        break;
                    }
                }
            }
        })?;
    Ok(())
}
