//! Trait abstraction for controller polling to enable testing

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::sample::RawSample;

/// Highest number of controller ports scanned.
pub const MAX_PORTS: usize = 4;

/// Interval between polls while waiting for a button press.
pub const DETECT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source of raw controller samples
#[cfg_attr(test, mockall::automock)]
pub trait SampleSource: Send {
    /// Latest sample of controller `port`, `None` if it is not connected.
    ///
    /// Never blocks.
    fn poll(&mut self, port: usize) -> Option<RawSample>;
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn poll(&mut self, port: usize) -> Option<RawSample> {
        (**self).poll(port)
    }
}

/// Wait until a controller on ports `0..ports` presses any button.
///
/// Returns the first such port, or `None` once `timeout` elapses.
pub async fn detect_active_port<S>(source: &mut S, ports: usize, timeout: Duration) -> Option<usize>
where
    S: SampleSource + ?Sized,
{
    info!("Press any button on the controller to use ({:?})...", timeout);
    let deadline = Instant::now() + timeout;

    loop {
        for port in 0..ports {
            if source.poll(port).is_some_and(|sample| sample.any_button_pressed()) {
                info!("Using controller on port {}", port);
                return Some(port);
            }
        }

        if Instant::now() >= deadline {
            debug!("No button press within {:?}", timeout);
            return None;
        }
        tokio::time::sleep(DETECT_POLL_INTERVAL).await;
    }
}
