//! # Mapping Worker
//!
//! The polling loop: poll the controller, transform, write the virtual
//! joystick, publish the frame, sleep until the next period.
//!
//! ## Control Flow
//!
//! 1. **Per cycle**
//!    - Measure `dt` since the previous cycle start
//!    - Take one profile snapshot
//!    - Skip the transform if the controller is disconnected (the last
//!      published frame stays visible and goes stale)
//!    - Write to the sink if one is present (demo mode runs without)
//!    - Sleep until the next `1/update_rate` deadline on a dedicated
//!      thread, checking the cancellation token once per cycle
//!
//! 2. **Shutdown**
//!    - Center all axes and release all mapped buttons
//!    - Return cycle statistics

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::shared::{FrameObserver, FramePublisher};
use crate::config::Profile;
use crate::controller::source::SampleSource;
use crate::device::VirtualDevice;
use crate::mapping::engine::{buttons_beyond, MappingEngine};
use crate::mapping::frame::OutputFrame;

/// Number of cycles between status log messages
pub const LOG_INTERVAL_CYCLES: u64 = 1000;

/// Counters returned when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Loop iterations run.
    pub cycles: u64,
    /// Frames published.
    pub frames: u64,
    /// Cycles skipped because the controller was unavailable.
    pub skipped: u64,
    /// Cycles where at least one sink write failed.
    pub write_errors: u64,
}

/// Owns the engine, the source and the sink for the lifetime of one run
///
/// # Examples
///
/// ```no_run
/// use pad_bridge::config::Profile;
/// use pad_bridge::controller::ps5::DualSenseSource;
/// use pad_bridge::device::uinput::{UinputJoystick, DEVICE_NAME};
/// use pad_bridge::runtime::{MappingWorker, ProfileHandle};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let profile = ProfileHandle::new(Profile::default());
/// let source = DualSenseSource::open()?;
/// let sink = UinputJoystick::create(DEVICE_NAME)?;
///
/// let worker = MappingWorker::new(source, 0, Some(sink), profile.subscribe());
/// let observer = worker.observer();
///
/// let cancel = CancellationToken::new();
/// let stats = worker.run(cancel.clone()).await;
/// println!("Ran {} cycles", stats.cycles);
/// # Ok(())
/// # }
/// ```
pub struct MappingWorker<S, D> {
    source: S,
    port: usize,
    sink: Option<D>,
    profile: watch::Receiver<Arc<Profile>>,
    publisher: FramePublisher,
    engine: MappingEngine,
    /// Last profile checked against the sink's button count.
    checked_profile: Option<Arc<Profile>>,
    connected: bool,
    stats: WorkerStats,
}

impl<S, D> MappingWorker<S, D>
where
    S: SampleSource,
    D: VirtualDevice,
{
    /// Create a worker reading controller `port`.
    ///
    /// Pass `None` as `sink` to run without a virtual joystick.
    pub fn new(
        source: S,
        port: usize,
        sink: Option<D>,
        profile: watch::Receiver<Arc<Profile>>,
    ) -> Self {
        let (publisher, _) = super::shared::frame_channel();
        Self {
            source,
            port,
            sink,
            profile,
            publisher,
            engine: MappingEngine::new(),
            checked_profile: None,
            connected: true,
            stats: WorkerStats::default(),
        }
    }

    /// Observer of the frames this worker publishes.
    #[must_use]
    pub fn observer(&self) -> FrameObserver {
        self.publisher.observer()
    }

    /// Run until `cancel` fires, then release the virtual joystick.
    ///
    /// The loop runs on a blocking thread and paces itself with
    /// `std::thread::sleep`, which is not limited to the 1ms timer
    /// granularity of the runtime. Returns default stats if the loop panicked.
    pub async fn run(self, cancel: CancellationToken) -> WorkerStats
    where
        S: 'static,
        D: 'static,
    {
        match tokio::task::spawn_blocking(move || self.run_blocking(&cancel)).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Mapping loop terminated abnormally: {}", e);
                WorkerStats::default()
            }
        }
    }

    /// The polling loop, paced against absolute deadlines.
    ///
    /// A cycle that overruns its period starts the next one immediately
    /// and resets the schedule; missed cycles are never made up.
    pub fn run_blocking(mut self, cancel: &CancellationToken) -> WorkerStats {
        info!(
            "Starting mapping loop on port {} at {}Hz{}",
            self.port,
            self.profile.borrow().global_settings.update_rate,
            if self.sink.is_some() { "" } else { " (demo mode, no virtual joystick)" }
        );

        let mut last_cycle = Instant::now();
        let mut deadline = last_cycle;
        while !cancel.is_cancelled() {
            let started = Instant::now();
            let dt = started.duration_since(last_cycle).as_secs_f32();
            last_cycle = started;

            let profile = Arc::clone(&self.profile.borrow_and_update());
            self.check_button_limit(&profile);
            self.cycle(&profile, dt);

            deadline = next_deadline(deadline, profile.update_period(), Instant::now());
            if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }

        self.shutdown();
        self.stats
    }

    /// Warn once per profile about buttons the sink cannot show.
    ///
    /// Returns the number of buttons warned about.
    fn check_button_limit(&mut self, profile: &Arc<Profile>) -> usize {
        let Some(sink) = self.sink.as_ref() else {
            return 0;
        };
        if self.checked_profile.as_ref().is_some_and(|checked| Arc::ptr_eq(checked, profile)) {
            return 0;
        }
        self.checked_profile = Some(Arc::clone(profile));

        let limit = sink.button_count();
        let beyond = buttons_beyond(&profile.buttons, limit);
        for (button, index) in &beyond {
            warn!(
                "{} is mapped to virtual button {} but the virtual joystick has {} buttons, it will not be sent",
                button.name(),
                index,
                limit
            );
        }
        beyond.len()
    }

    /// One poll, transform, write, publish pass.
    fn cycle(&mut self, profile: &Profile, dt: f32) {
        self.stats.cycles += 1;

        let Some(sample) = self.source.poll(self.port) else {
            if self.connected {
                warn!("Controller on port {} unavailable, holding last frame", self.port);
                self.connected = false;
            }
            self.stats.skipped += 1;
            return;
        };
        if !self.connected {
            info!("Controller on port {} available again", self.port);
            self.connected = true;
        }

        let frame = self.engine.process(&sample, profile, dt);

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = MappingEngine::drive(&frame, profile, sink) {
                debug!("Failed to write virtual joystick: {}", e);
                self.stats.write_errors += 1;
            }
        }

        if self.stats.cycles % LOG_INTERVAL_CYCLES == 0 {
            log_status(self.stats.cycles, &frame);
        }

        self.publisher.publish(frame);
        self.stats.frames += 1;
    }

    fn shutdown(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let profile = self.profile.borrow();
            match MappingEngine::reset_device(sink, &profile) {
                Ok(()) => info!("Virtual joystick released"),
                Err(e) => warn!("Failed to release virtual joystick: {}", e),
            }
        }
        info!(
            "Mapping loop stopped after {} cycles ({} frames, {} skipped, {} write errors)",
            self.stats.cycles, self.stats.frames, self.stats.skipped, self.stats.write_errors
        );
    }
}

/// Deadline of the cycle after the one due at `previous`.
///
/// Falls back to `now` when more than a whole period behind.
fn next_deadline(previous: Instant, period: Duration, now: Instant) -> Instant {
    let next = previous + period;
    if next + period < now {
        now
    } else {
        next
    }
}

fn log_status(cycles: u64, frame: &OutputFrame) {
    let axes: Vec<String> = frame
        .axes
        .iter()
        .map(|(slot, value)| format!("{}={:+.3}", slot, value))
        .collect();
    info!(
        "{} cycles | axes [{}] | buttons {:?}",
        cycles,
        axes.join(" "),
        frame.buttons
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::sample::{LogicalButton, RawSample};
    use crate::controller::source::MockSampleSource;
    use crate::device::mocks::RecordingDevice;
    use crate::device::{encode_axis, AXIS_CENTER};
    use crate::mapping::slots::OutputSlot;
    use crate::runtime::shared::ProfileHandle;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn steady_source(sample: RawSample) -> MockSampleSource {
        let mut source = MockSampleSource::new();
        source.expect_poll().returning(move |_| Some(sample));
        source
    }

    // ==================== Cycle Tests ====================

    #[tokio::test]
    async fn test_publishes_frames_and_writes_sink() {
        let profile = ProfileHandle::new(Profile::default());
        let sample = RawSample {
            left_x: i16::MIN,
            ..RawSample::default()
        };
        let sink = RecordingDevice::new();
        let worker = MappingWorker::new(steady_source(sample), 0, Some(sink.clone()), profile.subscribe());
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let published = timeout(WAIT, observer.changed()).await.unwrap().unwrap();
        assert!(published.sequence >= 1);
        assert_eq!(published.frame.axis(OutputSlot::X), Some(-1.0));
        assert_eq!(sink.axis(OutputSlot::X), Some(encode_axis(-1.0)));

        cancel.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(stats.frames >= 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.write_errors, 0);
    }

    #[tokio::test]
    async fn test_stop_centers_axes_and_releases_buttons() {
        let profile = ProfileHandle::new(Profile::default());
        let mut sample = RawSample {
            right_trigger: 255,
            ..RawSample::default()
        };
        sample.press(LogicalButton::A);

        let sink = RecordingDevice::new();
        let worker = MappingWorker::new(steady_source(sample), 0, Some(sink.clone()), profile.subscribe());
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        timeout(WAIT, observer.changed()).await.unwrap().unwrap();
        assert_eq!(sink.button(1), Some(true));

        cancel.cancel();
        timeout(WAIT, handle).await.unwrap().unwrap();

        let state = sink.state();
        assert!(state.axes.values().all(|&v| v == AXIS_CENTER));
        assert_eq!(state.axes.len(), 8);
        assert!(state.buttons.values().all(|&pressed| !pressed));
    }

    #[tokio::test]
    async fn test_demo_mode_still_publishes() {
        let profile = ProfileHandle::new(Profile::default());
        let worker: MappingWorker<_, RecordingDevice> =
            MappingWorker::new(steady_source(RawSample::default()), 0, None, profile.subscribe());
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let published = timeout(WAIT, observer.changed()).await.unwrap().unwrap();
        assert_eq!(published.frame.axis(OutputSlot::Y), Some(0.0));

        cancel.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(stats.write_errors, 0);
    }

    #[tokio::test]
    async fn test_disconnected_controller_skips_cycles() {
        let profile = ProfileHandle::new(Profile::default());
        let mut source = MockSampleSource::new();
        source.expect_poll().returning(|_| None);

        let sink = RecordingDevice::new();
        let worker = MappingWorker::new(source, 2, Some(sink.clone()), profile.subscribe());
        let observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();

        assert!(stats.skipped >= 1);
        assert_eq!(stats.frames, 0);
        assert!(observer.latest().is_none());
        assert!(observer.is_stale(Duration::from_secs(60)));
        // Released on stop even though no frame was ever written
        assert_eq!(sink.axis(OutputSlot::Sl1), Some(AXIS_CENTER));
    }

    #[tokio::test]
    async fn test_reconnect_resumes_publishing() {
        let profile = ProfileHandle::new(Profile::default());
        let connected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&connected);

        let mut source = MockSampleSource::new();
        source
            .expect_poll()
            .returning(move |_| flag.load(Ordering::Relaxed).then(RawSample::default));

        let worker: MappingWorker<_, RecordingDevice> =
            MappingWorker::new(source, 0, None, profile.subscribe());
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(observer.latest().is_none());

        connected.store(true, Ordering::Relaxed);
        let published = timeout(WAIT, observer.changed()).await.unwrap();
        assert!(published.is_some());

        cancel.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(stats.skipped >= 1);
        assert!(stats.frames >= 1);
    }

    #[tokio::test]
    async fn test_sink_errors_do_not_stop_worker() {
        let profile = ProfileHandle::new(Profile::default());
        let sink = RecordingDevice::new();
        sink.set_fail_writes(true);

        let worker = MappingWorker::new(
            steady_source(RawSample::default()),
            0,
            Some(sink.clone()),
            profile.subscribe(),
        );
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        timeout(WAIT, observer.changed()).await.unwrap().unwrap();
        timeout(WAIT, observer.changed()).await.unwrap().unwrap();

        cancel.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(stats.write_errors >= 2);
        assert_eq!(stats.write_errors, stats.frames);
    }

    #[tokio::test]
    async fn test_profile_update_lands_next_cycle() {
        let profile = ProfileHandle::new(Profile::default());
        let worker: MappingWorker<_, RecordingDevice> = MappingWorker::new(
            steady_source(RawSample::default()),
            0,
            None,
            profile.subscribe(),
        );
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        let first = timeout(WAIT, observer.changed()).await.unwrap().unwrap();
        assert_eq!(first.frame.axes.len(), 6);

        profile.update(Profile::unmap_all);

        // The cycle in flight may still use the old snapshot
        let mut latest = first;
        for _ in 0..5 {
            latest = timeout(WAIT, observer.changed()).await.unwrap().unwrap();
            if latest.frame.axes.is_empty() {
                break;
            }
        }
        assert!(latest.frame.axes.is_empty());

        cancel.cancel();
        timeout(WAIT, handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let profile = ProfileHandle::new(Profile::default());
        let sink = RecordingDevice::new();
        let worker = MappingWorker::new(
            steady_source(RawSample::default()),
            0,
            Some(sink.clone()),
            profile.subscribe(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = worker.run(cancel).await;

        assert_eq!(stats, WorkerStats::default());
        assert_eq!(sink.state().commits, 1);
    }

    #[test]
    fn test_runs_on_current_thread_runtime() {
        let profile = ProfileHandle::new(Profile::default());
        let worker: MappingWorker<_, RecordingDevice> = MappingWorker::new(
            steady_source(RawSample::default()),
            0,
            None,
            profile.subscribe(),
        );
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();

        let stats = tokio_test::block_on(async move {
            let run = tokio::spawn(worker.run(cancel));
            tokio::time::sleep(Duration::from_millis(10)).await;
            stopper.cancel();
            run.await
        });
        tokio_test::assert_ok!(stats);
    }

    #[test]
    fn test_warns_once_per_profile_about_missing_buttons() {
        let profile = ProfileHandle::new(Profile::default());
        profile.update(|p| p.buttons.set(LogicalButton::A, Some(100)));
        let sink = RecordingDevice::new();
        sink.set_button_count(56);
        let mut worker = MappingWorker::new(
            steady_source(RawSample::default()),
            0,
            Some(sink),
            profile.subscribe(),
        );

        let snapshot = profile.snapshot();
        assert_eq!(worker.check_button_limit(&snapshot), 1);
        assert_eq!(worker.check_button_limit(&snapshot), 0);

        profile.update(|p| p.buttons.set(LogicalButton::B, Some(57)));
        assert_eq!(worker.check_button_limit(&profile.snapshot()), 2);
    }

    #[tokio::test]
    async fn test_buttons_past_device_limit_are_not_errors() {
        let profile = ProfileHandle::new(Profile::default());
        profile.update(|p| p.buttons.set(LogicalButton::A, Some(100)));
        let mut sample = RawSample::default();
        sample.press(LogicalButton::A);

        let sink = RecordingDevice::new();
        sink.set_button_count(56);
        let worker = MappingWorker::new(steady_source(sample), 0, Some(sink.clone()), profile.subscribe());
        let mut observer = worker.observer();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        let published = timeout(WAIT, observer.changed()).await.unwrap().unwrap();
        assert!(published.frame.is_button_pressed(100));

        cancel.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(stats.write_errors, 0);
        assert_eq!(sink.button(100), None);
    }

    // ==================== Pacing Tests ====================

    #[tokio::test]
    async fn test_holds_configured_rate() {
        let profile = ProfileHandle::new(Profile::default());
        profile.update(|p| p.global_settings.update_rate = 1000);
        let worker: MappingWorker<_, RecordingDevice> = MappingWorker::new(
            steady_source(RawSample::default()),
            0,
            None,
            profile.subscribe(),
        );

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let started = Instant::now();
        let handle = tokio::spawn(worker.run(cancel));

        tokio::time::sleep(Duration::from_millis(500)).await;
        stopper.cancel();
        let stats = timeout(WAIT, handle).await.unwrap().unwrap();
        let expected = started.elapsed().as_secs_f64() * 1000.0;

        assert!(
            stats.cycles as f64 > expected * 0.8,
            "{} cycles in {:.0} expected",
            stats.cycles,
            expected
        );
        assert!(stats.cycles as f64 <= expected + 5.0, "no catch-up bursts");
    }

    #[test]
    fn test_next_deadline_advances_by_period() {
        let start = Instant::now();
        let period = Duration::from_millis(1);

        let next = next_deadline(start, period, start + Duration::from_micros(300));
        assert_eq!(next, start + period);
    }

    #[test]
    fn test_next_deadline_absorbs_small_overrun() {
        let start = Instant::now();
        let period = Duration::from_millis(1);

        // One late cycle is made up by the next shorter wait
        let now = start + Duration::from_micros(1500);
        assert_eq!(next_deadline(start, period, now), start + period);
    }

    #[test]
    fn test_next_deadline_resets_when_far_behind() {
        let start = Instant::now();
        let period = Duration::from_millis(1);

        let now = start + Duration::from_millis(10);
        assert_eq!(next_deadline(start, period, now), now);
    }

    #[test]
    fn test_log_interval_constant() {
        assert_eq!(LOG_INTERVAL_CYCLES, 1000);

        // At the default 1000Hz, 1000 cycles = 1 second
        let seconds = LOG_INTERVAL_CYCLES as f64 / 1000.0;
        assert_eq!(seconds, 1.0);
    }
}
