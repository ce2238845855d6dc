//! # Shared State
//!
//! Cross-thread handles between the worker and everything else:
//!
//! - [`ProfileHandle`]: settings side writes, worker reads one snapshot per cycle
//! - [`FramePublisher`] / [`FrameObserver`]: worker publishes, observers read
//!
//! Both are `tokio::sync::watch` channels carrying `Arc` snapshots, so a
//! reader never sees a half-written value and never blocks the writer for
//! longer than a pointer swap.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::config::Profile;
use crate::mapping::frame::OutputFrame;

/// Shared, replaceable mapping profile
///
/// # Examples
///
/// ```
/// use pad_bridge::config::Profile;
/// use pad_bridge::runtime::ProfileHandle;
///
/// let handle = ProfileHandle::new(Profile::default());
/// handle.update(|profile| profile.global_settings.update_rate = 250);
///
/// assert_eq!(handle.snapshot().global_settings.update_rate, 250);
/// ```
#[derive(Debug, Clone)]
pub struct ProfileHandle {
    tx: Arc<watch::Sender<Arc<Profile>>>,
}

impl ProfileHandle {
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(profile));
        Self { tx: Arc::new(tx) }
    }

    /// Current profile.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Profile> {
        Arc::clone(&self.tx.borrow())
    }

    /// Edit a copy of the current profile and swap it in.
    ///
    /// The edited profile is sanitized before it becomes visible.
    pub fn update(&self, edit: impl FnOnce(&mut Profile)) {
        self.tx.send_modify(|current| {
            let mut next = Profile::clone(&**current);
            edit(&mut next);
            next.sanitize();
            *current = Arc::new(next);
        });
    }

    /// Replace the profile wholesale.
    pub fn replace(&self, profile: Profile) {
        self.update(|current| *current = profile);
    }

    /// Receiver for the worker.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Profile>> {
        self.tx.subscribe()
    }
}

/// One published cycle result
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedFrame {
    pub frame: OutputFrame,
    /// Increases by one per published frame, starting at 1.
    pub sequence: u64,
    pub captured_at: Instant,
}

/// Worker side of the frame channel
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Option<Arc<PublishedFrame>>>,
    sequence: u64,
}

impl FramePublisher {
    /// Publish `frame` and return its sequence number.
    pub fn publish(&mut self, frame: OutputFrame) -> u64 {
        self.sequence += 1;
        let published = PublishedFrame {
            frame,
            sequence: self.sequence,
            captured_at: Instant::now(),
        };
        self.tx.send_replace(Some(Arc::new(published)));
        self.sequence
    }

    /// Number of frames published so far.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// New observer of this channel.
    #[must_use]
    pub fn observer(&self) -> FrameObserver {
        FrameObserver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the frame channel, cheap to clone
#[derive(Debug, Clone)]
pub struct FrameObserver {
    rx: watch::Receiver<Option<Arc<PublishedFrame>>>,
}

impl FrameObserver {
    /// Most recent frame, `None` before the first publish.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<PublishedFrame>> {
        self.rx.borrow().clone()
    }

    /// True if nothing was published yet or the latest frame is older than `max_age`.
    #[must_use]
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.latest() {
            Some(published) => published.captured_at.elapsed() > max_age,
            None => true,
        }
    }

    /// Wait for the next publish.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Arc<PublishedFrame>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

/// Create a connected publisher/observer pair.
///
/// # Examples
///
/// ```
/// use pad_bridge::mapping::frame::OutputFrame;
/// use pad_bridge::runtime::frame_channel;
///
/// let (mut publisher, observer) = frame_channel();
/// assert!(observer.latest().is_none());
///
/// publisher.publish(OutputFrame::default());
/// assert_eq!(observer.latest().unwrap().sequence, 1);
/// ```
#[must_use]
pub fn frame_channel() -> (FramePublisher, FrameObserver) {
    let (tx, rx) = watch::channel(None);
    (FramePublisher { tx, sequence: 0 }, FrameObserver { rx })
}
