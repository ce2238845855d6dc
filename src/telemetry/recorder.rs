//! # Frame Recorder
//!
//! Samples the latest published frame at a fixed interval and appends it to
//! a JSONL file. A new file is started every `max_records_per_file` records
//! and only the newest `max_files_to_keep` files are retained.
//!
//! Each line looks like:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123+00:00","sequence":42,"axes":{"X":0.5,"Y":0.0},"buttons":[1,3]}
//! ```

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::mapping::slots::AxisValues;
use crate::runtime::shared::{FrameObserver, PublishedFrame};

const FILE_PREFIX: &str = "frames_";
const FILE_EXTENSION: &str = "jsonl";

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_log_dir() -> PathBuf { PathBuf::from("./logs") }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_interval_ms() -> u64 { 100 }

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl RecorderConfig {
    /// Default limits, writing into `log_dir`.
    #[must_use]
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    /// Sampling interval, at least 1ms.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// One JSONL line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    /// RFC 3339 wall-clock time the record was written.
    pub timestamp: String,
    pub sequence: u64,
    pub axes: AxisValues,
    pub buttons: BTreeSet<u8>,
}

impl FrameRecord {
    #[must_use]
    pub fn from_published(published: &PublishedFrame) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            sequence: published.sequence,
            axes: published.frame.axes,
            buttons: published.frame.buttons.clone(),
        }
    }
}

/// Writes frames to rotating JSONL files
#[derive(Debug)]
pub struct FrameRecorder {
    config: RecorderConfig,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    records_written: u64,
    file_index: u64,
}

impl FrameRecorder {
    /// Create a recorder, creating `config.log_dir` if needed.
    ///
    /// No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_bridge::telemetry::{FrameRecorder, RecorderConfig};
    ///
    /// let dir = std::env::temp_dir().join("pad-bridge-doc-recorder");
    /// let recorder = FrameRecorder::new(RecorderConfig::new(&dir)).unwrap();
    /// assert_eq!(recorder.records_written(), 0);
    /// assert!(recorder.current_path().is_none());
    /// ```
    pub fn new(mut config: RecorderConfig) -> Result<Self> {
        config.max_records_per_file = config.max_records_per_file.max(1);
        config.max_files_to_keep = config.max_files_to_keep.max(1);
        fs::create_dir_all(&config.log_dir)?;

        Ok(Self {
            config,
            writer: None,
            current_path: None,
            records_in_file: 0,
            records_written: 0,
            file_index: 0,
        })
    }

    /// File currently being written.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Total records written by this recorder.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Append one frame, rotating first if the current file is full.
    ///
    /// # Errors
    ///
    /// Returns error on file creation, serialization or write failure.
    pub fn record(&mut self, published: &PublishedFrame) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.config.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(&FrameRecord::from_published(published))?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{line}")?;
            writer.flush()?;
        }

        self.records_in_file += 1;
        self.records_written += 1;
        Ok(())
    }

    /// Flush and close the current file.
    ///
    /// # Errors
    ///
    /// Returns error if buffered data cannot be written.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Record the latest frame every interval until `cancel` fires.
    ///
    /// A frame is written only when its sequence differs from the last one
    /// written. Write errors are logged and recording continues.
    /// Returns the total number of records written.
    pub async fn run(mut self, observer: FrameObserver, cancel: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Recording frames to {} every {}ms",
            self.config.log_dir.display(),
            self.config.interval().as_millis()
        );

        let mut last_sequence = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    let Some(published) = observer.latest() else {
                        continue;
                    };
                    if published.sequence == last_sequence {
                        continue;
                    }
                    last_sequence = published.sequence;

                    if let Err(e) = self.record(&published) {
                        warn!("Failed to record frame {}: {}", published.sequence, e);
                    }
                }
            }
        }

        if let Err(e) = self.close() {
            warn!("Failed to close recording file: {}", e);
        }
        info!("Frame recorder stopped after {} records", self.records_written);
        self.records_written
    }

    fn rotate(&mut self) -> Result<()> {
        self.close()?;

        self.file_index += 1;
        let name = format!(
            "{FILE_PREFIX}{}_{:06}.{FILE_EXTENSION}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_index
        );
        let path = self.config.log_dir.join(name);
        let file = File::create(&path)?;
        debug!("Opened recording file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.enforce_retention()
    }

    fn enforce_retention(&self) -> Result<()> {
        let mut files = recording_files(&self.config.log_dir)?;
        if files.len() <= self.config.max_files_to_keep {
            return Ok(());
        }

        let excess = files.len() - self.config.max_files_to_keep;
        for path in files.drain(..excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old recording file {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

/// Recording files in `dir`, oldest first.
fn recording_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            name.starts_with(FILE_PREFIX)
                && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION)
        })
        .collect();
    files.sort();
    Ok(files)
}
