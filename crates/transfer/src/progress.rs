use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MIB: f64 = 1024.0 * 1024.0;

/// Timing of one chunk's download and upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub session_id: String,
    pub part_number: u32,
    pub bytes: u64,
    pub download: Duration,
    pub upload: Duration,
}

impl ChunkReport {
    pub fn download_mib_per_sec(&self) -> f64 {
        mib_per_sec(self.bytes, self.download)
    }

    pub fn upload_mib_per_sec(&self) -> f64 {
        mib_per_sec(self.bytes, self.upload)
    }
}

impl fmt::Display for ChunkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mib = self.bytes as f64 / MIB;
        write!(
            f,
            "part {} of session {}: downloaded {:.2} MiB in {} ms ({:.2} MiB/s), uploaded in {} ms ({:.2} MiB/s)",
            self.part_number,
            self.session_id,
            mib,
            self.download.as_millis(),
            self.download_mib_per_sec(),
            self.upload.as_millis(),
            self.upload_mib_per_sec()
        )
    }
}

fn mib_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return 0.0;
    }
    bytes as f64 / MIB / elapsed.as_secs_f64()
}

// ---------------------------------------------------------------------------
// ThroughputMeter
// ---------------------------------------------------------------------------

struct Sample {
    bytes: u64,
    timestamp: Instant,
}

/// Transfer rate over a sliding window of completed chunks.
pub struct ThroughputMeter {
    inner: Mutex<MeterInner>,
}

struct MeterInner {
    started: Instant,
    samples: Vec<Sample>,
    max_samples: usize,
    window_size: Duration,
}

impl ThroughputMeter {
    /// Creates a new meter.
    ///
    /// - `window_size`: time window for rate calculation (default 60 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(MeterInner {
                started: Instant::now(),
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(60)),
            }),
        }
    }

    /// Records `bytes` completed at the current instant.
    pub fn record(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push(Sample {
            bytes,
            timestamp: now,
        });

        let cutoff = now.checked_sub(s.window_size).unwrap_or(s.started);
        s.samples.retain(|sample| sample.timestamp >= cutoff);

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average rate in bytes/second across the window, measured from the
    /// start of the window (or meter creation) to the latest sample.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let Some(last) = s.samples.last() else {
            return 0.0;
        };

        let window_start = last
            .timestamp
            .checked_sub(s.window_size)
            .map_or(s.started, |t| t.max(s.started));
        let elapsed = last.timestamp.duration_since(window_start);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimates the time left for `remaining_bytes`.
    ///
    /// Returns `None` while no rate is known.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(None, None)
    }
}
