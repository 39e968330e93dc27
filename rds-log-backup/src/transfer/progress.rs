//! Byte-level accounting for a backup run.
//!
//! Log files arrive gzip-encoded, so the bytes written to the destination are
//! usually far fewer than the sizes reported by the listing.

use std::fmt;
use std::time::{Duration, Instant};

/// Running totals for one backup run
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// Uncompressed size of every copied file, as listed
    pub listed_bytes: u64,

    /// Bytes actually transferred and written
    pub transferred_bytes: u64,

    /// Number of files written to the destination
    pub files_copied: usize,

    start_time: Instant,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            listed_bytes: 0,
            transferred_bytes: 0,
            files_copied: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one copied file
    pub fn record(&mut self, listed_size: u64, transferred: u64) {
        self.listed_bytes += listed_size;
        self.transferred_bytes += transferred;
        self.files_copied += 1;
    }

    /// Get total elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average transfer speed since start
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.transferred_bytes as f64 / elapsed) as u64
        } else {
            0
        }
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage change from the listed size to the transferred size,
/// rounded down (`-90` means the download was 90% smaller).
///
/// `None` when the listed size is zero.
pub fn size_difference_percent(listed_size: u64, transferred: u64) -> Option<i64> {
    if listed_size == 0 {
        return None;
    }
    let diff = (transferred as i128 - listed_size as i128) * 100;
    Some(diff.div_euclid(listed_size as i128) as i64)
}

/// Renders a byte count with a binary unit, e.g. `1.5 KiB`.
struct ByteSize(u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
        if self.0 < 1024 {
            return write!(f, "{} B", self.0);
        }
        let mut value = self.0 as f64 / 1024.0;
        let mut unit = UNITS[0];
        for next in &UNITS[1..] {
            if value < 1024.0 {
                break;
            }
            value /= 1024.0;
            unit = next;
        }
        write!(f, "{:.1} {}", value, unit)
    }
}

/// One-line run summary for the final log record:
/// `3 file(s), 1.2 MiB of 9.8 MiB listed, 1.2 MiB/s over 1.0s`.
impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s), {} of {} listed, {}/s over {:.1}s",
            self.files_copied,
            ByteSize(self.transferred_bytes),
            ByteSize(self.listed_bytes),
            ByteSize(self.average_speed()),
            self.elapsed().as_secs_f64()
        )
    }
}
