// Transfer-rate estimation shared by the HTTP data sources

use parking_lot::Mutex;
use std::time::Duration;

/// Estimate used before the first transfer completes (1 Mbit/s).
pub const DEFAULT_INITIAL_BITRATE: u64 = 1_000_000;

/// Weight of the newest sample in the moving average.
const SMOOTHING: f64 = 0.3;

/// Transfers shorter than this are too noisy to sample.
const MIN_SAMPLE_ELAPSED: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct MeterState {
    estimate_bps: f64,
    sampled: bool,
    total_bytes: u64,
    transfers: u64,
}

/// Thread-safe bandwidth meter
/// Fed by the transport on each completed transfer, read when choosing what to fetch
#[derive(Debug)]
pub struct BandwidthMeter {
    state: Mutex<MeterState>,
}

impl BandwidthMeter {
    pub fn new() -> Self {
        Self::with_initial_estimate(DEFAULT_INITIAL_BITRATE)
    }

    pub fn with_initial_estimate(bits_per_second: u64) -> Self {
        Self {
            state: Mutex::new(MeterState {
                estimate_bps: bits_per_second as f64,
                sampled: false,
                total_bytes: 0,
                transfers: 0,
            }),
        }
    }

    /// Record a completed transfer of `bytes` that took `elapsed`.
    pub fn on_transfer(&self, bytes: u64, elapsed: Duration) {
        let mut state = self.state.lock();
        state.total_bytes += bytes;
        state.transfers += 1;

        if bytes == 0 || elapsed < MIN_SAMPLE_ELAPSED {
            return;
        }

        let sample = (bytes as f64 * 8.0) / elapsed.as_secs_f64();
        state.estimate_bps = if state.sampled {
            SMOOTHING * sample + (1.0 - SMOOTHING) * state.estimate_bps
        } else {
            sample
        };
        state.sampled = true;
        log::trace!("bandwidth sample {:.0} bps, estimate {:.0} bps", sample, state.estimate_bps);
    }

    /// Current estimate in bits per second
    pub fn bitrate_estimate(&self) -> u64 {
        self.state.lock().estimate_bps as u64
    }

    pub fn total_bytes(&self) -> u64 {
        self.state.lock().total_bytes
    }

    pub fn transfer_count(&self) -> u64 {
        self.state.lock().transfers
    }
}

impl Default for BandwidthMeter {
    fn default() -> Self {
        Self::new()
    }
}
