//! Live server metrics sampled once per refresh.
//!
//! The header/footer and the roster templates reference these values
//! through the substitution service. Sampling happens in the driver at tick
//! time; everything here is plain data plus small formatting helpers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Nominal tick rate reported when the driver keeps up with its interval.
pub const NOMINAL_TPS: f64 = 20.0;

/// Snapshot of server-wide metrics at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerMetrics {
    /// Connected real participants.
    pub online: usize,
    /// Participant capacity.
    pub capacity: usize,
    /// Tick-rate proxy, `NOMINAL_TPS` when on schedule.
    pub tps: f64,
    pub uptime: Duration,
    pub memory_used_mb: u64,
    pub memory_max_mb: u64,
    pub server_name: String,
    pub version: String,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            online: 0,
            capacity: 100,
            tps: NOMINAL_TPS,
            uptime: Duration::ZERO,
            memory_used_mb: 0,
            memory_max_mb: 0,
            server_name: "roster-sync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Human uptime: `1d 2h`, `3h 4m`, `5m 6s`, `7s`.
pub fn format_uptime(uptime: Duration) -> String {
    let seconds = uptime.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

/// Colour tag matching a tick rate.
pub fn tps_color(tps: f64) -> &'static str {
    if tps >= 19.0 {
        "<green>"
    } else if tps >= 17.0 {
        "<yellow>"
    } else if tps >= 15.0 {
        "<gold>"
    } else {
        "<red>"
    }
}

/// Rolling tick-rate proxy.
///
/// Compares observed tick spacing against the expected interval over a
/// short window. A driver that falls behind by 2× reports half the nominal
/// rate; a driver that runs early is capped at nominal.
#[derive(Debug)]
pub struct TickRateTracker {
    expected: Duration,
    last_tick: Option<Instant>,
    samples: VecDeque<Duration>,
    window: usize,
}

impl TickRateTracker {
    pub fn new(expected: Duration) -> Self {
        Self {
            expected,
            last_tick: None,
            samples: VecDeque::with_capacity(20),
            window: 20,
        }
    }

    /// Record a tick observed at `now`.
    pub fn record(&mut self, now: Instant) {
        if let Some(last) = self.last_tick {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(now.saturating_duration_since(last));
        }
        self.last_tick = Some(now);
    }

    /// Change the expected interval (config reload). Clears history.
    pub fn set_expected(&mut self, expected: Duration) {
        self.expected = expected;
        self.samples.clear();
        self.last_tick = None;
    }

    pub fn current(&self) -> f64 {
        if self.samples.is_empty() || self.expected.is_zero() {
            return NOMINAL_TPS;
        }
        let total: Duration = self.samples.iter().sum();
        let mean = total.as_secs_f64() / self.samples.len() as f64;
        if mean <= 0.0 {
            return NOMINAL_TPS;
        }
        (NOMINAL_TPS * self.expected.as_secs_f64() / mean).min(NOMINAL_TPS)
    }
}

/// Resident and total memory of this process/host in MiB.
///
/// Reads `/proc`; returns zeros where that is unavailable.
pub fn memory_usage_mb() -> (u64, u64) {
    (resident_mb().unwrap_or(0), total_mb().unwrap_or(0))
}

// VmRSS is reported in kB, so no page size is involved.
fn resident_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    kib_field(&status, "VmRSS:").map(|kib| kib / 1024)
}

fn total_mb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    kib_field(&meminfo, "MemTotal:").map(|kib| kib / 1024)
}

/// Value of a `Name:   1234 kB` line.
fn kib_field(text: &str, name: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with(name))?;
    line.split_whitespace().nth(1)?.parse().ok()
}
