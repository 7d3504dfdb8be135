// src/util.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;

/// One-way latch for process shutdown, raised from the ctrl-c handler.
pub struct BarrierFlag(AtomicBool);

impl Default for BarrierFlag {
    fn default() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl BarrierFlag {
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Monotonic nanoseconds since process start.
#[inline]
pub fn now_nanos() -> u64 {
    static START: Lazy<Instant> = Lazy::new(Instant::now);
    START.elapsed().as_nanos() as u64
}

/// Wall-clock microseconds since the Unix epoch.
#[inline]
pub fn now_wall_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// `1|true|yes|y|on` (case-insensitive) count as enabled.
pub fn env_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => false,
    }
}

/// Parse a feed event timestamp (`YYYY-MM-DDTHH:MM:SS[.fffffffff][Z]`, UTC)
/// into microseconds since the epoch. Returns 0 when the string does not
/// parse or predates the epoch; callers treat 0 as "no usable timestamp".
pub fn ts_event_to_us(ts: &str) -> i64 {
    let s = ts.strip_suffix('Z').unwrap_or(ts);
    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(dt) => {
            let us = dt.and_utc().timestamp_micros();
            if us < 0 {
                0
            } else {
                us
            }
        }
        Err(_) => 0,
    }
}
