use std::time::{Duration, Instant};

/// Interval between repeated log lines on hot paths.
pub const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Rate-limits a recurring log site; resets the timestamp when it fires.
pub fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

/// A throttle timestamp that lets the first call through.
pub fn log_throttle_start() -> Instant {
    Instant::now() - LOG_THROTTLE
}
