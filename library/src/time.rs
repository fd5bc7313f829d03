#[cfg(test)]
use mock_instant::global::SystemTime;

#[cfg(not(test))]
use std::time::SystemTime;

/// The number of seconds since the Unix epoch. Returns 0 if the system clock
/// is set before the Unix epoch. Used for `installed_at` stamps and the
/// auto-check throttle.
pub(crate) fn unix_timestamp() -> u64 {
    match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_) => 0,
    }
}
