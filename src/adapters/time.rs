//! ESP32 clock adapter.
//!
//! Monotonic milliseconds for the control loop, plus the wall-clock day
//! ordinal behind the daily fuel counter ([`CalendarPort`]).
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for uptime and
//!   `gettimeofday()` for the calendar (set by SNTP).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for uptime; the
//!   calendar reports unsynced unless a day is pinned with
//!   [`Esp32Clock::set_day`].

use crate::app::ports::CalendarPort;

/// Anything before 2020-01-01 means the RTC was never set.
#[cfg(target_os = "espidf")]
const EPOCH_2020: i64 = 1_577_836_800;

const SECS_PER_DAY: i64 = 86_400;

pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    day: Option<u32>,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            day: None,
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Pin the simulated calendar day (`None` = unsynced).
    #[cfg(not(target_os = "espidf"))]
    pub fn set_day(&mut self, day: Option<u32>) {
        self.day = day;
    }
}

/// Day ordinal for a Unix timestamp.
pub fn day_from_unix(secs: i64) -> Option<u32> {
    u32::try_from(secs.div_euclid(SECS_PER_DAY)).ok()
}

impl CalendarPort for Esp32Clock {
    #[cfg(target_os = "espidf")]
    fn day_ordinal(&self) -> Option<u32> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = tv.tv_sec as i64;
        if secs < EPOCH_2020 {
            return None;
        }
        day_from_unix(secs)
    }

    #[cfg(not(target_os = "espidf"))]
    fn day_ordinal(&self) -> Option<u32> {
        self.day
    }
}
