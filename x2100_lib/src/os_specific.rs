//! Helper functions that need OS/platform specific implementations

use std::{hint, thread, time};

/// Sleep a number of microseconds
pub fn sleep(micros: u64) {
    let duration = time::Duration::from_micros(micros);
    thread::sleep(duration);
}

/// Busy-wait a number of microseconds. For waits below the timer slack of
/// the OS, where [`sleep`] would oversleep by tens of microseconds.
pub fn spin(micros: u64) {
    let duration = time::Duration::from_micros(micros);
    let start = time::Instant::now();
    while start.elapsed() < duration {
        hint::spin_loop();
    }
}
