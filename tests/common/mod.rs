// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Polling helper for assertions against asynchronously-delivered state.

use std::time::{Duration, Instant};

/// Poll `check` until it returns `true` or `timeout` elapses, then assert.
/// Needed because message delivery between simulated ranks happens on a
/// background dispatcher thread.
pub fn wait_until(mut check: impl FnMut() -> bool, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return;
        }
        if Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
