// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// `tracing-subscriber` init helper shared by the demo binaries.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber that writes to stderr, honoring
/// `level` unless `RUST_LOG` is already set.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
