// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Configuration-time errors.
//
// Only build/start-time misconfiguration is ever surfaced as an `Err`.
// Monotonicity violations and absent-timestamp reads/deletes are silent
// no-ops elsewhere in the crate; transport failures are not modeled here
// at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StmError {
    #[error("channel `{0}` was declared as home on more than one rank")]
    DuplicateChannel(String),

    #[error("channel `{0}` was never declared with create_channels on any rank")]
    UnknownChannel(String),

    #[error("STMBuilder::build() was already called")]
    BuilderAlreadyConsumed,

    #[error("invalid listening mode `{0}`, expected \"thread\" or \"manual\"")]
    InvalidListeningMode(String),

    #[error("no reader named `{0}` was registered with this runtime")]
    UnknownReader(String),

    #[error("no writer named `{0}` was registered with this runtime")]
    UnknownWriter(String),
}

pub type Result<T> = std::result::Result<T, StmError>;
