// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Spatio-Temporal Memory (STM): named, timestamped channels for SPMD
// parallel programs. A channel has a home rank; writers `put` items and
// `advance_until` an impossibility floor, readers `get` items (possibly
// still-pending, possibly forever absent) and `consume_until` a keep-time
// floor that lets the home rank garbage-collect.
//
// Bring up a runtime with `StmBuilder` against a `Communicator`
// implementation, then use `Stm::reader`/`Stm::writer` to get client
// handles.

pub mod builder;
pub mod channel;
pub mod data;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod pqdict;
pub mod reader;
pub mod runtime;
pub mod transport;
pub mod writer;

/// STM timestamps are non-negative integers; `u64` is this crate's concrete width.
pub type Timestamp = u64;

pub use builder::StmBuilder;
pub use channel::Channel;
pub use error::{Result, StmError};
pub use messaging::{Attachment, ChannelsInit, Message, Tag};
pub use reader::Reader;
pub use runtime::{ListeningMode, Stm};
pub use transport::{Communicator, InProcessCommunicator, RecvHandle, SendHandle};
pub use writer::Writer;
