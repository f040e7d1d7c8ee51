// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Writer client handle.
//
// Outstanding `put` sends are retained and reaped rather than leaked.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::messaging::Message;
use crate::transport::{Communicator, SendHandle};
use crate::Timestamp;

/// Outstanding `put` sends are never allowed to queue past this many before
/// `put` blocks on the oldest one, bounding unacknowledged network buffering.
const MAX_OUTSTANDING_PUTS: usize = 64;

pub struct Writer<T, C> {
    pub name: String,
    pub channel_name: String,
    pub channel_rank: usize,
    comm: Arc<C>,
    advancetime: Mutex<Timestamp>,
    outstanding: Mutex<VecDeque<Box<dyn SendHandle>>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, C> Writer<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Communicator<T>,
{
    pub fn new(name: impl Into<String>, channel_name: impl Into<String>, channel_rank: usize, comm: Arc<C>) -> Self {
        Self {
            name: name.into(),
            channel_name: channel_name.into(),
            channel_rank,
            comm,
            advancetime: Mutex::new(0),
            outstanding: Mutex::new(VecDeque::new()),
            _marker: std::marker::PhantomData,
        }
    }

    /// Publish `item` at timestamp `ts`. Dispatched through the same
    /// `ChannelPut` handler whether or not this writer is colocated with the
    /// channel's home rank.
    pub fn put(&self, ts: Timestamp, item: T) {
        let msg = Message::ChannelPut { ts, item, source_rank: self.comm.rank(), channel: self.channel_name.clone() };
        let handle = self.comm.isend(self.channel_rank, msg);
        let mut outstanding = self.outstanding.lock();
        outstanding.push_back(handle);
        while outstanding.len() > MAX_OUTSTANDING_PUTS {
            if let Some(oldest) = outstanding.pop_front() {
                oldest.wait();
            }
        }
        outstanding.retain(|h| !h.is_ready());
    }

    /// Declare that no item will ever appear at or before `t`.
    /// No-op if `t <= advancetime` (I3: advancetime never decreases).
    pub fn advance_until(&self, t: Timestamp) {
        let mut advancetime = self.advancetime.lock();
        if t <= *advancetime {
            return;
        }
        *advancetime = t;
        drop(advancetime);
        let msg = Message::WriterAdvance { until: t, writer: self.name.clone(), channel: self.channel_name.clone() };
        let _ = self.comm.isend(self.channel_rank, msg);
    }

    pub fn advancetime(&self) -> Timestamp {
        *self.advancetime.lock()
    }
}
