// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reader client handle.

use parking_lot::Mutex;

use crate::data::TimedStore;
use crate::transport::Communicator;
use crate::Timestamp;

struct ReaderState<T> {
    data: TimedStore<T>,
    keeptime: Timestamp,
    channel_advancetime: Timestamp,
}

/// Bound to (reader-name, channel-name, channel-home-rank). Holds a local
/// replica of items pushed by the home channel, plus the two watermarks
/// that make [`Reader::get`]'s tri-state result possible.
pub struct Reader<T, C> {
    pub name: String,
    pub channel_name: String,
    pub channel_rank: usize,
    comm: std::sync::Arc<C>,
    inner: Mutex<ReaderState<T>>,
}

impl<T, C> Reader<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Communicator<T>,
{
    pub fn new(name: impl Into<String>, channel_name: impl Into<String>, channel_rank: usize, comm: std::sync::Arc<C>) -> Self {
        Self {
            name: name.into(),
            channel_name: channel_name.into(),
            channel_rank,
            comm,
            inner: Mutex::new(ReaderState { data: TimedStore::new(), keeptime: 0, channel_advancetime: 0 }),
        }
    }

    /// Retrieve the item at `ts`, and whether it may still arrive.
    ///
    /// - `ts <= keeptime`: already consumed — `(None, false)`.
    /// - `ts < channel_advancetime`: the answer is final, item or not.
    /// - otherwise: may still arrive — `(item_or_none, true)`.
    pub fn get(&self, ts: Timestamp) -> (Option<T>, bool) {
        let st = self.inner.lock();
        if ts <= st.keeptime {
            return (None, false);
        }
        let item = st.data.get_cloned(ts);
        if ts < st.channel_advancetime {
            return (item, false);
        }
        (item, true)
    }

    /// Declare that this reader will never read at or before `t` again.
    /// No-op if `t < keeptime` (I2: keeptime never decreases).
    pub fn consume_until(&self, t: Timestamp) {
        let mut st = self.inner.lock();
        if t < st.keeptime {
            return;
        }
        for tau in st.keeptime..=t {
            st.data.delete(tau);
        }
        st.keeptime = t;
        drop(st);
        self.comm.send(
            self.channel_rank,
            crate::messaging::Message::ReaderConsume { until: t, reader: self.name.clone(), channel: self.channel_name.clone() },
        );
    }

    /// Current keeptime, for diagnostics/tests.
    pub fn keeptime(&self) -> Timestamp {
        self.inner.lock().keeptime
    }

    /// Current channel_advancetime, for diagnostics/tests.
    pub fn channel_advancetime(&self) -> Timestamp {
        self.inner.lock().channel_advancetime
    }

    /// A snapshot of the reader's local cache, for diagnostics/tests.
    pub fn snapshot(&self) -> Vec<(Timestamp, T)> {
        let st = self.inner.lock();
        st.data.iter().map(|(ts, item)| (*ts, item.clone())).collect()
    }

    /// Called by the dispatcher when a `Data` message for this reader's
    /// channel arrives (or, if the reader is local to the channel's home,
    /// directly from `Channel::publish_data`).
    pub(crate) fn receive_data(&self, ts: Timestamp, item: T) {
        self.inner.lock().data.set(ts, item);
    }

    /// Called by the dispatcher on `WriterAdvance` fan-out.
    pub(crate) fn set_channel_advancetime(&self, t: Timestamp) {
        self.inner.lock().channel_advancetime = t;
    }

    /// Called by the dispatcher when the channel isn't local: advance the
    /// floor monotonically rather than overwriting it.
    pub(crate) fn raise_channel_advancetime(&self, t: Timestamp) {
        let mut st = self.inner.lock();
        if t > st.channel_advancetime {
            st.channel_advancetime = t;
        }
    }
}
