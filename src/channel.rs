// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Home-side channel state: the authoritative data store plus the keep-time
// and advance-time priority dictionaries, and the operations that mutate
// them (`publish_data`, `handle_consume_until`, `handle_advance_until`).
//
// All mutations to a single channel's state are serialized behind one
// `parking_lot::Mutex`; cross-channel concurrency is unrestricted.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::data::TimedStore;
use crate::messaging::Message;
use crate::pqdict::PqDict;
use crate::reader::Reader;
use crate::transport::Communicator;
use crate::Timestamp;

struct ChannelState<T, C> {
    data: TimedStore<T>,
    reader_keeptimes: PqDict<String>,
    writer_advancetimes: PqDict<String>,
    local_readers: Vec<Arc<Reader<T, C>>>,
    reader_ranks: HashSet<usize>,
}

pub struct Channel<T, C> {
    pub name: String,
    comm: Arc<C>,
    inner: Mutex<ChannelState<T, C>>,
}

impl<T, C> Channel<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Communicator<T>,
{
    pub fn new(name: impl Into<String>, comm: Arc<C>) -> Self {
        Self {
            name: name.into(),
            comm,
            inner: Mutex::new(ChannelState {
                data: TimedStore::new(),
                reader_keeptimes: PqDict::new(),
                writer_advancetimes: PqDict::new(),
                local_readers: Vec::new(),
                reader_ranks: HashSet::new(),
            }),
        }
    }

    // -- build-time wiring -------------------------------------------------

    pub(crate) fn attach_local_reader(&self, reader: Arc<Reader<T, C>>) {
        let mut st = self.inner.lock();
        st.reader_keeptimes.set(reader.name.clone(), 0);
        st.local_readers.push(reader);
    }

    pub(crate) fn attach_remote_reader(&self, rank: usize, reader_name: &str) {
        let mut st = self.inner.lock();
        st.reader_ranks.insert(rank);
        st.reader_keeptimes.set(reader_name.to_string(), 0);
    }

    pub(crate) fn attach_writer(&self, writer_name: &str) {
        self.inner.lock().writer_advancetimes.set(writer_name.to_string(), 0);
    }

    // -- diagnostics ---------------------------------------------------------

    pub fn keeptime(&self) -> Timestamp {
        self.inner.lock().reader_keeptimes.peek().map(|(_, ts)| ts).unwrap_or(0)
    }

    pub fn advancetime(&self) -> Timestamp {
        self.inner.lock().writer_advancetimes.peek().map(|(_, ts)| ts).unwrap_or(0)
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.inner.lock().data.get(ts).is_some()
    }

    // -- home-side operations ------------------------------------------------

    /// Store `item` at `ts`, push it into every local reader's cache, and
    /// fan it out to every remote rank hosting an attached reader. Blocks
    /// until every outgoing send has completed, bounding buffering.
    pub fn publish_data(&self, ts: Timestamp, item: T) {
        let reader_ranks: Vec<usize>;
        {
            let mut st = self.inner.lock();
            let keeptime = st.reader_keeptimes.peek().map(|(_, ts)| ts).unwrap_or(0);
            if ts <= keeptime {
                // Every attached reader has already declared it will never
                // read at or before this timestamp; storing it would just
                // resurrect data the GC floor has already passed.
                return;
            }
            st.data.set(ts, item.clone());
            for reader in &st.local_readers {
                reader.receive_data(ts, item.clone());
            }
            reader_ranks = st.reader_ranks.iter().copied().collect();
        }
        tracing::debug!(channel = %self.name, ts, fanout = reader_ranks.len(), "publishing item");
        let mut handles = Vec::with_capacity(reader_ranks.len());
        for rank in reader_ranks {
            let msg = Message::Data { ts, item: item.clone(), channel: self.name.clone() };
            handles.push(self.comm.isend(rank, msg));
        }
        for handle in handles {
            handle.wait();
        }
    }

    /// A reader declares it will never read at or before `t` again.
    /// Garbage-collects everything the slowest attached reader no longer
    /// needs: deletes `data[τ]` for every `prev < τ <= new`, where `prev`/
    /// `new` are the channel-wide keep-time floor before/after this update.
    pub fn handle_consume_until(&self, reader_name: &str, t: Timestamp) {
        let mut st = self.inner.lock();
        let prev = st.reader_keeptimes.peek().map(|(_, ts)| ts).unwrap_or(0);
        let reader_prev = st.reader_keeptimes.get(&reader_name.to_string()).unwrap_or(0);
        st.reader_keeptimes.set(reader_name.to_string(), reader_prev.max(t));
        let new = st.reader_keeptimes.peek().map(|(_, ts)| ts).unwrap_or(0);
        tracing::info!(channel = %self.name, reader = reader_name, until = t, keeptime = new, "consume");
        if new > prev {
            for tau in (prev + 1)..=new {
                st.data.delete(tau);
            }
        }
    }

    /// A writer declares no item will ever appear at or before `t`. If this
    /// raises the channel-wide advance floor (min over all writers), pushes
    /// the new floor to every local reader and fans out `WriterAdvance` to
    /// every remote reader-holding rank. The fan-out is queued (`isend`)
    /// before returning, not awaited.
    pub fn handle_advance_until(&self, writer_name: &str, t: Timestamp) {
        let reader_ranks: Vec<usize>;
        let propagate;
        {
            let mut st = self.inner.lock();
            let prev_min = st.writer_advancetimes.peek().map(|(_, ts)| ts).unwrap_or(0);
            let writer_prev = st.writer_advancetimes.get(&writer_name.to_string()).unwrap_or(0);
            st.writer_advancetimes.set(writer_name.to_string(), writer_prev.max(t));
            let new_min = st.writer_advancetimes.peek().map(|(_, ts)| ts).unwrap_or(0);
            propagate = new_min > prev_min;
            if propagate {
                for reader in &st.local_readers {
                    reader.set_channel_advancetime(t);
                }
            }
            reader_ranks = st.reader_ranks.iter().copied().collect();
        }
        if !propagate {
            return;
        }
        tracing::info!(channel = %self.name, writer = writer_name, until = t, "advance");
        for rank in reader_ranks {
            let msg = Message::WriterAdvance { until: t, writer: writer_name.to_string(), channel: self.name.clone() };
            let _ = self.comm.isend(rank, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::transport::InProcessCommunicator;

    #[derive(Debug, Clone)]
    enum Op {
        Put(u64, i64),
        Consume(usize, u64),
        Advance(usize, u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..20, any::<i64>()).prop_map(|(ts, v)| Op::Put(ts, v)),
            (0usize..2, 0u64..20).prop_map(|(r, t)| Op::Consume(r, t)),
            (0usize..2, 0u64..20).prop_map(|(w, t)| Op::Advance(w, t)),
        ]
    }

    proptest! {
        /// After every ChannelPut/ReaderConsume/WriterAdvance at a single
        /// home, `data[tau]` exists only for `tau` past the channel-wide
        /// keep floor.
        #[test]
        fn gc_floor_holds(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let comm = Arc::new(InProcessCommunicator::<i64>::group(2).remove(0));
            let channel: Channel<i64, InProcessCommunicator<i64>> = Channel::new("ch1", comm);
            channel.attach_remote_reader(1, "r0");
            channel.attach_remote_reader(1, "r1");
            channel.attach_writer("w0");
            channel.attach_writer("w1");
            let reader_names = ["r0", "r1"];
            let writer_names = ["w0", "w1"];

            let mut prev_keeptime = 0u64;

            for op in ops {
                match op {
                    Op::Put(ts, v) => channel.publish_data(ts, v),
                    Op::Consume(idx, t) => channel.handle_consume_until(reader_names[idx], t),
                    Op::Advance(idx, t) => channel.handle_advance_until(writer_names[idx], t),
                }

                let keeptime = channel.keeptime();
                prop_assert!(keeptime >= prev_keeptime, "keeptime must never decrease");
                prev_keeptime = keeptime;

                for tau in 0..=keeptime {
                    prop_assert!(!channel.contains(tau), "data[{}] must be GC'd once tau <= keeptime {}", tau, keeptime);
                }
            }
        }
    }
}
