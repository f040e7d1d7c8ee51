// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The frozen runtime produced by `StmBuilder::build`: channel/reader/writer
// registries plus the message dispatcher that multiplexes the five wire
// message kinds over the group transport.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::channel::Channel;
use crate::error::{Result, StmError};
use crate::messaging::Message;
use crate::reader::Reader;
use crate::transport::Communicator;
use crate::writer::Writer;

/// How a rank drains incoming STM traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningMode {
    /// A background thread blocks on `irecv` and dispatches as messages arrive.
    Thread,
    /// The host drives dispatch itself via [`Stm::receive_message`]/
    /// [`Stm::process_message`] (or [`Stm::probe`]), e.g. inside its own
    /// discrete-event loop.
    Manual,
}

impl FromStr for ListeningMode {
    type Err = StmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "thread" => Ok(ListeningMode::Thread),
            "manual" => Ok(ListeningMode::Manual),
            other => Err(StmError::InvalidListeningMode(other.to_string())),
        }
    }
}

pub struct Stm<T, C> {
    comm: Arc<C>,
    local_channels: HashMap<String, Arc<Channel<T, C>>>,
    channel_rank: HashMap<String, usize>,
    readers_by_id: HashMap<String, Arc<Reader<T, C>>>,
    readers_by_channel: HashMap<String, Vec<Arc<Reader<T, C>>>>,
    writers_by_id: HashMap<String, Arc<Writer<T, C>>>,
    shutdown_flags: Mutex<Vec<bool>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<T, C> Stm<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Communicator<T> + 'static,
{
    pub(crate) fn new(
        comm: Arc<C>,
        local_channels: HashMap<String, Arc<Channel<T, C>>>,
        channel_rank: HashMap<String, usize>,
        readers_by_id: HashMap<String, Arc<Reader<T, C>>>,
        readers_by_channel: HashMap<String, Vec<Arc<Reader<T, C>>>>,
        writers_by_id: HashMap<String, Arc<Writer<T, C>>>,
    ) -> Self {
        let size = comm.size();
        Self {
            comm,
            local_channels,
            channel_rank,
            readers_by_id,
            readers_by_channel,
            writers_by_id,
            shutdown_flags: Mutex::new(vec![false; size]),
            thread: Mutex::new(None),
        }
    }

    pub fn reader(&self, name: &str) -> Result<Arc<Reader<T, C>>> {
        self.readers_by_id.get(name).cloned().ok_or_else(|| StmError::UnknownReader(name.to_string()))
    }

    pub fn writer(&self, name: &str) -> Result<Arc<Writer<T, C>>> {
        self.writers_by_id.get(name).cloned().ok_or_else(|| StmError::UnknownWriter(name.to_string()))
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Whether `channel` is homed on this rank and currently holds an item
    /// at `ts`. `None` if `channel` isn't homed here. Diagnostic only.
    pub fn channel_contains(&self, channel: &str, ts: crate::Timestamp) -> Option<bool> {
        self.local_channels.get(channel).map(|ch| ch.contains(ts))
    }

    /// The channel-wide keep-time floor (min over attached readers), for a
    /// channel homed on this rank. `None` if `channel` isn't homed here.
    pub fn channel_keeptime(&self, channel: &str) -> Option<crate::Timestamp> {
        self.local_channels.get(channel).map(|ch| ch.keeptime())
    }

    /// Begin listening. In [`ListeningMode::Thread`], spawns a background
    /// thread that blocks on `irecv` and dispatches until shutdown. In
    /// [`ListeningMode::Manual`], this is a no-op — the host drains with
    /// [`Stm::receive_message`]/[`Stm::process_message`] or [`Stm::probe`].
    pub fn start(self: &Arc<Self>, mode: ListeningMode) -> Result<()> {
        match mode {
            ListeningMode::Manual => Ok(()),
            ListeningMode::Thread => {
                let stm = self.clone();
                let handle = std::thread::spawn(move || {
                    loop {
                        let msg = stm.comm.irecv().wait();
                        stm.dispatch(msg);
                        if stm.shutdown_flags.lock().iter().all(|&f| f) {
                            break;
                        }
                    }
                });
                *self.thread.lock() = Some(handle);
                Ok(())
            }
        }
    }

    /// Declare this rank done: set its own shutdown flag and broadcast
    /// `Shutdown` to every other rank. In thread mode, blocks until the
    /// background thread has observed every rank's flag and exited.
    pub fn stop(&self) {
        let rank = self.comm.rank();
        {
            let mut flags = self.shutdown_flags.lock();
            if flags[rank] {
                return;
            }
            flags[rank] = true;
        }
        tracing::info!(rank, "shutdown requested");
        // Broadcast to every rank, including self: a lone background thread
        // blocked on `irecv` only wakes on an inbox message, so self must be
        // notified too, not just the other ranks.
        for dest in 0..self.comm.size() {
            let _ = self.comm.isend(dest, Message::Shutdown { source_rank: rank });
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }

    /// Blocking receive of the next message, for manual-mode hosts.
    pub fn receive_message(&self) -> Message<T> {
        self.comm.irecv().wait()
    }

    /// Non-blocking receive, for manual-mode hosts that poll rather than block.
    pub fn probe(&self) -> Option<Message<T>> {
        let mut handle = self.comm.irecv();
        if handle.probe() {
            Some(handle.wait())
        } else {
            None
        }
    }

    /// Apply a message already received by a manual-mode host. Also updates
    /// this rank's shutdown bookkeeping on `Shutdown`.
    pub fn process_message(&self, msg: Message<T>) {
        self.dispatch(msg);
    }

    /// True once every rank's shutdown flag, including this one, is set.
    pub fn shutdown_complete(&self) -> bool {
        self.shutdown_flags.lock().iter().all(|&f| f)
    }

    fn dispatch(&self, msg: Message<T>) {
        match msg {
            Message::ChannelPut { ts, item, channel, .. } => {
                if let Some(ch) = self.local_channels.get(&channel) {
                    ch.publish_data(ts, item);
                } else if let Some(&home) = self.channel_rank.get(&channel) {
                    let _ = self.comm.isend(home, Message::ChannelPut { ts, item, source_rank: self.comm.rank(), channel });
                }
            }
            Message::Data { ts, item, channel } => {
                if let Some(readers) = self.readers_by_channel.get(&channel) {
                    for reader in readers {
                        reader.receive_data(ts, item.clone());
                    }
                }
            }
            Message::ReaderConsume { until, reader, channel } => {
                if let Some(ch) = self.local_channels.get(&channel) {
                    ch.handle_consume_until(&reader, until);
                }
            }
            Message::WriterAdvance { until, writer, channel } => {
                if let Some(ch) = self.local_channels.get(&channel) {
                    ch.handle_advance_until(&writer, until);
                } else if let Some(readers) = self.readers_by_channel.get(&channel) {
                    for reader in readers {
                        reader.raise_channel_advancetime(until);
                    }
                }
            }
            Message::Shutdown { source_rank } => {
                self.shutdown_flags.lock()[source_rank] = true;
            }
        }
    }
}
