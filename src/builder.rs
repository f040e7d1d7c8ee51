// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Two-phase bootstrap: stage local declarations, then run the collective
// exchanges that produce a frozen `Stm` runtime.
//
// Reader/writer declarations for a channel homed on this rank are wired
// immediately; declarations for a channel homed elsewhere are staged by
// channel name until `build()` knows every channel's home rank.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::Channel;
use crate::error::{Result, StmError};
use crate::messaging::{Attachment, ChannelsInit};
use crate::reader::Reader;
use crate::runtime::Stm;
use crate::transport::Communicator;
use crate::writer::Writer;

struct Staged<T, C> {
    local_channels: HashMap<String, Arc<Channel<T, C>>>,
    channel_reader_names: HashMap<String, Vec<String>>,
    channel_writer_names: HashMap<String, Vec<String>>,
}

pub struct StmBuilder<T, C> {
    comm: Arc<C>,
    staged: Option<Staged<T, C>>,
}

impl<T, C> StmBuilder<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Communicator<T> + 'static,
{
    pub fn new(comm: Arc<C>) -> Self {
        Self {
            comm,
            staged: Some(Staged { local_channels: HashMap::new(), channel_reader_names: HashMap::new(), channel_writer_names: HashMap::new() }),
        }
    }

    fn staged_mut(&mut self) -> &mut Staged<T, C> {
        self.staged.as_mut().expect("StmBuilder method called after build()")
    }

    /// Mark this rank as home of every channel in `names`.
    pub fn create_channels<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let comm = self.comm.clone();
        let staged = self.staged_mut();
        for name in names {
            let name = name.into();
            staged.local_channels.insert(name.clone(), Arc::new(Channel::new(name, comm.clone())));
        }
        self
    }

    /// Declare a reader of `channel` named `reader_name`, on this rank.
    pub fn create_reader(&mut self, channel: impl Into<String>, reader_name: impl Into<String>) -> &mut Self {
        let channel = channel.into();
        let reader_name = reader_name.into();
        self.staged_mut().channel_reader_names.entry(channel).or_default().push(reader_name);
        self
    }

    /// Declare a writer of `channel` named `writer_name`, on this rank.
    pub fn create_writer(&mut self, channel: impl Into<String>, writer_name: impl Into<String>) -> &mut Self {
        let channel = channel.into();
        let writer_name = writer_name.into();
        self.staged_mut().channel_writer_names.entry(channel).or_default().push(writer_name);
        self
    }

    /// Run the two collective exchanges (channel discovery, then reader and
    /// writer attachment) and produce a frozen runtime. Consumes the staged
    /// declarations; calling `build()` a second time is a configuration
    /// error.
    pub fn build(&mut self) -> Result<Stm<T, C>> {
        let staged = self.staged.take().ok_or(StmError::BuilderAlreadyConsumed)?;
        let rank = self.comm.rank();
        let size = self.comm.size();

        // Phase 1: channel discovery (all-gather).
        let init = ChannelsInit { channels: staged.local_channels.keys().cloned().collect(), source_rank: rank };
        let gathered = self.comm.allgather(init);
        let mut channel_rank: HashMap<String, usize> = HashMap::new();
        for msg in &gathered {
            for name in &msg.channels {
                if let Some(&existing) = channel_rank.get(name) {
                    if existing != msg.source_rank {
                        return Err(StmError::DuplicateChannel(name.clone()));
                    }
                }
                channel_rank.insert(name.clone(), msg.source_rank);
            }
        }

        for channel in staged.channel_reader_names.keys().chain(staged.channel_writer_names.keys()) {
            if !channel_rank.contains_key(channel) {
                return Err(StmError::UnknownChannel(channel.clone()));
            }
        }

        let mut readers_by_id: HashMap<String, Arc<Reader<T, C>>> = HashMap::new();
        let mut readers_by_channel: HashMap<String, Vec<Arc<Reader<T, C>>>> = HashMap::new();
        let mut writers_by_id: HashMap<String, Arc<Writer<T, C>>> = HashMap::new();

        // Locally-homed readers/writers wire immediately against the local channel.
        for (channel, ch) in &staged.local_channels {
            if let Some(names) = staged.channel_reader_names.get(channel) {
                for reader_name in names {
                    let reader = Arc::new(Reader::new(reader_name.clone(), channel.clone(), rank, self.comm.clone()));
                    ch.attach_local_reader(reader.clone());
                    readers_by_id.insert(reader_name.clone(), reader.clone());
                    readers_by_channel.entry(channel.clone()).or_default().push(reader);
                }
            }
            if let Some(names) = staged.channel_writer_names.get(channel) {
                for writer_name in names {
                    ch.attach_writer(writer_name);
                    writers_by_id.insert(writer_name.clone(), Arc::new(Writer::new(writer_name.clone(), channel.clone(), rank, self.comm.clone())));
                }
            }
        }

        // Phase 2a: reader attachment exchange (all-to-all).
        let mut reader_attachments: Vec<Vec<Attachment>> = vec![Vec::new(); size];
        for (channel, reader_names) in &staged.channel_reader_names {
            if staged.local_channels.contains_key(channel) {
                continue; // already wired above
            }
            let home = channel_rank[channel];
            for reader_name in reader_names {
                let reader = Arc::new(Reader::new(reader_name.clone(), channel.clone(), home, self.comm.clone()));
                readers_by_id.insert(reader_name.clone(), reader.clone());
                readers_by_channel.entry(channel.clone()).or_default().push(reader);
                reader_attachments[home].push(Attachment { channel: channel.clone(), name: reader_name.clone() });
            }
        }
        let reader_connections = self.comm.alltoall(reader_attachments);
        for (source_rank, attachments) in reader_connections.into_iter().enumerate() {
            for attachment in attachments {
                if let Some(ch) = staged.local_channels.get(&attachment.channel) {
                    ch.attach_remote_reader(source_rank, &attachment.name);
                }
            }
        }

        // Phase 2b: writer attachment exchange (all-to-all).
        let mut writer_attachments: Vec<Vec<Attachment>> = vec![Vec::new(); size];
        for (channel, writer_names) in &staged.channel_writer_names {
            if staged.local_channels.contains_key(channel) {
                continue;
            }
            let home = channel_rank[channel];
            for writer_name in writer_names {
                writers_by_id.insert(writer_name.clone(), Arc::new(Writer::new(writer_name.clone(), channel.clone(), home, self.comm.clone())));
                writer_attachments[home].push(Attachment { channel: channel.clone(), name: writer_name.clone() });
            }
        }
        let writer_connections = self.comm.alltoall(writer_attachments);
        for attachments in writer_connections {
            for attachment in attachments {
                if let Some(ch) = staged.local_channels.get(&attachment.channel) {
                    ch.attach_writer(&attachment.name);
                }
            }
        }

        tracing::info!(rank, channels = staged.local_channels.len(), "STM build complete");

        Ok(Stm::new(self.comm.clone(), staged.local_channels, channel_rank, readers_by_id, readers_by_channel, writers_by_id))
    }
}
