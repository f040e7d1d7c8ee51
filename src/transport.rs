// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Group-communication transport abstraction. The STM runtime is written
// against this trait and never assumes a concrete transport; real SPMD
// jobs would back it with an MPI binding or similar. `InProcessCommunicator`
// is the one concrete implementation this crate ships: an in-memory
// multi-rank transport used by tests and the demo binaries.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::messaging::{Attachment, ChannelsInit, Message};

pub trait SendHandle: Send {
    fn wait(self: Box<Self>);
    fn is_ready(&self) -> bool;
}

pub trait RecvHandle<T>: Send {
    fn wait(self: Box<Self>) -> Message<T>;
    fn probe(&mut self) -> bool;
}

/// Required operations on a group communicator.
pub trait Communicator<T>: Send + Sync
where
    T: Send + 'static,
{
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn send(&self, dest: usize, msg: Message<T>);
    fn isend(&self, dest: usize, msg: Message<T>) -> Box<dyn SendHandle>;
    fn irecv(&self) -> Box<dyn RecvHandle<T>>;

    fn allgather(&self, value: ChannelsInit) -> Vec<ChannelsInit>;
    fn alltoall(&self, values: Vec<Vec<Attachment>>) -> Vec<Vec<Attachment>>;
}

// ---------------------------------------------------------------------------
// In-process transport
// ---------------------------------------------------------------------------

struct Inbox<T> {
    queue: Mutex<VecDeque<Message<T>>>,
    cond: Condvar,
}

impl<T> Inbox<T> {
    fn new() -> Self {
        Self { queue: Mutex::new(VecDeque::new()), cond: Condvar::new() }
    }

    fn push(&self, msg: Message<T>) {
        self.queue.lock().push_back(msg);
        self.cond.notify_all();
    }
}

/// A rendezvous barrier used to implement `allgather`/`alltoall`: every rank
/// submits a value for the current round and blocks until every rank has
/// submitted, then all see the full set of contributions. Safe to reuse for
/// a second collective call once every rank has left the previous round.
struct Rendezvous<V> {
    size: usize,
    state: Mutex<RendezvousState<V>>,
    cond: Condvar,
}

struct RendezvousState<V> {
    round: u64,
    slots: Vec<Option<V>>,
    arrived: usize,
    leaving: usize,
}

impl<V: Clone> Rendezvous<V> {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(RendezvousState {
                round: 0,
                slots: vec![None; size],
                arrived: 0,
                leaving: 0,
            }),
            cond: Condvar::new(),
        }
    }

    fn exchange(&self, rank: usize, value: V) -> Vec<V> {
        let mut st = self.state.lock();
        let my_round = st.round;
        st.slots[rank] = Some(value);
        st.arrived += 1;
        if st.arrived == self.size {
            self.cond.notify_all();
        } else {
            while st.round == my_round && st.arrived < self.size {
                self.cond.wait(&mut st);
            }
        }
        let result: Vec<V> = st.slots.iter().map(|v| v.clone().expect("rendezvous slot missing after barrier")).collect();
        st.leaving += 1;
        if st.leaving == self.size {
            st.round += 1;
            st.slots = vec![None; self.size];
            st.arrived = 0;
            st.leaving = 0;
            self.cond.notify_all();
        } else {
            while st.round == my_round {
                self.cond.wait(&mut st);
            }
        }
        result
    }
}

struct Group<T> {
    inboxes: Vec<Inbox<T>>,
    channels_init: Rendezvous<ChannelsInit>,
    attachments: Rendezvous<Vec<Vec<Attachment>>>,
}

/// An in-memory stand-in for a real SPMD transport: `size` ranks live as
/// `InProcessCommunicator` handles sharing one [`Group`], typically one per
/// worker thread.
pub struct InProcessCommunicator<T> {
    rank: usize,
    group: Arc<Group<T>>,
}

impl<T: Clone + Send + Sync + 'static> InProcessCommunicator<T> {
    /// Build one communicator handle per rank, `size` in total.
    pub fn group(size: usize) -> Vec<Self> {
        let group = Arc::new(Group {
            inboxes: (0..size).map(|_| Inbox::new()).collect(),
            channels_init: Rendezvous::new(size),
            attachments: Rendezvous::new(size),
        });
        (0..size).map(|rank| Self { rank, group: group.clone() }).collect()
    }
}

struct InProcessSendHandle;

impl SendHandle for InProcessSendHandle {
    fn wait(self: Box<Self>) {}
    fn is_ready(&self) -> bool {
        true
    }
}

struct InProcessRecvHandle<T> {
    group: Arc<Group<T>>,
    rank: usize,
    cached: Option<Message<T>>,
}

impl<T: Send + 'static> RecvHandle<T> for InProcessRecvHandle<T> {
    fn wait(mut self: Box<Self>) -> Message<T> {
        if let Some(msg) = self.cached.take() {
            return msg;
        }
        let inbox = &self.group.inboxes[self.rank];
        let mut q = inbox.queue.lock();
        loop {
            if let Some(msg) = q.pop_front() {
                return msg;
            }
            inbox.cond.wait(&mut q);
        }
    }

    fn probe(&mut self) -> bool {
        if self.cached.is_some() {
            return true;
        }
        let inbox = &self.group.inboxes[self.rank];
        let mut q = inbox.queue.lock();
        if let Some(msg) = q.pop_front() {
            self.cached = Some(msg);
            true
        } else {
            false
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Communicator<T> for InProcessCommunicator<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.inboxes.len()
    }

    fn send(&self, dest: usize, msg: Message<T>) {
        self.group.inboxes[dest].push(msg);
    }

    fn isend(&self, dest: usize, msg: Message<T>) -> Box<dyn SendHandle> {
        self.group.inboxes[dest].push(msg);
        Box::new(InProcessSendHandle)
    }

    fn irecv(&self) -> Box<dyn RecvHandle<T>> {
        Box::new(InProcessRecvHandle { group: self.group.clone(), rank: self.rank, cached: None })
    }

    fn allgather(&self, value: ChannelsInit) -> Vec<ChannelsInit> {
        self.group.channels_init.exchange(self.rank, value)
    }

    fn alltoall(&self, values: Vec<Vec<Attachment>>) -> Vec<Vec<Attachment>> {
        let size = self.size();
        assert_eq!(values.len(), size, "alltoall contribution must have one list per rank");
        let gathered = self.group.attachments.exchange(self.rank, values);
        // Transpose: result[source] = gathered[source][self.rank]
        gathered.into_iter().map(|mut per_dest| std::mem::take(&mut per_dest[self.rank])).collect()
    }
}
