// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// End-to-end scenarios S1-S6 against InProcessCommunicator.

mod common;

use std::sync::Arc;
use std::time::Duration;

use stm::{InProcessCommunicator, ListeningMode, StmBuilder};

use common::wait_until;

const TIMEOUT: Duration = Duration::from_secs(2);

/// S1 — basic put/get.
#[test]
fn s1_basic_put_get() {
    let comms = InProcessCommunicator::<String>::group(2);
    let mut builders: Vec<_> = comms.into_iter().map(|c| StmBuilder::new(Arc::new(c))).collect();
    builders[0].create_channels(["ch1"]).create_writer("ch1", "w0");
    builders[1].create_reader("ch1", "r1");
    let stms: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = builders.iter_mut().map(|b| s.spawn(move || Arc::new(b.build().unwrap()))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for stm in &stms {
        stm.start(ListeningMode::Thread).unwrap();
    }

    let writer = stms[0].writer("w0").unwrap();
    let reader = stms[1].reader("r1").unwrap();

    writer.put(1, "D1".to_string());
    wait_until(|| reader.get(1).0.is_some(), TIMEOUT);

    assert_eq!(reader.get(1), (Some("D1".to_string()), true));
    assert_eq!(reader.get(2), (None, true));

    std::thread::scope(|s| {
        for stm in &stms {
            s.spawn(move || stm.stop());
        }
    });
}

/// S2 — advance makes absence final.
#[test]
fn s2_advance_makes_absence_final() {
    let comms = InProcessCommunicator::<String>::group(2);
    let mut builders: Vec<_> = comms.into_iter().map(|c| StmBuilder::new(Arc::new(c))).collect();
    builders[0].create_channels(["ch1"]).create_writer("ch1", "w0");
    builders[1].create_reader("ch1", "r1");
    let stms: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = builders.iter_mut().map(|b| s.spawn(move || Arc::new(b.build().unwrap()))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for stm in &stms {
        stm.start(ListeningMode::Thread).unwrap();
    }

    let writer = stms[0].writer("w0").unwrap();
    let reader = stms[1].reader("r1").unwrap();

    writer.put(1, "D1".to_string());
    writer.put(3, "D3".to_string());
    writer.put(5, "D5".to_string());
    writer.advance_until(3);
    wait_until(|| reader.channel_advancetime() >= 3, TIMEOUT);

    assert_eq!(reader.get(2), (None, false)); // advance=3 > 2, no item
    assert_eq!(reader.get(4), (None, true)); // advance=3 <= 4

    writer.put(7, "D7".to_string());
    wait_until(|| reader.get(7).0.is_some(), TIMEOUT);
    assert_eq!(reader.get(7), (Some("D7".to_string()), true));

    std::thread::scope(|s| {
        for stm in &stms {
            s.spawn(move || stm.stop());
        }
    });
}

/// S3 — consume GC: the home channel only deletes data once every attached
/// reader's keep-time has passed it (the channel-wide min).
#[test]
fn s3_consume_gc() {
    let comms = InProcessCommunicator::<String>::group(3);
    let mut builders: Vec<_> = comms.into_iter().map(|c| StmBuilder::new(Arc::new(c))).collect();
    builders[0].create_channels(["ch1"]).create_writer("ch1", "w0");
    builders[1].create_reader("ch1", "r1");
    builders[2].create_reader("ch1", "r2");
    let stms: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = builders.iter_mut().map(|b| s.spawn(move || Arc::new(b.build().unwrap()))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for stm in &stms {
        stm.start(ListeningMode::Thread).unwrap();
    }

    let writer = stms[0].writer("w0").unwrap();
    let r1 = stms[1].reader("r1").unwrap();
    let r2 = stms[2].reader("r2").unwrap();

    writer.put(1, "D1".to_string());
    writer.put(3, "D3".to_string());
    writer.put(5, "D5".to_string());
    wait_until(|| r2.get(5).0.is_some(), TIMEOUT);

    // Only r1 consumes; r2's keeptime (0) still holds the channel-wide floor
    // at 0, so nothing is deleted yet.
    r1.consume_until(4);
    wait_until(|| stms[0].channel_keeptime("ch1") == Some(0), TIMEOUT);
    assert_eq!(stms[0].channel_contains("ch1", 1), Some(true));
    assert_eq!(stms[0].channel_contains("ch1", 5), Some(true));
    assert_eq!(r1.get(4), (None, false));
    assert_eq!(r1.get(7), (None, true));

    // Once r2 also consumes, the channel-wide floor advances and 1..=3 are GC'd.
    r2.consume_until(3);
    wait_until(|| stms[0].channel_keeptime("ch1") == Some(3), TIMEOUT);
    assert_eq!(stms[0].channel_contains("ch1", 1), Some(false));
    assert_eq!(stms[0].channel_contains("ch1", 3), Some(false));
    assert_eq!(stms[0].channel_contains("ch1", 5), Some(true));

    std::thread::scope(|s| {
        for stm in &stms {
            s.spawn(move || stm.stop());
        }
    });
}

/// S4 — writer-local routing: single rank, no network hop needed.
#[test]
fn s4_writer_local_routing() {
    let comm = Arc::new(InProcessCommunicator::<String>::group(1).remove(0));
    let mut builder = StmBuilder::new(comm);
    builder.create_channels(["ch1"]).create_reader("ch1", "r0").create_writer("ch1", "w0");
    let stm = Arc::new(builder.build().unwrap());
    stm.start(ListeningMode::Thread).unwrap();

    let writer = stm.writer("w0").unwrap();
    let reader = stm.reader("r0").unwrap();

    writer.put(1, "X".to_string());
    wait_until(|| reader.get(1).0.is_some(), TIMEOUT);
    assert_eq!(reader.get(1), (Some("X".to_string()), true));

    stm.stop();
}

/// S5 — shutdown barrier: every rank's dispatcher exits only once it has
/// observed a shutdown message from every rank.
#[test]
fn s5_shutdown_barrier() {
    let comms = InProcessCommunicator::<String>::group(4);
    let mut builders: Vec<_> = comms.into_iter().map(|c| StmBuilder::new(Arc::new(c))).collect();
    let stms: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = builders.iter_mut().map(|b| s.spawn(move || Arc::new(b.build().unwrap()))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for stm in &stms {
        stm.start(ListeningMode::Thread).unwrap();
    }

    std::thread::scope(|s| {
        for stm in &stms {
            s.spawn(move || stm.stop());
        }
    });

    for stm in &stms {
        assert!(stm.shutdown_complete());
    }
}

/// S6 — manual drain: rank 0 puts then advances in a loop, rank 1 drains and
/// observes each put in order.
#[test]
fn s6_manual_drain() {
    let comms = InProcessCommunicator::<u64>::group(2);
    let mut builders: Vec<_> = comms.into_iter().map(|c| StmBuilder::new(Arc::new(c))).collect();
    builders[0].create_channels(["ch1"]).create_writer("ch1", "w0");
    builders[1].create_reader("ch1", "r1");
    let stms: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = builders.iter_mut().map(|b| s.spawn(move || Arc::new(b.build().unwrap()))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for stm in &stms {
        stm.start(ListeningMode::Manual).unwrap();
    }

    let writer = stms[0].writer("w0").unwrap();
    let reader = stms[1].reader("r1").unwrap();

    for i in 1..=5u64 {
        writer.put(i, i * 10);
        writer.advance_until(i);
        wait_until(
            || {
                // Rank 0 also owns the channel, so its own ChannelPut/Advance
                // messages land in its own inbox and need draining too.
                while let Some(msg) = stms[0].probe() {
                    stms[0].process_message(msg);
                }
                while let Some(msg) = stms[1].probe() {
                    stms[1].process_message(msg);
                }
                reader.get(i).0.is_some()
            },
            TIMEOUT,
        );
        assert_eq!(reader.get(i), (Some(i * 10), true));
    }

    for stm in &stms {
        stm.stop();
    }
}
