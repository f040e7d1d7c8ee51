// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Host-driven drain loop, mirroring `examples/manual-mode.py`: instead of a
// background thread, the host polls for messages between steps of its own
// discrete-event loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use stm::{logging, Communicator, InProcessCommunicator, ListeningMode, Stm, StmBuilder};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let comms = InProcessCommunicator::<String>::group(3);
    thread::scope(|s| {
        for comm in comms {
            s.spawn(move || run_rank(comm));
        }
    });
}

/// Drain every message currently queued, like the reference script's
/// `PDESEngine.process_messages`.
fn drain(stm: &Stm<String, InProcessCommunicator<String>>) {
    while let Some(msg) = stm.probe() {
        stm.process_message(msg);
    }
}

fn run_rank(comm: InProcessCommunicator<String>) {
    let rank = comm.rank();
    let comm = Arc::new(comm);
    let mut builder = StmBuilder::new(comm);
    if rank == 0 {
        builder.create_channels(["ch1"]).create_writer("ch1", format!("ch1_writer_{rank}"));
    } else {
        builder.create_reader("ch1", format!("ch1_reader_{rank}"));
    }
    let stm = Arc::new(builder.build().expect("build"));
    stm.start(ListeningMode::Manual).expect("start");

    if rank > 0 {
        thread::sleep(Duration::from_millis(200));
    }

    for i in 2..10u64 {
        drain(&stm);
        if rank == 0 {
            let writer = stm.writer(&format!("ch1_writer_{rank}")).unwrap();
            writer.put(i, format!("data({i})"));
            println!("({rank}) put({i})");
            writer.advance_until(i);
        } else {
            let reader = stm.reader(&format!("ch1_reader_{rank}")).unwrap();
            println!("({rank}) time={i} get({})={:?}", i - 1, reader.get(i - 1));
            reader.consume_until(i - 1);
        }
    }

    stm.stop();
}
