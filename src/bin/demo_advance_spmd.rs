// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Three simulated ranks demonstrating `advance_until`'s impossibility floor,
// mirroring `examples/advance-spmd.py`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use stm::{logging, Communicator, InProcessCommunicator, ListeningMode, StmBuilder};

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
    stm.start(ListeningMode::Thread).expect("start");

    match rank {
        0 => {
            let writer = stm.writer(&format!("ch1_writer_{rank}")).unwrap();
            writer.put(1, format!("data({})", 1));
            writer.put(3, format!("data({})", 3));
            writer.put(5, format!("data({})", 5));
            writer.advance_until(3);
            println!("({rank}) advance_until(3)");
            thread::sleep(Duration::from_millis(200));
            writer.put(7, format!("data({})", 7));
        }
        1 => {
            thread::sleep(Duration::from_millis(20));
            let reader = stm.reader(&format!("ch1_reader_{rank}")).unwrap();
            println!("({rank}) get(2)={:?}", reader.get(2)); // null and not possible
            println!("({rank}) get(4)={:?}", reader.get(4)); // null and still possible
            println!("({rank}) consume_until(4)");
            reader.consume_until(4);
            println!("({rank}) get(4)={:?}", reader.get(4)); // null and not possible
            println!("({rank}) get(7)={:?}", reader.get(7)); // null and still possible
        }
        2 => {
            thread::sleep(Duration::from_millis(100));
            let reader = stm.reader(&format!("ch1_reader_{rank}")).unwrap();
            println!("({rank}) consume_until(3)");
            reader.consume_until(3);
            println!("({rank}) get(7)={:?}", reader.get(7)); // null and still possible
            thread::sleep(Duration::from_millis(220));
            println!("({rank}) get(7)={:?}", reader.get(7)); // not null
        }
        _ => unreachable!(),
    }

    stm.stop();
}
