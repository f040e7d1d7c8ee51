// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-rank build/put/get, mirroring `examples/basics.py`.

use std::sync::Arc;

use clap::Parser;
use stm::{logging, InProcessCommunicator, ListeningMode, StmBuilder};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let comm = Arc::new(InProcessCommunicator::<String>::group(1).remove(0));
    let mut builder = StmBuilder::new(comm);
    builder.create_channels(["ch1"]).create_reader("ch1", "ch1_reader").create_writer("ch1", "ch1_writer");
    let stm = Arc::new(builder.build().expect("build"));
    stm.start(ListeningMode::Thread).expect("start");

    let reader = stm.reader("ch1_reader").unwrap();
    let writer = stm.writer("ch1_writer").unwrap();

    writer.put(1, "HELLO, THIS IS DATA".to_string());
    // The put is delivered by the background dispatcher thread; give it a
    // moment to land before reading back, same as the reference script's
    // reliance on MPI's own scheduling latency.
    let mut result = reader.get(1);
    for _ in 0..1000 {
        if result.0.is_some() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
        result = reader.get(1);
    }
    println!("{:?}", result);

    stm.stop();
}
