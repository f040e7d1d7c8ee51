// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Property tests for reader/writer keeptime and advancetime monotonicity,
// exercised through the public API. The channel-wide GC floor and the
// possible-bit property are tested as white-box properties alongside
// channel.rs/reader.rs, since they need crate-internal wiring hooks.

use std::sync::Arc;

use proptest::prelude::*;

use stm::reader::Reader;
use stm::writer::Writer;
use stm::InProcessCommunicator;

proptest! {
    /// A reader's keeptime is non-decreasing across any sequence of
    /// consume_until calls (I2).
    #[test]
    fn reader_keeptime_monotonic(calls in prop::collection::vec(0u64..50, 0..100)) {
        let comm = Arc::new(InProcessCommunicator::<i64>::group(1).remove(0));
        let reader: Reader<i64, InProcessCommunicator<i64>> = Reader::new("r0", "ch1", 0, comm);

        let mut prev = 0u64;
        for t in calls {
            reader.consume_until(t);
            let now = reader.keeptime();
            prop_assert!(now >= prev);
            prev = now;
        }
    }

    /// A writer's advancetime is non-decreasing across any sequence of
    /// advance_until calls (I3).
    #[test]
    fn writer_advancetime_monotonic(calls in prop::collection::vec(0u64..50, 0..100)) {
        let comm = Arc::new(InProcessCommunicator::<i64>::group(1).remove(0));
        let writer: Writer<i64, InProcessCommunicator<i64>> = Writer::new("w0", "ch1", 0, comm);

        let mut prev = 0u64;
        for t in calls {
            writer.advance_until(t);
            let now = writer.advancetime();
            prop_assert!(now >= prev);
            prev = now;
        }
    }

}
