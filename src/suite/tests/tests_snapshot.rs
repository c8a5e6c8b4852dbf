//! Snapshot reads and snapshot scans racing with writers.

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::capability::Operation;
    use crate::data::UInt8;
    use crate::reference::VersionedIndex;
    use crate::report::{Outcome, Skip, Violation};
    use crate::suite::IndexFixture;
    use crate::suite::tests::helpers::{
        PHANTOM_PAYLOAD, SCAN_IGNORES_SNAPSHOT, SNAPSHOT_BLIND, SNAPSHOT_PHANTOM,
        config_with_threads, faulty_fixture, reference_fixture,
    };
    use crate::workload::{AccessPattern, WriteOperation};
    use crate::HarnessError;

    #[test]
    fn snapshot_read__passes_while_others_overwrite() {
        let mut fx = reference_fixture();
        for _ in 0..3 {
            assert_eq!(fx.verify_snapshot_read().unwrap(), Outcome::Passed);
        }
    }

    /// # Scenario
    /// Scan the working range under a snapshot taken before concurrent
    /// writes, updates or deletes.
    ///
    /// # Expected behavior
    /// The scan sees exactly the pristine records.
    #[test]
    fn snapshot_scan__sees_pristine_records() {
        let mut fx = reference_fixture();
        for op in [
            WriteOperation::None,
            WriteOperation::Write,
            WriteOperation::Update,
            WriteOperation::Delete,
        ] {
            for pattern in [AccessPattern::Sequential, AccessPattern::Random] {
                let outcome = fx.verify_snapshot_scan_with(op, pattern).unwrap();
                assert_eq!(outcome, Outcome::Passed, "snapshot scan({op}, {pattern})");
            }
        }
    }

    #[test]
    fn snapshot_scan__insert_is_contract_violation() {
        let mut fx = reference_fixture();
        assert!(matches!(
            fx.verify_snapshot_scan_with(WriteOperation::Insert, AccessPattern::Random),
            Err(HarnessError::ContractViolation(_))
        ));
    }

    #[test]
    fn snapshot__single_thread_is_not_applicable() {
        let mut fx =
            IndexFixture::<UInt8, UInt8, VersionedIndex<u64, u64>>::new(config_with_threads(1)).unwrap();

        let expected = Outcome::NotApplicable(Skip::ThreadCount {
            required: "at least 2",
            actual: 1,
        });
        assert_eq!(fx.verify_snapshot_read().unwrap(), expected);
        assert_eq!(
            fx.verify_snapshot_scan_with(WriteOperation::Write, AccessPattern::Random)
                .unwrap(),
            expected
        );
    }

    /// # Scenario
    /// Snapshot-read against an index whose snapshot reads find nothing.
    ///
    /// # Expected behavior
    /// Every record of the working range is reported missing by the reader.
    #[test]
    fn snapshot_read__blind_index_reports_missing_records() {
        let mut fx = faulty_fixture::<SNAPSHOT_BLIND>();
        let outcome = fx.verify_snapshot_read().unwrap();

        let reader = fx.config().thread_count - 1;
        let working = fx.generator().end_id() - fx.generator().first_id();
        assert_eq!(outcome.violations().len(), working);
        assert!(outcome.violations().iter().all(|v| matches!(
            v,
            Violation::MissingRecord {
                op: Operation::SnapshotRead,
                worker,
                ..
            } if *worker == reader
        )));
    }

    /// # Scenario
    /// Snapshot-read against an index whose snapshot reads return a payload
    /// that was never written.
    ///
    /// # Expected behavior
    /// Every record of the working range is reported as a payload mismatch
    /// carrying the bogus value.
    #[test]
    fn snapshot_read__phantom_payload_is_mismatch() {
        let mut fx = faulty_fixture::<SNAPSHOT_PHANTOM>();
        let outcome = fx.verify_snapshot_read().unwrap();

        let reader = fx.config().thread_count - 1;
        let working = fx.generator().end_id() - fx.generator().first_id();
        let phantom = format!("{PHANTOM_PAYLOAD:?}");
        assert_eq!(outcome.violations().len(), working);
        assert!(outcome.violations().iter().all(|v| matches!(
            v,
            Violation::PayloadMismatch {
                op: Operation::SnapshotRead,
                worker,
                actual,
                ..
            } if *worker == reader && *actual == phantom
        )));
    }

    /// # Scenario
    /// Snapshot-scan under concurrent updates against an index that waits
    /// for the updates, then scans the latest state.
    ///
    /// # Expected behavior
    /// Every record updated by another worker is a scan payload mismatch;
    /// the scanner's own records still match.
    #[test]
    fn snapshot_scan__latest_state_under_updates_is_mismatch() {
        let mut fx = faulty_fixture::<SCAN_IGNORES_SNAPSHOT>();
        let outcome = fx
            .verify_snapshot_scan_with(WriteOperation::Update, AccessPattern::Random)
            .unwrap();

        let t = fx.config().thread_count;
        let scanner = t - 1;
        let updated = (t - 1) * fx.config().exec_count;
        assert_eq!(outcome.violations().len(), updated);
        assert!(outcome.violations().iter().all(|v| matches!(
            v,
            Violation::PayloadMismatch {
                op: Operation::Scan,
                worker,
                record,
                ..
            } if *worker == scanner && record % t != scanner
        )));
    }

    /// # Scenario
    /// Snapshot-scan under concurrent deletes against an index that waits
    /// for the deletes, then scans the latest state.
    ///
    /// # Expected behavior
    /// Only the scanner's own records survive, so the scan ends early.
    #[test]
    fn snapshot_scan__latest_state_under_deletes_ends_early() {
        let mut fx = faulty_fixture::<SCAN_IGNORES_SNAPSHOT>();
        let outcome = fx
            .verify_snapshot_scan_with(WriteOperation::Delete, AccessPattern::Sequential)
            .unwrap();

        let scanner = fx.config().thread_count - 1;
        let (begin, end) = (fx.generator().first_id(), fx.generator().end_id());
        let survivors = fx.config().exec_count;
        assert!(outcome.violations().iter().any(|v| matches!(
            v,
            Violation::ScanEnd {
                worker,
                expected_end,
                actual_end,
            } if *worker == scanner && *expected_end == end && *actual_end == begin + survivors
        )));
    }
}
