//! Scenarios must catch, attribute and report deliberate index bugs.

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::capability::Operation;
    use crate::report::Violation;
    use crate::suite::tests::helpers::{
        DELETE_PANICS, INSERT_OVERWRITES, SCAN_REVERSED, faulty_fixture,
    };
    use crate::workload::AccessPattern;

    /// # Scenario
    /// Insert every record twice into an index whose inserts overwrite.
    ///
    /// # Expected behavior
    /// Every second insert is reported as an unexpected success, attributed
    /// to the record's owner.
    #[test]
    fn inserts__overwriting_insert_is_unexpected_success() {
        let mut fx = faulty_fixture::<INSERT_OVERWRITES>();
        let outcome = fx
            .verify_inserts_with(true, false, AccessPattern::Sequential)
            .unwrap();
        assert!(outcome.is_failed());

        let t = fx.config().thread_count;
        let insert_successes: Vec<_> = outcome
            .violations()
            .iter()
            .filter_map(|v| match v {
                Violation::UnexpectedSuccess {
                    op: Operation::Insert,
                    worker,
                    record,
                } => Some((*worker, *record)),
                _ => None,
            })
            .collect();
        assert_eq!(insert_successes.len(), t * fx.config().exec_count);
        assert!(insert_successes.iter().all(|(w, id)| id % t == *w));
    }

    /// # Scenario
    /// Write everything and scan it back from an index whose scans run
    /// backwards.
    ///
    /// # Expected behavior
    /// Reads pass; every scan block reports key mismatches.
    #[test]
    fn writes__reversed_scan_reports_key_mismatch() {
        let mut fx = faulty_fixture::<SCAN_REVERSED>();
        let outcome = fx
            .verify_writes_with(false, false, AccessPattern::Random)
            .unwrap();

        let violations = outcome.violations();
        assert!(!violations.is_empty());
        assert!(violations.iter().all(|v| matches!(
            v,
            Violation::KeyMismatch { .. } | Violation::PayloadMismatch { op: Operation::Scan, .. }
        )));
        for worker in 0..fx.config().thread_count {
            assert!(violations.iter().any(
                |v| matches!(v, Violation::KeyMismatch { worker: w, .. } if *w == worker)
            ));
        }
    }

    /// # Scenario
    /// Delete from an index whose deletes panic.
    ///
    /// # Expected behavior
    /// Every worker's panic is recorded, the harness keeps going, and the
    /// records that should be gone are reported as still present.
    #[test]
    fn deletes__panicking_delete_becomes_violation() {
        let mut fx = faulty_fixture::<DELETE_PANICS>();
        let outcome = fx
            .verify_deletes_with(true, false, AccessPattern::Sequential)
            .unwrap();

        let violations = outcome.violations();
        let t = fx.config().thread_count;
        let panicked = violations
            .iter()
            .filter(|v| matches!(v, Violation::WorkerPanicked { message, .. } if message.contains("corrupted node")))
            .count();
        assert_eq!(panicked, t);
        assert!(violations.iter().any(|v| matches!(
            v,
            Violation::UnexpectedRecord {
                op: Operation::Read,
                ..
            }
        )));
    }
}
