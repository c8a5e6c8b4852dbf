//! Multi-threaded write, insert, update and delete scenarios against the
//! reference indexes.

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::data::{Int8, Original, Ptr, Tagged, UInt4, UInt8, Var};
    use crate::report::{Outcome, Skip};
    use crate::capability::Operation;
    use crate::reference::{HashIndex, VersionedIndex};
    use crate::suite::IndexFixture;
    use crate::suite::tests::helpers::{reference_fixture, small_config};
    use crate::workload::AccessPattern;

    const PATTERNS: [AccessPattern; 3] = [
        AccessPattern::Sequential,
        AccessPattern::Reverse,
        AccessPattern::Random,
    ];

    const FLAGS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];

    /// # Scenario
    /// Every combination of the write-scenario flags under every pattern.
    ///
    /// # Expected behavior
    /// The versioned reference index passes all of them.
    #[test]
    fn writes__all_flag_combinations_pass() {
        let mut fx = reference_fixture();
        for pattern in PATTERNS {
            for (twice, delete) in FLAGS {
                let outcome = fx.verify_writes_with(twice, delete, pattern).unwrap();
                assert_eq!(outcome, Outcome::Passed, "writes({twice}, {delete}, {pattern})");
            }
        }
    }

    #[test]
    fn inserts__all_flag_combinations_pass() {
        let mut fx = reference_fixture();
        for pattern in PATTERNS {
            for (twice, delete) in FLAGS {
                let outcome = fx.verify_inserts_with(twice, delete, pattern).unwrap();
                assert_eq!(outcome, Outcome::Passed, "inserts({twice}, {delete}, {pattern})");
            }
        }
    }

    #[test]
    fn updates__all_flag_combinations_pass() {
        let mut fx = reference_fixture();
        for pattern in PATTERNS {
            for (write, delete) in FLAGS {
                let outcome = fx.verify_updates_with(write, delete, pattern).unwrap();
                assert_eq!(outcome, Outcome::Passed, "updates({write}, {delete}, {pattern})");
            }
        }
    }

    #[test]
    fn deletes__all_flag_combinations_pass() {
        let mut fx = reference_fixture();
        for pattern in PATTERNS {
            for (write, delete) in FLAGS {
                let outcome = fx.verify_deletes_with(write, delete, pattern).unwrap();
                assert_eq!(outcome, Outcome::Passed, "deletes({write}, {delete}, {pattern})");
            }
        }
    }

    /// # Scenario
    /// Run the same scenario twice on one fixture.
    ///
    /// # Expected behavior
    /// Each run starts from an empty index: a first insert pass succeeds
    /// both times.
    #[test]
    fn scenario__every_run_starts_from_empty_index() {
        let mut fx = reference_fixture();
        for _ in 0..2 {
            let outcome = fx
                .verify_inserts_with(false, false, AccessPattern::Sequential)
                .unwrap();
            assert!(outcome.is_passed());
        }
        assert!(fx.data().is_empty());
        assert!(fx.expectations().is_empty());
    }

    #[test]
    fn point_ops__other_data_kinds_pass() {
        let config = small_config();

        let mut fx = IndexFixture::<Int8, Int8, VersionedIndex<i64, i64>>::new(config.clone()).unwrap();
        assert!(fx.verify_writes_with(true, true, AccessPattern::Random).unwrap().is_passed());

        let mut fx = IndexFixture::<UInt4, UInt8, VersionedIndex<u32, u64>>::new(config.clone()).unwrap();
        assert!(fx.verify_updates_with(true, false, AccessPattern::Reverse).unwrap().is_passed());

        let mut fx = IndexFixture::<Var, Var, VersionedIndex<Vec<u8>, Vec<u8>>>::new(config.clone()).unwrap();
        assert!(fx.verify_inserts_with(true, true, AccessPattern::Random).unwrap().is_passed());

        let mut fx = IndexFixture::<Ptr, Ptr, VersionedIndex<Box<u64>, Box<u64>>>::new(config.clone()).unwrap();
        assert!(fx.verify_deletes_with(true, false, AccessPattern::Sequential).unwrap().is_passed());

        let mut fx = IndexFixture::<UInt8, Original, VersionedIndex<u64, Tagged>>::new(config).unwrap();
        assert!(fx.verify_writes_with(true, false, AccessPattern::Sequential).unwrap().is_passed());
    }

    /// # Scenario
    /// Point-operation scenarios against the hash reference index, which
    /// cannot scan.
    ///
    /// # Expected behavior
    /// The scan phase is skipped silently and the scenarios pass.
    #[test]
    fn point_ops__hash_index_passes_without_scan() {
        let mut fx = IndexFixture::<UInt8, UInt8, HashIndex<u64, u64>>::new(small_config()).unwrap();

        for (a, b) in FLAGS {
            assert!(fx.verify_writes_with(a, b, AccessPattern::Random).unwrap().is_passed());
            assert!(fx.verify_inserts_with(a, b, AccessPattern::Random).unwrap().is_passed());
            assert!(fx.verify_updates_with(a, b, AccessPattern::Random).unwrap().is_passed());
            assert!(fx.verify_deletes_with(a, b, AccessPattern::Random).unwrap().is_passed());
        }
    }

    #[test]
    fn scenario__missing_capability_is_not_applicable() {
        let mut fx = IndexFixture::<UInt8, UInt8, HashIndex<u64, u64>>::new(small_config()).unwrap();

        assert_eq!(
            fx.verify_snapshot_read().unwrap(),
            Outcome::NotApplicable(Skip::MissingCapability(Operation::SnapshotRead))
        );
        assert_eq!(
            fx.verify_concurrent_smos().unwrap(),
            Outcome::NotApplicable(Skip::MissingCapability(Operation::Scan))
        );
    }

    #[test]
    fn new__rejects_invalid_config() {
        let config = crate::HarnessConfig {
            exec_count: 0,
            ..small_config()
        };
        assert!(matches!(
            IndexFixture::<UInt8, UInt8, VersionedIndex<u64, u64>>::new(config),
            Err(crate::HarnessError::InvalidConfig(_))
        ));
    }
}
