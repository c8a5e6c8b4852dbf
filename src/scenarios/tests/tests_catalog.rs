//! Running the whole catalog against the reference indexes.

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::data::UInt8;
    use crate::reference::{HashIndex, VersionedIndex};
    use crate::report::{Outcome, Skip};
    use crate::scenarios::{Scenario, run_catalog};
    use crate::suite::tests::helpers::{Reference, small_config};
    use crate::HarnessError;

    /// # Scenario
    /// Run every catalog entry against the versioned reference index.
    ///
    /// # Expected behavior
    /// Every entry passes; nothing is skipped at four workers.
    #[test]
    fn run_catalog__versioned_index_passes_everything() {
        let results = run_catalog::<UInt8, UInt8, Reference>(&small_config()).unwrap();

        assert_eq!(results.len(), Scenario::ALL.len());
        for (scenario, outcome) in &results {
            assert_eq!(*outcome, Outcome::Passed, "{scenario}");
        }
    }

    /// # Scenario
    /// Run every catalog entry against the hash reference index.
    ///
    /// # Expected behavior
    /// Nothing fails; scenarios needing scans, snapshots or bulk loads are
    /// not applicable.
    #[test]
    fn run_catalog__hash_index_skips_ordered_scenarios() {
        let results = run_catalog::<UInt8, UInt8, HashIndex<u64, u64>>(&small_config()).unwrap();

        assert!(results.iter().all(|(_, o)| !o.is_failed()));
        for (scenario, outcome) in &results {
            let skipped = matches!(
                scenario,
                Scenario::Bulkload { .. }
                    | Scenario::SnapshotRead
                    | Scenario::SnapshotScan { .. }
                    | Scenario::ConcurrentSmos
            ) || scenario.to_string().contains("Scan");
            assert_eq!(outcome.is_not_applicable(), skipped, "{scenario}");
            if let Outcome::NotApplicable(reason) = outcome {
                assert!(matches!(reason, Skip::MissingCapability(_)));
            }
        }
    }

    #[test]
    fn run__single_thread_scenario_uses_sequential_fixture() {
        let config = small_config();
        let scenario = Scenario::ALL
            .iter()
            .find(|s| !s.is_multi_threaded())
            .unwrap();
        assert!(
            scenario
                .run::<UInt8, UInt8, VersionedIndex<u64, u64>>(&config)
                .unwrap()
                .is_passed()
        );
    }

    #[test]
    fn run__invalid_config_stops_catalog() {
        let config = crate::HarnessConfig {
            thread_count: 0,
            ..small_config()
        };
        assert!(matches!(
            run_catalog::<UInt8, UInt8, Reference>(&config),
            Err(HarnessError::InvalidConfig(_))
        ));
    }
}
