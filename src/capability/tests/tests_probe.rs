//! Probe routing against a point-only index and a fully capable one.

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::capability::{CapabilityProbe, CapabilitySet, OpOutcome, Operation};
    use crate::data::{UInt8, Var};
    use crate::index::{EpochManager, IndexUnderTest, ScanBound, ScanIter, ScanView};
    use crate::reference::EpochGuard;
    use crate::reference::{EpochClock, HashIndex, KEY_EXISTS, KEY_NOT_EXIST, VersionedIndex};

    type HashProbe<'i> = CapabilityProbe<'i, UInt8, UInt8, HashIndex<u64, u64>>;

    fn open<I: IndexUnderTest<u64, u64, Epochs = EpochClock>>() -> (Arc<EpochClock>, I) {
        let epochs = Arc::new(EpochClock::new());
        let index = I::open(Arc::clone(&epochs), Duration::from_millis(1));
        (epochs, index)
    }

    #[test]
    fn probe__forwards_supported_point_operations() {
        let (_epochs, index) = open::<HashIndex<u64, u64>>();
        let probe = HashProbe::new(&index);

        assert_eq!(probe.write(&1, &10), OpOutcome::Succeeded);
        assert_eq!(probe.insert(&1, &11), OpOutcome::Failed(KEY_EXISTS));
        assert_eq!(probe.update(&1, &12), OpOutcome::Succeeded);
        assert_eq!(probe.read(&1), Some(12));
        assert_eq!(probe.delete(&1), OpOutcome::Succeeded);
        assert_eq!(probe.delete(&1), OpOutcome::Failed(KEY_NOT_EXIST));
        assert_eq!(probe.read(&1), None);
    }

    /// # Scenario
    /// Issue scan, snapshot read and bulkload through a probe over an index
    /// that implements none of them.
    ///
    /// # Expected behavior
    /// The probe answers neutrally without calling the index.
    #[test]
    fn probe__unsupported_operations_are_neutral() {
        let (epochs, index) = open::<HashIndex<u64, u64>>();
        let probe = HashProbe::new(&index);

        assert!(!HashProbe::supports(Operation::Scan));
        assert!(probe.scan(ScanView::Latest, None, None).is_none());

        let (guard, protected) = epochs.protected_epochs();
        assert_eq!(probe.snapshot_read(&1, &guard, &protected), None);

        let keys = [1u64, 2];
        let entries = keys.iter().map(|k| (k, k));
        assert_eq!(probe.bulkload(entries, 2), OpOutcome::Unsupported);
        assert!(index.is_empty());
    }

    #[test]
    fn probe__mutate_dispatches_by_operation() {
        let (_epochs, index) = open::<HashIndex<u64, u64>>();
        let probe = HashProbe::new(&index);

        assert_eq!(probe.mutate(Operation::Insert, &5, &50), OpOutcome::Succeeded);
        assert_eq!(probe.mutate(Operation::Update, &5, &51), OpOutcome::Succeeded);
        assert_eq!(probe.read(&5), Some(51));
        assert_eq!(probe.mutate(Operation::Delete, &5, &0), OpOutcome::Succeeded);
        assert_eq!(probe.mutate(Operation::Scan, &5, &0), OpOutcome::Unsupported);
    }

    #[test]
    fn probe__scan_passes_bounds_through() {
        let epochs = Arc::new(EpochClock::new());
        let index = VersionedIndex::<Vec<u8>, Vec<u8>>::open(Arc::clone(&epochs), Duration::from_millis(1));
        let probe = CapabilityProbe::<Var, Var, _>::new(&index);

        for i in 0..10 {
            let value = format!("{i:011}").into_bytes();
            assert_eq!(probe.write(&value, &value), OpOutcome::Succeeded);
        }

        let begin = format!("{:011}", 2).into_bytes();
        let end = format!("{:011}", 5).into_bytes();
        let scanned: Vec<_> = probe
            .scan(ScanView::Latest, Some((&begin, false)), Some((&end, true)))
            .map(|records| records.map(|(k, _)| k).collect())
            .unwrap_or_default();

        let expected: Vec<_> = (3..=5).map(|i| format!("{i:011}").into_bytes()).collect();
        assert_eq!(scanned, expected);
    }

    /// Remembers the `(key_len, closed)` of every bound it is asked to scan.
    #[derive(Default)]
    struct BoundRecorder {
        bounds: Mutex<Vec<Option<(usize, bool)>>>,
    }

    impl IndexUnderTest<Vec<u8>, Vec<u8>> for BoundRecorder {
        type Epochs = EpochClock;

        const CAPABILITIES: CapabilitySet = CapabilitySet::NONE.with(Operation::Scan);

        fn open(_epochs: Arc<EpochClock>, _epoch_interval: Duration) -> Self {
            Self::default()
        }

        fn read(&self, _key: &Vec<u8>, _key_len: usize) -> Option<Vec<u8>> {
            None
        }

        fn scan<'s>(
            &'s self,
            _view: ScanView<'_, EpochGuard>,
            begin: Option<ScanBound<'_, Vec<u8>>>,
            end: Option<ScanBound<'_, Vec<u8>>>,
        ) -> ScanIter<'s, Vec<u8>, Vec<u8>> {
            let mut bounds = self.bounds.lock().unwrap();
            for bound in [begin, end] {
                bounds.push(bound.map(|b| (b.key_len, b.closed)));
            }
            Box::new(std::iter::empty())
        }
    }

    /// # Scenario
    /// Scan through the capability router with variable-length bounds of different sizes,
    /// then without bounds.
    ///
    /// # Expected behavior
    /// Each bound reaches the index with its own encoded length and closed
    /// flag; absent bounds stay absent.
    #[test]
    fn capability_scan__attaches_encoded_length_to_bounds() {
        let index = BoundRecorder::default();
        let router = CapabilityProbe::<Var, Var, _>::new(&index);

        let short = b"abc".to_vec();
        let long = b"abcdefghij".to_vec();
        assert!(router
            .scan(ScanView::Latest, Some((&short, true)), Some((&long, false)))
            .is_some());
        assert!(router.scan(ScanView::Latest, None, None).is_some());

        assert_eq!(
            *index.bounds.lock().unwrap(),
            vec![Some((3, true)), Some((10, false)), None, None]
        );
    }
}
