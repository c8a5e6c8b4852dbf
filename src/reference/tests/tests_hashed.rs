#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::capability::{CapabilitySet, Operation};
    use crate::index::{IndexUnderTest, NOT_IMPLEMENTED, SUCCESS};
    use crate::reference::{HashIndex, KEY_EXISTS, KEY_NOT_EXIST};

    #[test]
    fn hash_index__point_operations() {
        let index = HashIndex::<u64, u64>::new();

        assert_eq!(index.insert(&1, &10, 8, 8), SUCCESS);
        assert_eq!(index.insert(&1, &11, 8, 8), KEY_EXISTS);
        assert_eq!(index.update(&2, &20, 8, 8), KEY_NOT_EXIST);
        assert_eq!(index.write(&2, &21, 8, 8), SUCCESS);
        assert_eq!(index.len(), 2);
        assert_eq!(index.delete(&1, 8), SUCCESS);
        assert_eq!(index.delete(&1, 8), KEY_NOT_EXIST);
        assert_eq!(index.read(&2, 8), Some(21));
        assert_eq!(index.read(&1, 8), None);
    }

    #[test]
    fn hash_index__advertises_point_operations_only() {
        let caps = <HashIndex<u64, u64> as IndexUnderTest<u64, u64>>::CAPABILITIES;
        assert_eq!(
            caps.first_missing(&[
                Operation::Write,
                Operation::Insert,
                Operation::Update,
                Operation::Delete
            ]),
            None
        );
        assert!(!caps.supports(Operation::Scan));
        assert!(!caps.supports(Operation::SnapshotRead));
        assert!(!caps.supports(Operation::Bulkload));
        assert_ne!(caps, CapabilitySet::ALL);
    }

    #[test]
    fn hash_index__default_bodies_report_not_implemented() {
        let index = HashIndex::<u64, u64>::default();
        assert_eq!(index.bulkload(Vec::new(), 1), NOT_IMPLEMENTED);
        assert!(index.is_empty());
    }
}
