//! Specialized collection types

pub use slotmap::{new_key_type, Key, KeyData, SlotMap};

/// Slot index packed into the low 32 bits of a slot map key
///
/// The index stays fixed while the key is live and is reused after removal.
/// The version in the high bits is what tells a stale key from the new occupant.
pub fn slot_index<K: Key>(key: K) -> u32 {
    (key.data().as_ffi() & u64::from(u32::MAX)) as u32
}

/// Version half of a slot map key
pub fn slot_version<K: Key>(key: K) -> u32 {
    (key.data().as_ffi() >> 32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    new_key_type! { struct TestKey; }

    #[test]
    fn test_slot_index_is_stable_and_reused() {
        let mut map: SlotMap<TestKey, &str> = SlotMap::with_key();
        let a = map.insert("a");
        let b = map.insert("b");
        assert_ne!(slot_index(a), slot_index(b));

        map.remove(a);
        let c = map.insert("c");

        assert_eq!(slot_index(c), slot_index(a));
        assert_ne!(slot_version(c), slot_version(a));
        assert!(map.get(a).is_none());
        assert_eq!(map.get(c), Some(&"c"));
    }
}
