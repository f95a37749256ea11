//! The per-worker association between local addresses and logical ids.

use crate::types::{Address, LogicalId};
use tracing::warn;

/// Maps each registered local address of one worker to the logical id it was registered under.
///
/// Entries are kept sorted by address so lookups during `put` are a binary search.
#[derive(Debug, Default)]
pub(crate) struct AddressMap {
    entries: Vec<(Address, LogicalId)>,
}

impl AddressMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, address: Address) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(entry_address, _)| entry_address.cmp(&address))
    }

    /// Associate `address` with `id`. An address which is already mapped keeps its old id.
    pub(crate) fn insert(&mut self, address: Address, id: LogicalId) {
        match self.position(address) {
            Ok(index) => {
                let existing: LogicalId = self.entries[index].1;
                warn!("address {address} is already mapped to logical id {existing}; ignoring the new id {id}");
            }
            Err(index) => self.entries.insert(index, (address, id)),
        }
    }

    pub(crate) fn remove(&mut self, address: Address) -> Option<LogicalId> {
        match self.position(address) {
            Ok(index) => Some(self.entries.remove(index).1),
            Err(_) => {
                warn!("address {address} is not mapped; nothing to remove");
                None
            }
        }
    }

    pub(crate) fn get(&self, address: Address) -> Option<LogicalId> {
        self.position(address)
            .ok()
            .map(|index| self.entries[index].1)
    }
}

#[cfg(test)]
mod tests {
    use super::AddressMap;
    use crate::types::Address;
    use test_log::test;

    #[test]
    fn test_lookups_in_both_directions() {
        let memory: [u8; 32] = [0; 32];
        let base: Address = Address::of_slice(&memory);

        let mut map: AddressMap = AddressMap::new();
        map.insert(base.offset(16), 3);
        map.insert(base, 1);
        map.insert(base.offset(8), 2);

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(base), Some(1));
        assert_eq!(map.get(base.offset(8)), Some(2));
        assert_eq!(map.get(base.offset(4)), None);
    }

    #[test]
    fn test_duplicate_insert_keeps_the_first_id() {
        let memory: [u8; 8] = [0; 8];
        let address: Address = Address::of_slice(&memory);

        let mut map: AddressMap = AddressMap::new();
        map.insert(address, 0);
        map.insert(address, 5);
        assert_eq!(map.get(address), Some(0));
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove(address), Some(0));
        assert_eq!(map.remove(address), None);
        assert_eq!(map.len(), 0);
    }
}
