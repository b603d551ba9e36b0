use std::collections::HashSet;

use aya::maps::{HashMap as KernelMap, Map, MapData, MapError};
use thiserror::Error;

use permsnoop_common::{WatchKey, MAX_WATCHED};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch set is full ({MAX_WATCHED} entries)")]
    CapacityExceeded,
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Bookkeeping half of the watch set. Capacity is enforced here, before any
/// kernel map update is issued, so a failed insert leaves both sides
/// untouched.
pub struct Roster {
    entries: HashSet<WatchKey>,
    capacity: usize,
}

impl Roster {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashSet::new(),
            capacity,
        }
    }

    /// Ok(true) for a new key, Ok(false) for one already watched.
    pub fn insert(&mut self, key: WatchKey) -> Result<bool, WatchError> {
        if self.entries.contains(&key) {
            return Ok(false);
        }
        if self.entries.len() >= self.capacity {
            return Err(WatchError::CapacityExceeded);
        }
        self.entries.insert(key);
        Ok(true)
    }

    pub fn remove(&mut self, key: &WatchKey) -> bool {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &WatchKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchKey> {
        self.entries.iter()
    }
}

/// Control-plane view of the kernel watch set: the kernel hash map plus a
/// roster of what was inserted, so removal and teardown know the keys.
pub struct WatchSet {
    map: KernelMap<MapData, WatchKey, u8>,
    roster: Roster,
}

impl WatchSet {
    pub fn new(map: Map) -> Result<Self, WatchError> {
        Ok(Self {
            map: KernelMap::try_from(map)?,
            roster: Roster::new(MAX_WATCHED),
        })
    }

    pub fn insert(&mut self, key: WatchKey) -> Result<(), WatchError> {
        if self.roster.contains(&key) {
            return Ok(());
        }
        self.roster.insert(key)?;
        if let Err(e) = self.map.insert(key, 0u8, 0) {
            self.roster.remove(&key);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &WatchKey) -> Result<(), WatchError> {
        if self.roster.remove(key) {
            self.map.remove(key)?;
        }
        Ok(())
    }

    /// Drops every watched entry; called on detach.
    pub fn clear(&mut self) -> Result<(), WatchError> {
        let keys: Vec<WatchKey> = self.roster.iter().copied().collect();
        for key in keys {
            self.remove(&key)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_exactly_enforced() {
        let mut roster = Roster::new(MAX_WATCHED);
        for i in 0..MAX_WATCHED as u64 {
            assert!(roster.insert(WatchKey::new(0x800003, 1000 + i)).unwrap());
        }
        assert!(matches!(
            roster.insert(WatchKey::new(0x800003, 9_999_999)),
            Err(WatchError::CapacityExceeded)
        ));
        // all prior entries intact and lookupable
        assert_eq!(roster.len(), MAX_WATCHED);
        for i in 0..MAX_WATCHED as u64 {
            assert!(roster.contains(&WatchKey::new(0x800003, 1000 + i)));
        }
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let mut roster = Roster::new(4);
        let key = WatchKey::new(0x800003, 1050);
        assert!(roster.insert(key).unwrap());
        assert!(!roster.insert(key).unwrap());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn remove_frees_a_slot() {
        let mut roster = Roster::new(1);
        let first = WatchKey::new(0x800003, 1050);
        let second = WatchKey::new(0x800003, 1051);
        roster.insert(first).unwrap();
        assert!(matches!(
            roster.insert(second),
            Err(WatchError::CapacityExceeded)
        ));
        assert!(roster.remove(&first));
        assert!(roster.insert(second).unwrap());
        assert!(!roster.contains(&first));
    }

    #[test]
    fn same_inode_on_two_devices_is_two_keys() {
        let mut roster = Roster::new(4);
        let dev1 = WatchKey::new(1, 42);
        let dev2 = WatchKey::new(2, 42);
        roster.insert(dev1).unwrap();
        assert!(!roster.contains(&dev2));
        roster.insert(dev2).unwrap();
        assert_eq!(roster.len(), 2);
        roster.remove(&dev1);
        assert!(roster.contains(&dev2));
    }
}
