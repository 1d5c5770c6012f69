use std::collections::HashSet;

use parking_lot::Mutex;

use crate::syntax::normalize_address;

/// Addresses already seen in the current batch.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic insert-if-absent on the normalised address: `true` means the
    /// address was already present.
    pub fn check_and_mark(&self, address: &str) -> bool {
        !self.seen.lock().insert(normalize_address(address))
    }
}
