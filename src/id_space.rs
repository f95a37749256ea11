use crate::types::LogicalId;
use std::collections::BTreeSet;

/// The logical ids one worker has handed out.
///
/// Every worker owns its own [IdSpace] and applies the same sequence of mints and releases to it,
/// so all of them agree on the id of each registration without consulting each other.
#[derive(Debug, Default)]
pub(crate) struct IdSpace {
    /// Every id below `next` was issued at some point.
    next: LogicalId,
    /// Released ids below `next`, reused smallest first.
    free: BTreeSet<LogicalId>,
}

impl IdSpace {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mint(&mut self) -> LogicalId {
        if let Some(id) = self.free.pop_first() {
            return id;
        }
        let id: LogicalId = self.next;
        self.next += 1;
        id
    }

    pub(crate) fn release(&mut self, id: LogicalId) {
        if id >= self.next {
            return;
        }
        self.free.insert(id);
        // keep the free set from growing past the live ids
        while self.next > 0 && self.free.remove(&(self.next - 1)) {
            self.next -= 1;
        }
    }

    /// The number of ids currently issued and not released.
    pub(crate) fn live(&self) -> usize {
        self.next - self.free.len()
    }
}
