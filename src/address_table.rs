//! The shared registration directory of a run.

use crate::sync::{self, Mutex, RwLock, RwLockReadGuard};
use crate::types::{Address, ByteSize, LogicalId, WorkerIndex};

/// The memory a worker backs a logical id with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct TableEntry {
    pub(crate) address: Address,
    pub(crate) size: ByteSize,
}

/// A registration stack per worker. Registering an address again stacks a new extent on top of the
/// old one; only the topmost is in effect.
type Row = Box<[Mutex<Vec<TableEntry>>]>;

/// Maps `(logical id, worker)` to the address and size registered by that worker.
///
/// Rows are only appended, under the write lock. Each worker only ever mutates its own column, so
/// once a row exists, reads and writes only need the read lock plus the lock of a single slot.
#[derive(Debug)]
pub(crate) struct AddressTable {
    workers: usize,
    rows: RwLock<Vec<Row>>,
}

impl AddressTable {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            workers,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Read-lock the rows, first growing the table until `id` has a row.
    fn rows_with(&self, id: LogicalId) -> RwLockReadGuard<'_, Vec<Row>> {
        {
            let rows: RwLockReadGuard<'_, Vec<Row>> = sync::read(&self.rows);
            if id < rows.len() {
                return rows;
            }
        }
        {
            let mut rows = sync::write(&self.rows);
            while rows.len() <= id {
                let row: Row = (0..self.workers).map(|_| Mutex::new(Vec::new())).collect();
                rows.push(row);
            }
        }
        sync::read(&self.rows)
    }

    /// Register `entry` for `(id, worker)` on top of whatever is registered there already.
    pub(crate) fn set(&self, id: LogicalId, worker: WorkerIndex, entry: TableEntry) {
        let rows: RwLockReadGuard<'_, Vec<Row>> = self.rows_with(id);
        sync::lock(&rows[id][worker]).push(entry);
    }

    pub(crate) fn get(&self, id: LogicalId, worker: WorkerIndex) -> Option<TableEntry> {
        let rows: RwLockReadGuard<'_, Vec<Row>> = sync::read(&self.rows);
        let slot = rows.get(id)?.get(worker)?;
        let entry: Option<TableEntry> = sync::lock(slot).last().copied();
        entry
    }

    /// Remove the topmost registration of `(id, worker)`.
    ///
    /// Returns the number of registrations left at `(id, worker)`, or `None` if there was nothing to
    /// remove.
    pub(crate) fn delete(&self, id: LogicalId, worker: WorkerIndex) -> Option<usize> {
        let rows: RwLockReadGuard<'_, Vec<Row>> = sync::read(&self.rows);
        let slot = rows.get(id)?.get(worker)?;
        let mut stack = sync::lock(slot);
        stack.pop()?;
        Some(stack.len())
    }

    /// Drop every registration of `worker`.
    pub(crate) fn clear_worker(&self, worker: WorkerIndex) {
        let rows: RwLockReadGuard<'_, Vec<Row>> = sync::read(&self.rows);
        rows.iter()
            .filter_map(|row| row.get(worker))
            .for_each(|slot| sync::lock(slot).clear());
    }
}
