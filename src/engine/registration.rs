//! Resolution of the registrations and de-registrations issued in a superstep.
//!
//! Records are matched up across workers by their position in each worker's list. A placeholder
//! record borrows the address of the first worker with a real one at the same position, and is
//! resolved in that worker's address map. Every worker therefore walks the same ids in the same
//! order and its [crate::id_space::IdSpace] stays in step with everyone else's.

use crate::address_table::TableEntry;
use crate::err::{Error, MisuseError};
use crate::queue::PushRequest;
use crate::run::{Run, WorkerSlot};
use crate::sync;
use crate::types::{Address, LogicalId, WorkerIndex};
use crate::worker::Worker;
use tracing::{debug, instrument, warn};

/// The worker whose map resolves the record at `position`, and the address to look up there.
///
/// Returns `None` if every worker has a placeholder at `position`.
fn borrow_address<F>(
    run: &Run,
    me: WorkerIndex,
    position: usize,
    own: Address,
    record_at: F,
) -> Option<(WorkerIndex, Address)>
where
    F: Fn(&WorkerSlot, usize) -> Option<Address>,
{
    if !own.is_placeholder() {
        return Some((me, own));
    }
    run.slots()
        .iter()
        .enumerate()
        .find_map(|(worker, slot)| {
            record_at(slot, position)
                .filter(|address| !address.is_placeholder())
                .map(|address| (worker, address))
        })
}

/// Remove this worker's table entries for every de-registration, in issue order.
///
/// Map entries are only scheduled for removal: peers may still be resolving placeholders against
/// this worker's map until the mid barrier.
#[instrument(skip_all, fields(pid = worker.index))]
pub(super) fn resolve_pops(worker: &mut Worker, run: &Run) -> Result<(), Error> {
    let me: WorkerIndex = worker.index;
    let pops: Vec<Address> = sync::lock(&run.slot(me).pops).clone();
    let mut removals: Vec<Address> = Vec::new();

    for (position, &own) in pops.iter().enumerate() {
        let Some((owner, address)) = borrow_address(run, me, position, own, |slot, position| {
            sync::lock(&slot.pops).get(position).copied()
        }) else {
            warn!("worker {me}: every worker de-registered a placeholder at position {position}; ignoring it");
            continue;
        };

        let id: LogicalId = run
            .slot(owner)
            .lookup(address)
            .ok_or_else(|| worker.misuse(MisuseError::UnregisteredAddress { address }))?;
        let remaining: usize = run
            .table
            .delete(id, me)
            .ok_or_else(|| worker.misuse(MisuseError::NotRegisteredAt { id, worker: me }))?;

        if remaining == 0 {
            if !own.is_placeholder() {
                removals.push(own);
            }
            worker.ids.release(id);
        }
        debug!("worker {me}: de-registered {address} from logical id {id}, {remaining} registrations left");
    }

    *sync::lock(&run.slot(me).map_removals) = removals;
    Ok(())
}

/// Drop the map entries scheduled by [resolve_pops].
pub(super) fn apply_map_removals(run: &Run, me: WorkerIndex) {
    let slot: &WorkerSlot = run.slot(me);
    sync::lock(&slot.pops).clear();
    let removals: Vec<Address> = sync::lock(&slot.map_removals).clone();
    if removals.is_empty() {
        return;
    }
    let mut address_map = sync::write(&slot.address_map);
    for address in removals {
        address_map.remove(address);
    }
}

/// Add this worker's table entries for every registration, in issue order.
///
/// An address which is already mapped keeps its id and stacks another extent on it. Peers' maps
/// are consulted as they will be once this synchronization completes, whichever of them already
/// dropped their de-registered entries.
#[instrument(skip_all, fields(pid = worker.index))]
pub(super) fn resolve_pushes(worker: &mut Worker, run: &Run) {
    let me: WorkerIndex = worker.index;
    let pushes: Vec<PushRequest> = sync::lock(&run.slot(me).pushes).clone();
    // ids minted so far in this synchronization, keyed like the map lookups which would find them
    let mut minted: Vec<(WorkerIndex, Address, LogicalId)> = Vec::new();

    for (position, request) in pushes.iter().enumerate() {
        let Some((owner, address)) =
            borrow_address(run, me, position, request.address, |slot, position| {
                sync::lock(&slot.pushes)
                    .get(position)
                    .map(|request| request.address)
            })
        else {
            warn!("worker {me}: every worker registered a placeholder at position {position}; ignoring it");
            continue;
        };

        let existing: Option<LogicalId> = minted
            .iter()
            .find(|(worker, minted_address, _)| *worker == owner && *minted_address == address)
            .map(|(_, _, id)| *id)
            .or_else(|| run.slot(owner).lookup_committed(address));

        let id: LogicalId = match existing {
            Some(id) => id,
            None => {
                let id: LogicalId = worker.ids.mint();
                minted.push((owner, address, id));
                if !request.address.is_placeholder() {
                    worker.pending_map_inserts.push((request.address, id));
                }
                id
            }
        };

        run.table.set(
            id,
            me,
            TableEntry {
                address: request.address,
                size: request.size,
            },
        );
        debug!(
            "worker {me}: registered {} ({} bytes) as logical id {id}",
            request.address, request.size
        );
    }
}

/// Publish the map entries of new registrations and forget this superstep's requests.
pub(super) fn commit(worker: &mut Worker, run: &Run) {
    let slot: &WorkerSlot = run.slot(worker.index);
    if !worker.pending_map_inserts.is_empty() {
        let mut address_map = sync::write(&slot.address_map);
        for (address, id) in worker.pending_map_inserts.drain(..) {
            address_map.insert(address, id);
        }
    }
    sync::lock(&slot.pushes).clear();
    sync::lock(&slot.map_removals).clear();
}
