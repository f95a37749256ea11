//! The superstep boundary.
//!
//! A synchronization runs in three phases separated by barriers:
//!
//! 1. After the entry barrier every worker answers the reads addressed to it and resolves its
//!    de-registrations. Address maps are only read in this phase.
//! 2. After the mid barrier every worker drops the map entries of its de-registrations, resolves
//!    its registrations against its peers' maps, and delivers everything addressed to it into its
//!    own memory and inbox.
//! 3. After the final barrier every worker adds the map entries of its new registrations.
//!
//! An abort is only ever raised before the mid barrier, so either all communication of a
//! superstep is delivered or none of it is.

mod delivery;
mod registration;

use crate::address_map::AddressMap;
use crate::err::{Error, MisuseError};
use crate::run::Run;
use crate::sync::{self, Arc, Ordering};
use crate::types::{ByteSize, WorkerIndex};
use crate::worker::Worker;
use tracing::{debug, instrument, trace};

#[instrument(skip(worker), fields(pid = worker.index))]
pub(crate) fn sync(worker: &mut Worker) -> Result<(), Error> {
    worker.check_aborted()?;
    if worker.ended {
        return Err(worker.misuse(MisuseError::SyncAfterEnd));
    }
    let run: Arc<Run> = worker.run.clone();
    let me: WorkerIndex = worker.index;

    // messages are only readable in the superstep after the one they were sent in
    worker.inbox.clear();

    run.enter_barrier(me)?;
    if run.ended.load(Ordering::Acquire) {
        return Err(worker.misuse(MisuseError::MismatchedSyncAndEnd));
    }
    trace!("worker {me}: passed the entry barrier");

    agree_on_tag_size(worker, &run)?;
    delivery::answer_gets(&run, me);
    registration::resolve_pops(worker, &run)?;

    run.enter_barrier(me)?;
    trace!("worker {me}: passed the mid barrier");

    registration::apply_map_removals(&run, me);
    registration::resolve_pushes(worker, &run);
    delivery::deliver(worker, &run);

    run.enter_barrier(me)?;
    trace!("worker {me}: passed the final barrier");

    registration::commit(worker, &run);
    Ok(())
}

/// Make worker 0's requested tag size the active one, failing if any worker asked for another.
fn agree_on_tag_size(worker: &Worker, run: &Run) -> Result<(), Error> {
    let requested: ByteSize = worker
        .slot()
        .requested_tag_size
        .load(Ordering::Acquire);
    let authoritative: ByteSize = run.slot(0).requested_tag_size.load(Ordering::Acquire);
    if requested != authoritative {
        return Err(worker.misuse(MisuseError::TagSizeMismatch {
            worker: worker.index,
            requested,
            authoritative,
        }));
    }
    if worker.index == 0 && run.tag_size() != authoritative {
        debug!("worker 0: tag size changes to {authoritative} bytes");
        run.tag_size.store(authoritative, Ordering::Release);
    }
    Ok(())
}

/// Leave the program together with every other worker, then release this worker's share of the
/// run.
///
/// Communication still queued is discarded, as is anything registered.
#[instrument(skip(worker), fields(pid = worker.index))]
pub(crate) fn end(worker: &mut Worker) -> Result<(), Error> {
    worker.check_aborted()?;
    if worker.ended {
        return Ok(());
    }
    let run: Arc<Run> = worker.run.clone();
    let me: WorkerIndex = worker.index;

    run.ended.store(true, Ordering::Release);
    worker.ended = true;
    run.enter_barrier(me)?;

    let slot = run.slot(me);
    slot.discard_communication();
    let registered: usize =
        core::mem::replace(&mut *sync::write(&slot.address_map), AddressMap::new()).len();
    run.table.clear_worker(me);
    worker.inbox.clear();
    worker.pending_map_inserts.clear();
    debug!(
        "worker {me}: ended after {:.6}s, dropping {registered} registered addresses and {} logical ids",
        worker.time(),
        worker.ids.live()
    );
    Ok(())
}
