//! Moving queued communication to its addressee.

use crate::queue::{CommQueue, Delivery, GetRequest, HpSendRequest};
use crate::run::Run;
use crate::sync::{self, MutexGuard};
use crate::types::{Address, ByteSize, WorkerIndex};
use crate::worker::Worker;
use tracing::{instrument, trace};

/// # Safety
///
/// `len` bytes at `address` must be valid for reads for the returned lifetime.
unsafe fn borrow_bytes<'a>(address: Address, len: ByteSize) -> &'a [u8] {
    unsafe { core::slice::from_raw_parts(address.as_ptr(), len) }
}

/// Answer every read addressed to `me` by queueing the bytes read as a write back to the
/// requester.
#[instrument(skip(run))]
pub(super) fn answer_gets(run: &Run, me: WorkerIndex) {
    for (requester, slot) in run.slots().iter().enumerate() {
        let requests: Vec<GetRequest> = core::mem::take(&mut *sync::lock(&slot.requests[me]));
        if requests.is_empty() {
            continue;
        }

        let mut replies: MutexGuard<'_, CommQueue> = sync::lock(&run.slot(me).outgoing[requester]);
        for request in requests {
            // SAFETY: the source was resolved within a region `me` registered, and `me` does not
            // write to its registered memory before the delivery phase.
            let bytes: &[u8] = unsafe { borrow_bytes(request.source, request.len) };
            replies.push_write(request.destination, bytes);
            trace!(
                "worker {me}: answered a get of {} bytes for worker {requester}",
                request.len
            );
        }
    }
}

/// Deliver everything addressed to this worker, source by source.
///
/// Unbuffered sends of a source come before its queued records, which are delivered in the order
/// they were issued, so the last write to a location wins.
#[instrument(skip_all, fields(pid = worker.index))]
pub(super) fn deliver(worker: &mut Worker, run: &Run) {
    let me: WorkerIndex = worker.index;
    for (source, slot) in run.slots().iter().enumerate() {
        let hpsends: Vec<HpSendRequest> = core::mem::take(&mut *sync::lock(&slot.hpsend[me]));
        for request in hpsends {
            // SAFETY: the sender keeps both buffers valid and unchanged until this synchronization
            // returns.
            let (tag, payload) = unsafe {
                (
                    borrow_bytes(request.tag, request.tag_len),
                    borrow_bytes(request.payload, request.payload_len),
                )
            };
            worker.inbox.push(tag, payload);
        }

        let mut queue: MutexGuard<'_, CommQueue> = sync::lock(&slot.outgoing[me]);
        if queue.is_empty() {
            continue;
        }
        trace!("worker {me}: delivering {} records from worker {source}", queue.len());
        let inbox = &mut worker.inbox;
        queue.drain(|delivery| match delivery {
            Delivery::Write {
                destination,
                payload,
            } => {
                // SAFETY: `destination` lies within memory this worker registered, or is the
                // target of one of its own gets; neither is accessed during synchronization.
                unsafe {
                    core::ptr::copy_nonoverlapping(
                        payload.as_ptr(),
                        destination.as_mut_ptr(),
                        payload.len(),
                    );
                }
            }
            Delivery::Message { tag, payload } => inbox.push(tag, payload),
        });
    }
}
