//! The handle through which SPMD code talks to the runtime.

use crate::err::{AbortReason, Error, MisuseError};
use crate::id_space::IdSpace;
use crate::inbox::{Inbox, Message};
use crate::queue::{GetRequest, HpSendRequest, PushRequest};
use crate::run::{Run, WorkerSlot};
use crate::sync::{self, Arc, Ordering};
use crate::types::{Address, ByteSize, LogicalId, WorkerIndex};
use std::time::Instant;
use tracing::{instrument, trace};

/// One of the P workers of a run.
///
/// Every primitive that communicates only queues the operation. Nothing becomes visible to its
/// addressee, the calling worker included, before the next [Worker::sync] returns.
///
/// Once the run has been aborted every fallible primitive returns the same [Error::Aborted], which
/// the SPMD function is expected to propagate.
#[derive(Debug)]
pub struct Worker {
    pub(crate) index: WorkerIndex,
    pub(crate) run: Arc<Run>,
    pub(crate) ids: IdSpace,
    pub(crate) inbox: Inbox,
    /// Map entries to add once the synchronization in progress passed its final barrier.
    pub(crate) pending_map_inserts: Vec<(Address, LogicalId)>,
    pub(crate) ended: bool,
    start: Instant,
}

impl Worker {
    pub(crate) fn new(index: WorkerIndex, run: Arc<Run>) -> Self {
        Self {
            index,
            run,
            ids: IdSpace::new(),
            inbox: Inbox::new(),
            pending_map_inserts: Vec::new(),
            ended: false,
            start: Instant::now(),
        }
    }

    /// The index of this worker, in `[0, nprocs)`.
    pub fn pid(&self) -> WorkerIndex {
        self.index
    }

    /// The number of workers in the run.
    pub fn nprocs(&self) -> usize {
        self.run.workers()
    }

    /// Seconds elapsed since this worker started.
    pub fn time(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub(crate) fn slot(&self) -> &WorkerSlot {
        self.run.slot(self.index)
    }

    /// Fail with the recorded error if the run has been aborted.
    pub(crate) fn check_aborted(&self) -> Result<(), Error> {
        if self.run.is_aborted() {
            return Err(self.run.aborted_error(self.index));
        }
        Ok(())
    }

    pub(crate) fn misuse(&self, misuse_error: MisuseError) -> Error {
        self.run.abort(self.index, misuse_error.into())
    }

    /// Abort the run. Every worker observes the returned error at its next primitive, and workers
    /// parked in [Worker::sync] are released with it.
    pub fn abort(&mut self, message: impl Into<String>) -> Error {
        self.run
            .abort(self.index, AbortReason::Requested(message.into()))
    }

    fn check_worker(&self, worker: WorkerIndex) -> Result<(), Error> {
        if worker >= self.nprocs() {
            return Err(self.misuse(MisuseError::InvalidWorker {
                worker,
                workers: self.nprocs(),
            }));
        }
        Ok(())
    }

    /// Resolve `offset` bytes into the memory `address` stands for at `worker`, checking that `len`
    /// bytes fit from there.
    fn resolve(
        &self,
        worker: WorkerIndex,
        address: Address,
        offset: ByteSize,
        len: ByteSize,
    ) -> Result<Address, Error> {
        let id: LogicalId = self
            .slot()
            .lookup(address)
            .ok_or_else(|| self.misuse(MisuseError::UnregisteredAddress { address }))?;
        let entry = self
            .run
            .table
            .get(id, worker)
            .filter(|entry| !entry.address.is_placeholder())
            .ok_or_else(|| self.misuse(MisuseError::NotRegisteredAt { id, worker }))?;
        let in_bounds: bool = offset
            .checked_add(len)
            .is_some_and(|end| end <= entry.size);
        if !in_bounds {
            return Err(self.misuse(MisuseError::OutOfBounds {
                worker,
                offset,
                size: len,
                registered: entry.size,
            }));
        }
        Ok(entry.address.offset(offset))
    }

    /// Register the `size` bytes at `address` for remote access from the next superstep on.
    ///
    /// All workers must register in the same order: the n-th registration of every worker is
    /// backed by the same logical id. [Address::PLACEHOLDER] takes part in a registration without
    /// contributing memory.
    ///
    /// # Safety
    ///
    /// The region must stay valid for reads and writes until it is de-registered, and must not be
    /// accessed by this worker while a [Worker::sync] which may write into it is in progress.
    #[instrument(skip(self), fields(pid = self.index))]
    pub unsafe fn push_reg(&mut self, address: Address, size: ByteSize) -> Result<(), Error> {
        self.check_aborted()?;
        sync::lock(&self.slot().pushes).push(PushRequest { address, size });
        Ok(())
    }

    /// De-register `address` from the next superstep on, in the same order on all workers.
    ///
    /// A [Address::PLACEHOLDER] de-registration only pairs with a placeholder registration. Popping a
    /// real registration with a placeholder frees its logical id but keeps this worker's map entry,
    /// so later accesses through that address reach whatever registration reuses the id.
    #[instrument(skip(self), fields(pid = self.index))]
    pub fn pop_reg(&mut self, address: Address) -> Result<(), Error> {
        self.check_aborted()?;
        sync::lock(&self.slot().pops).push(address);
        Ok(())
    }

    /// Write `source` into `destination`'s counterpart at worker `dest`, `offset` bytes in.
    ///
    /// `source` is copied right away; the write lands at the next synchronization.
    #[instrument(skip(self, source), fields(pid = self.index, len = source.len()))]
    pub fn put(
        &mut self,
        dest: WorkerIndex,
        source: &[u8],
        destination: Address,
        offset: ByteSize,
    ) -> Result<(), Error> {
        self.check_aborted()?;
        self.check_worker(dest)?;
        let target: Address = self.resolve(dest, destination, offset, source.len())?;
        sync::lock(&self.slot().outgoing[dest]).push_write(target, source);
        Ok(())
    }

    /// Read `len` bytes of `source`'s counterpart at worker `src`, `offset` bytes in, into
    /// `destination` at the next synchronization.
    ///
    /// The bytes read are those `src` held when that synchronization started.
    ///
    /// # Safety
    ///
    /// `destination` must be valid for `len` bytes of writes until the next synchronization
    /// returns, and must not be accessed in the meantime.
    #[instrument(skip(self, destination), fields(pid = self.index))]
    pub unsafe fn get(
        &mut self,
        src: WorkerIndex,
        source: Address,
        offset: ByteSize,
        destination: *mut u8,
        len: ByteSize,
    ) -> Result<(), Error> {
        self.check_aborted()?;
        self.check_worker(src)?;
        let source: Address = self.resolve(src, source, offset, len)?;
        sync::lock(&self.slot().requests[src]).push(GetRequest {
            source,
            destination: Address::from(destination),
            len,
        });
        Ok(())
    }

    /// Read `destination.len()` bytes of `source`'s counterpart at worker `src`, `offset` bytes
    /// in, immediately.
    ///
    /// # Safety
    ///
    /// Worker `src` must not be writing to the region in this superstep, and no write into it
    /// may be pending delivery.
    #[instrument(skip(self, destination), fields(pid = self.index, len = destination.len()))]
    pub unsafe fn direct_get(
        &mut self,
        src: WorkerIndex,
        source: Address,
        offset: ByteSize,
        destination: &mut [u8],
    ) -> Result<(), Error> {
        self.check_aborted()?;
        self.check_worker(src)?;
        let source: Address = self.resolve(src, source, offset, destination.len())?;
        // SAFETY: the region was registered at `src` with at least this extent, and the caller
        // guarantees nobody writes to it right now. It may be this worker's own memory, so the
        // regions may overlap.
        unsafe {
            core::ptr::copy(
                source.as_ptr(),
                destination.as_mut_ptr(),
                destination.len(),
            );
        }
        Ok(())
    }

    fn check_tag(&self, tag: &[u8]) -> Result<(), Error> {
        let expected: ByteSize = self.run.tag_size();
        if tag.len() != expected {
            return Err(self.misuse(MisuseError::TagLength {
                expected,
                actual: tag.len(),
            }));
        }
        Ok(())
    }

    /// Send a message to worker `dest`. `tag` must be exactly as long as the active tag size.
    ///
    /// Both are copied right away; the message arrives at the next synchronization.
    #[instrument(skip(self, tag, payload), fields(pid = self.index, len = payload.len()))]
    pub fn send(&mut self, dest: WorkerIndex, tag: &[u8], payload: &[u8]) -> Result<(), Error> {
        self.check_aborted()?;
        self.check_worker(dest)?;
        self.check_tag(tag)?;
        sync::lock(&self.slot().outgoing[dest]).push_message(tag, payload);
        Ok(())
    }

    /// Like [Worker::send], but `tag` and `payload` are read at the next synchronization instead
    /// of being copied now.
    ///
    /// # Safety
    ///
    /// Both buffers must stay valid and unchanged until the next synchronization returns.
    #[instrument(skip(self, tag, payload), fields(pid = self.index, len = payload.len()))]
    pub unsafe fn hpsend(
        &mut self,
        dest: WorkerIndex,
        tag: &[u8],
        payload: &[u8],
    ) -> Result<(), Error> {
        self.check_aborted()?;
        self.check_worker(dest)?;
        self.check_tag(tag)?;
        sync::lock(&self.slot().hpsend[dest]).push(HpSendRequest {
            tag: Address::of_slice(tag),
            tag_len: tag.len(),
            payload: Address::of_slice(payload),
            payload_len: payload.len(),
        });
        Ok(())
    }

    /// Ask for a tag size of `size` bytes from the next superstep on. Every worker has to ask for
    /// the same size.
    ///
    /// Returns the tag size in effect now.
    pub fn set_tag_size(&mut self, size: ByteSize) -> ByteSize {
        self.slot().requested_tag_size.store(size, Ordering::Release);
        self.run.tag_size()
    }

    /// The number of messages received and not yet moved, and their accumulated payload size.
    pub fn qsize(&self) -> (usize, ByteSize) {
        self.inbox.queue_size()
    }

    /// Copy the tag of the next message into `tag`, as far as it fits.
    ///
    /// Returns the payload size of that message, or `None` if there are no messages left.
    pub fn get_tag(&self, tag: &mut [u8]) -> Option<ByteSize> {
        let (top_tag, payload_len) = self.inbox.peek()?;
        let len: usize = top_tag.len().min(tag.len());
        tag[..len].copy_from_slice(&top_tag[..len]);
        Some(payload_len)
    }

    /// Consume the next message, copying its payload into `payload` as far as it fits.
    ///
    /// Returns the full payload size of the message, or `None` if there are no messages left.
    pub fn move_message(&mut self, payload: &mut [u8]) -> Option<ByteSize> {
        let message: Message<'_> = self.inbox.pop()?;
        let len: usize = message.payload.len().min(payload.len());
        payload[..len].copy_from_slice(&message.payload[..len]);
        trace!(
            "worker {}: moved a message of {} bytes",
            self.index,
            message.payload.len()
        );
        Some(message.payload.len())
    }

    /// Consume the next message without copying it.
    pub fn hpmove(&mut self) -> Option<Message<'_>> {
        self.inbox.pop()
    }

    /// End the superstep. Returns once every worker synchronized and all communication queued in
    /// this superstep has been delivered.
    pub fn sync(&mut self) -> Result<(), Error> {
        crate::engine::sync(self)
    }

    /// Leave the program. Every worker has to end, in the same superstep.
    ///
    /// Called automatically when the SPMD function returns successfully without ending.
    pub fn end(&mut self) -> Result<(), Error> {
        crate::engine::end(self)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if std::thread::panicking() && !self.run.is_aborted() {
            self.run.abort(self.index, AbortReason::Panicked);
        }
    }
}
