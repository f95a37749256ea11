//! State shared by all workers of one run.

use crate::address_map::AddressMap;
use crate::address_table::AddressTable;
use crate::barrier::{Barrier, BarrierKind};
use crate::err::{AbortReason, Error};
use crate::queue::{CommQueue, GetRequest, HpSendRequest, PushRequest};
use crate::sync::{self, AtomicBool, AtomicUsize, Mutex, Ordering, RwLock};
use crate::types::{Address, ByteSize, LogicalId, WorkerIndex};
use tracing::error;

/// The part of a worker which its peers read during synchronization.
///
/// Everything in here is written by the owning worker, except that the answering side of a `get`
/// appends to the owner's outgoing queues. The barrier phases keep readers and writers apart; the
/// locks are uncontended and only there to make the hand-over sound.
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    pub(crate) address_map: RwLock<AddressMap>,
    /// De-registrations issued this superstep, in issue order.
    pub(crate) pops: Mutex<Vec<Address>>,
    /// Registrations issued this superstep, in issue order.
    pub(crate) pushes: Mutex<Vec<PushRequest>>,
    /// Addresses whose map entries are being dropped by the synchronization in progress.
    pub(crate) map_removals: Mutex<Vec<Address>>,
    /// Remote writes and messages, indexed by destination.
    pub(crate) outgoing: Box<[Mutex<CommQueue>]>,
    /// Remote reads, indexed by the worker which must answer them.
    pub(crate) requests: Box<[Mutex<Vec<GetRequest>>]>,
    /// Unbuffered sends, indexed by destination.
    pub(crate) hpsend: Box<[Mutex<Vec<HpSendRequest>>]>,
    /// The tag size this worker asked for from the next superstep on.
    pub(crate) requested_tag_size: AtomicUsize,
}

impl WorkerSlot {
    fn new(workers: usize) -> Self {
        Self {
            address_map: RwLock::new(AddressMap::new()),
            pops: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            map_removals: Mutex::new(Vec::new()),
            outgoing: (0..workers).map(|_| Mutex::new(CommQueue::new())).collect(),
            requests: (0..workers).map(|_| Mutex::new(Vec::new())).collect(),
            hpsend: (0..workers).map(|_| Mutex::new(Vec::new())).collect(),
            requested_tag_size: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lookup(&self, address: Address) -> Option<LogicalId> {
        sync::read(&self.address_map).get(address)
    }

    /// Like [WorkerSlot::lookup], but as if the de-registrations of the synchronization in progress
    /// had already been applied.
    pub(crate) fn lookup_committed(&self, address: Address) -> Option<LogicalId> {
        if sync::lock(&self.map_removals).contains(&address) {
            return None;
        }
        self.lookup(address)
    }

    /// Drop everything queued for delivery. The address map is left alone.
    pub(crate) fn discard_communication(&self) {
        sync::lock(&self.pops).clear();
        sync::lock(&self.pushes).clear();
        sync::lock(&self.map_removals).clear();
        self.outgoing
            .iter()
            .for_each(|queue| sync::lock(queue).clear());
        self.requests
            .iter()
            .for_each(|requests| sync::lock(requests).clear());
        self.hpsend
            .iter()
            .for_each(|requests| sync::lock(requests).clear());
    }
}

#[derive(Debug)]
pub(crate) struct Run {
    workers: usize,
    aborted: AtomicBool,
    abort_reason: Mutex<Option<(WorkerIndex, AbortReason)>>,
    /// Set by the first worker to end the program.
    pub(crate) ended: AtomicBool,
    /// The tag size in effect for the current superstep. Only worker 0 writes it.
    pub(crate) tag_size: AtomicUsize,
    pub(crate) barrier: Box<dyn Barrier>,
    pub(crate) table: AddressTable,
    slots: Box<[WorkerSlot]>,
}

impl Run {
    pub(crate) fn new(workers: usize, barrier: BarrierKind) -> Self {
        Self {
            workers,
            aborted: AtomicBool::new(false),
            abort_reason: Mutex::new(None),
            ended: AtomicBool::new(false),
            tag_size: AtomicUsize::new(0),
            barrier: barrier.build(workers),
            table: AddressTable::new(workers),
            slots: (0..workers).map(|_| WorkerSlot::new(workers)).collect(),
        }
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn slot(&self, worker: WorkerIndex) -> &WorkerSlot {
        &self.slots[worker]
    }

    pub(crate) fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    pub(crate) fn tag_size(&self) -> ByteSize {
        self.tag_size.load(Ordering::Acquire)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Abort the run on behalf of `worker` and wake up every worker parked in the barrier.
    ///
    /// Only the first abort's reason is kept. Returns the error every worker will observe.
    pub(crate) fn abort(&self, worker: WorkerIndex, reason: AbortReason) -> Error {
        {
            let mut recorded = sync::lock(&self.abort_reason);
            if recorded.is_none() {
                error!("worker {worker}: aborting the run: {reason}");
                *recorded = Some((worker, reason));
            }
        }
        self.aborted.store(true, Ordering::SeqCst);
        self.barrier.interrupt();
        self.aborted_error(worker)
    }

    /// The error describing the abort which ended this run.
    pub(crate) fn aborted_error(&self, observer: WorkerIndex) -> Error {
        match sync::lock(&self.abort_reason).as_ref() {
            Some((worker, reason)) => Error::Aborted {
                worker: *worker,
                reason: reason.clone(),
            },
            None => Error::Aborted {
                worker: observer,
                reason: AbortReason::Requested(String::from("aborted")),
            },
        }
    }

    /// Enter the barrier, turning an abort observed there into the run's abort error.
    pub(crate) fn enter_barrier(&self, worker: WorkerIndex) -> Result<(), Error> {
        self.barrier
            .enter(worker, &self.aborted)
            .map_err(|_| self.aborted_error(worker))
    }
}
