use crate::types::{Address, ByteSize, LogicalId, WorkerIndex};
use displaydoc::Display;

/// Any error which ends a worker's participation in a run.
///
/// Every error raised by a primitive is an abort of the whole run: once one worker observes it,
/// every other worker observes the same [Error::Aborted] at its next primitive call.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Error {
    /// Worker {worker} aborted the run: {reason}
    Aborted {
        worker: WorkerIndex,
        reason: AbortReason,
    },
    /// Worker {0} panicked and the run was aborted.
    WorkerPanicked(WorkerIndex),
    /// A run needs at least one worker.
    NoWorkers,
}

impl std::error::Error for Error {}

/// Why a run was aborted.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum AbortReason {
    /// {0}
    Requested(String),
    /// {0}
    Misuse(MisuseError),
    /// the SPMD function panicked
    Panicked,
}

impl From<MisuseError> for AbortReason {
    fn from(misuse_error: MisuseError) -> Self {
        AbortReason::Misuse(misuse_error)
    }
}

/// A BSP primitive was called with arguments or at a time which the runtime cannot honour.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum MisuseError {
    /// Address {address} is not registered at this worker.
    UnregisteredAddress { address: Address },

    /// Logical id {id} has no usable registration at worker {worker}.
    NotRegisteredAt { id: LogicalId, worker: WorkerIndex },

    /** Accessing {size} bytes at offset {offset} would go out of bounds of the {registered} bytes
        registered at worker {worker}.
    */
    OutOfBounds {
        worker: WorkerIndex,
        offset: ByteSize,
        size: ByteSize,
        registered: ByteSize,
    },

    /// Worker {worker} requested a tag size of {requested} bytes while worker 0 requested {authoritative}.
    TagSizeMismatch {
        worker: WorkerIndex,
        requested: ByteSize,
        authoritative: ByteSize,
    },

    /// A tag of {actual} bytes was given while the active tag size is {expected} bytes.
    TagLength { expected: ByteSize, actual: ByteSize },

    /// Worker {worker} does not exist in a run of {workers} workers.
    InvalidWorker {
        worker: WorkerIndex,
        workers: usize,
    },

    /// Synchronization was requested after this worker ended the program.
    SyncAfterEnd,

    /// A peer ended the program while this worker called sync.
    MismatchedSyncAndEnd,
}
