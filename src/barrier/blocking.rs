use super::{Aborted, Barrier};
use crate::sync::{self, AtomicBool, Condvar, Mutex, MutexGuard, Ordering};
use crate::types::WorkerIndex;
use tracing::trace;

#[derive(Debug)]
struct Rendezvous {
    arrived: usize,
    generation: usize,
}

/// A barrier which parks waiting workers on a condition variable.
///
/// The last worker to arrive resets the arrival count, advances the generation and wakes everyone
/// up. Waiters wait for the generation to change rather than for the count, so spurious wakeups and
/// fast workers re-entering the next generation cannot release anyone early.
#[derive(Debug)]
pub struct BlockingBarrier {
    workers: usize,
    rendezvous: Mutex<Rendezvous>,
    condvar: Condvar,
}

impl BlockingBarrier {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            rendezvous: Mutex::new(Rendezvous {
                arrived: 0,
                generation: 0,
            }),
            condvar: Condvar::new(),
        }
    }
}

impl Barrier for BlockingBarrier {
    fn enter(&self, worker: WorkerIndex, abort: &AtomicBool) -> Result<(), Aborted> {
        let mut rendezvous: MutexGuard<'_, Rendezvous> = sync::lock(&self.rendezvous);
        if abort.load(Ordering::Acquire) {
            return Err(Aborted);
        }

        rendezvous.arrived += 1;
        if rendezvous.arrived == self.workers {
            rendezvous.arrived = 0;
            rendezvous.generation = rendezvous.generation.wrapping_add(1);
            trace!(
                "worker {worker}: last to arrive, releasing generation {}",
                rendezvous.generation
            );
            self.condvar.notify_all();
            return Ok(());
        }

        let generation: usize = rendezvous.generation;
        while rendezvous.generation == generation {
            if abort.load(Ordering::Acquire) {
                return Err(Aborted);
            }
            rendezvous = self
                .condvar
                .wait(rendezvous)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Ok(())
    }

    fn interrupt(&self) {
        // the lock orders the wakeup after any waiter's last look at the abort flag
        let _rendezvous: MutexGuard<'_, Rendezvous> = sync::lock(&self.rendezvous);
        self.condvar.notify_all();
    }
}
