use super::{Aborted, Barrier};
use crate::sync::{self, AtomicBool, AtomicU8, Ordering};
use crate::types::WorkerIndex;

/// A barrier where every worker busy-polls a counter per worker.
///
/// Entering bumps the worker's own counter to the generation it is waiting for. A worker may leave
/// once every counter shows either that generation or the next one: a peer which already left and
/// entered the following barrier is one step ahead, but can never be two. Counters wrap, so only
/// these three consecutive values ever need telling apart.
#[derive(Debug)]
pub struct SpinBarrier {
    generations: Box<[AtomicU8]>,
}

impl SpinBarrier {
    pub fn new(workers: usize) -> Self {
        Self {
            generations: (0..workers).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    fn all_reached(&self, generation: u8) -> bool {
        let next: u8 = generation.wrapping_add(1);
        self.generations.iter().all(|cell| {
            let seen: u8 = cell.load(Ordering::Acquire);
            seen == generation || seen == next
        })
    }
}

impl Barrier for SpinBarrier {
    fn enter(&self, worker: WorkerIndex, abort: &AtomicBool) -> Result<(), Aborted> {
        let generation: u8 = self.generations[worker]
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        loop {
            if self.all_reached(generation) {
                return Ok(());
            }
            if abort.load(Ordering::Acquire) {
                return Err(Aborted);
            }
            sync::spin_loop();
        }
    }

    fn interrupt(&self) {
        // spinning workers poll the abort flag themselves
    }
}
