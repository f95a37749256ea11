//! Reusable rendezvous points for all workers of a run.

mod blocking;
mod spin;

pub use blocking::BlockingBarrier;
pub use spin::SpinBarrier;

use crate::sync::AtomicBool;
use crate::types::WorkerIndex;
use core::fmt::Debug;
use core::str::FromStr;
use displaydoc::Display;

/// The run was aborted while waiting at a barrier.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub struct Aborted;

impl std::error::Error for Aborted {}

/// A barrier which all workers of a run enter once per phase.
///
/// [Barrier::enter] returns `Ok` once every worker entered the same generation. It returns
/// [Aborted] if the `abort` flag is observed before that; a generation which was already complete
/// still counts as passed, even if a faster peer aborted in the meantime. A worker released by an
/// abort must not resume the protocol.
pub trait Barrier: Debug + Send + Sync {
    fn enter(&self, worker: WorkerIndex, abort: &AtomicBool) -> Result<(), Aborted>;

    /// Wake every parked worker so it re-checks the abort flag. Called after the flag is set.
    fn interrupt(&self);
}

/// Which [Barrier] implementation a run uses.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum BarrierKind {
    /// Park waiting workers on a condition variable.
    #[default]
    Blocking,
    /// Busy-wait on one counter per worker. Only sensible when every worker has a core to itself.
    Spin,
}

impl BarrierKind {
    pub(crate) fn build(self, workers: usize) -> Box<dyn Barrier> {
        match self {
            BarrierKind::Blocking => Box::new(BlockingBarrier::new(workers)),
            BarrierKind::Spin => Box::new(SpinBarrier::new(workers)),
        }
    }
}

/// Unknown barrier kind '{0}'; expected 'blocking' or 'spin'.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub struct UnknownBarrierKind(pub String);

impl std::error::Error for UnknownBarrierKind {}

impl FromStr for BarrierKind {
    type Err = UnknownBarrierKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" | "condvar" | "mutex" => Ok(BarrierKind::Blocking),
            "spin" | "spinning" => Ok(BarrierKind::Spin),
            _ => Err(UnknownBarrierKind(s.to_string())),
        }
    }
}

#[cfg(all(test, not(loom), not(feature = "shuttle")))]
mod tests {
    use super::{Barrier, BarrierKind, UnknownBarrierKind};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use test_log::test;

    #[test]
    fn test_parse_barrier_kind() {
        assert_eq!("blocking".parse(), Ok(BarrierKind::Blocking));
        assert_eq!(" Spin ".parse(), Ok(BarrierKind::Spin));
        assert_eq!(
            "fancy".parse::<BarrierKind>(),
            Err(UnknownBarrierKind("fancy".to_string()))
        );
    }

    /// No worker leaves a generation before all of them entered it.
    fn check_lock_step(kind: BarrierKind) {
        const WORKERS: usize = 4;
        const ROUNDS: usize = 50;

        let barrier: Arc<Box<dyn Barrier>> = Arc::new(kind.build(WORKERS));
        let abort: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let arrivals: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        let handles: Vec<thread::JoinHandle<()>> = (0..WORKERS)
            .map(|worker| {
                let barrier = barrier.clone();
                let abort = abort.clone();
                let arrivals = arrivals.clone();
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        arrivals.fetch_add(1, Ordering::SeqCst);
                        barrier.enter(worker, &abort).unwrap();
                        assert!(arrivals.load(Ordering::SeqCst) >= (round + 1) * WORKERS);
                        barrier.enter(worker, &abort).unwrap();
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .for_each(|handle| handle.join().expect("A worker panicked"));
        assert_eq!(arrivals.load(Ordering::SeqCst), WORKERS * ROUNDS);
    }

    /// A worker parked at a barrier which its peers never reach is released by an abort.
    fn check_abort_releases_waiters(kind: BarrierKind) {
        let barrier: Arc<Box<dyn Barrier>> = Arc::new(kind.build(3));
        let abort: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));

        let waiter: thread::JoinHandle<_> = {
            let barrier = barrier.clone();
            let abort = abort.clone();
            thread::spawn(move || barrier.enter(1, &abort))
        };

        thread::sleep(Duration::from_millis(20));
        abort.store(true, Ordering::SeqCst);
        barrier.interrupt();

        assert!(waiter.join().expect("The waiter panicked").is_err());
        assert!(barrier.enter(0, &abort).is_err());
    }

    #[test]
    fn test_blocking_barrier_lock_step() {
        check_lock_step(BarrierKind::Blocking);
    }

    #[test]
    fn test_spin_barrier_lock_step() {
        check_lock_step(BarrierKind::Spin);
    }

    #[test]
    fn test_blocking_barrier_abort() {
        check_abort_releases_waiters(BarrierKind::Blocking);
    }

    #[test]
    fn test_spin_barrier_abort() {
        check_abort_releases_waiters(BarrierKind::Spin);
    }

    #[test]
    fn test_single_worker_never_waits() {
        let abort: AtomicBool = AtomicBool::new(false);
        for kind in [BarrierKind::Blocking, BarrierKind::Spin] {
            let barrier: Box<dyn Barrier> = kind.build(1);
            for _ in 0..300 {
                assert!(barrier.enter(0, &abort).is_ok());
            }
        }
    }
}
