//! Starting a run and collecting its outcome.

use crate::config::{self, RunConfig};
use crate::err::{AbortReason, Error};
use crate::run::Run;
use crate::sync::{thread, Arc};
use crate::types::WorkerIndex;
use crate::worker::Worker;
use core_affinity::CoreId;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, instrument};

/// An SPMD program: a function every worker of a run executes.
#[derive(Debug)]
pub struct Program<F> {
    spmd: Arc<F>,
    config: RunConfig,
}

/// Prepare `spmd` to be run by [Program::begin].
///
/// The configuration defaults to [RunConfig::from_env].
pub fn init<F>(spmd: F) -> Program<F>
where
    F: Fn(&mut Worker) -> Result<(), Error> + Send + Sync + 'static,
{
    Program {
        spmd: Arc::new(spmd),
        config: RunConfig::from_env(),
    }
}

/// The number of workers the hardware can run in parallel.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(1)
}

impl<F> Program<F>
where
    F: Fn(&mut Worker) -> Result<(), Error> + Send + Sync + 'static,
{
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the program on `workers` workers and wait for all of them.
    ///
    /// The calling thread acts as worker 0. Returns the abort error if the run was aborted, or
    /// [Error::WorkerPanicked] if a worker panicked.
    #[instrument(skip(self))]
    pub fn begin(&self, workers: usize) -> Result<(), Error> {
        if workers == 0 {
            return Err(Error::NoWorkers);
        }
        let run: Arc<Run> = Arc::new(Run::new(workers, self.config.barrier()));
        // read-only configuration, shared outside the model checkers' view
        let placement: Option<std::sync::Arc<[CoreId]>> =
            self.config.placement(workers).map(std::sync::Arc::from);
        info!(
            "starting {workers} workers with the {:?} barrier",
            self.config.barrier()
        );

        let handles: Vec<thread::JoinHandle<()>> = (1..workers)
            .map(|index| {
                let run: Arc<Run> = run.clone();
                let spmd: Arc<F> = self.spmd.clone();
                let placement: Option<std::sync::Arc<[CoreId]>> = placement.clone();
                thread::spawn(move || {
                    config::pin(index, placement.as_deref());
                    execute(index, run, spmd.as_ref());
                })
            })
            .collect();

        config::pin(0, placement.as_deref());
        let own_outcome: std::thread::Result<()> = panic::catch_unwind(AssertUnwindSafe(|| {
            execute(0, run.clone(), self.spmd.as_ref())
        }));

        let mut panicked: Option<WorkerIndex> = own_outcome.is_err().then_some(0);
        for (offset, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                panicked.get_or_insert(offset + 1);
            }
        }

        if run.is_aborted() {
            let error: Error = run.aborted_error(0);
            return Err(match error {
                Error::Aborted {
                    worker,
                    reason: AbortReason::Panicked,
                } => Error::WorkerPanicked(worker),
                error => error,
            });
        }
        if let Some(worker) = panicked {
            return Err(Error::WorkerPanicked(worker));
        }
        debug!("all {workers} workers finished");
        Ok(())
    }
}

/// Run `spmd` as worker `index`, ending it on its behalf if it returns without doing so.
fn execute<F>(index: WorkerIndex, run: Arc<Run>, spmd: &F)
where
    F: Fn(&mut Worker) -> Result<(), Error>,
{
    let mut worker: Worker = Worker::new(index, run);
    match spmd(&mut worker) {
        Ok(()) => {
            if !worker.ended {
                // an abort raised here is recorded on the run
                let _ = worker.end();
            }
        }
        Err(error) => {
            if !worker.run.is_aborted() {
                worker.run.abort(index, AbortReason::Requested(error.to_string()));
            }
        }
    }
}
