//! A multicore Bulk Synchronous Parallel runtime.
//!
//! A run starts P workers which all execute the same function, in lock-step supersteps separated
//! by [Worker::sync]. Within a superstep a worker computes locally and queues communication:
//! writes into and reads from memory its peers registered ([Worker::put], [Worker::get]) and
//! tagged messages ([Worker::send]). Everything queued in a superstep is delivered by the
//! synchronization which ends it, and by no earlier one.
//!
//! ```no_run
//! use superstep::{Address, Error, Worker};
//!
//! let program = superstep::init(|worker: &mut Worker| -> Result<(), Error> {
//!     let mut values: Vec<f64> = vec![0.0; worker.nprocs()];
//!     let address: Address = Address::from(values.as_mut_ptr());
//!     // SAFETY: `values` outlives the registration and is not touched while synchronizing.
//!     unsafe { worker.push_reg(address, values.len() * 8)? };
//!     worker.sync()?;
//!
//!     let own: [u8; 8] = (worker.pid() as f64).to_ne_bytes();
//!     worker.put(0, &own, address, worker.pid() * 8)?;
//!     worker.sync()?;
//!     if worker.pid() == 0 {
//!         assert_eq!(values, (0..worker.nprocs()).map(|i| i as f64).collect::<Vec<_>>());
//!     }
//!
//!     worker.pop_reg(address)?;
//!     worker.end()
//! });
//! program.begin(4).unwrap();
//! ```

mod address_map;
mod address_table;
pub mod barrier;
pub mod config;
mod engine;
pub mod err;
mod id_space;
mod inbox;
mod launcher;
mod queue;
mod run;
mod stack;
mod sync;
mod types;
mod worker;

pub use barrier::{Barrier, BarrierKind, BlockingBarrier, SpinBarrier};
pub use config::RunConfig;
pub use err::{AbortReason, Error, MisuseError};
pub use inbox::Message;
pub use launcher::{available_workers, init, Program};
pub use types::{Address, LogicalId, WorkerIndex};
pub use worker::Worker;
