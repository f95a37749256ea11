use superstep::{Address, BarrierKind, Error, RunConfig, Worker};
use tracing::debug;

/// Every worker writes its index, as an `f64`, into worker 0's array at the position of its index.
pub(crate) fn put_to_first_worker(workers: usize, barrier: BarrierKind) {
    let program = superstep::init(|worker: &mut Worker| -> Result<(), Error> {
        let pid: usize = worker.pid();
        let mut values: Vec<f64> = vec![-1.0; worker.nprocs()];
        let address: Address = Address::from(values.as_mut_ptr());
        unsafe { worker.push_reg(address, values.len() * core::mem::size_of::<f64>())? };
        worker.sync()?;

        let own: [u8; 8] = (pid as f64).to_ne_bytes();
        worker.put(0, &own, address, pid * core::mem::size_of::<f64>())?;
        assert!(values.iter().all(|value| *value == -1.0));
        worker.sync()?;

        if pid == 0 {
            let expected: Vec<f64> = (0..worker.nprocs()).map(|i| i as f64).collect();
            assert_eq!(values, expected);
        } else {
            assert!(values.iter().all(|value| *value == -1.0));
        }
        debug!("worker {pid}: holds {values:?}");

        worker.pop_reg(address)?;
        worker.sync()?;
        worker.end()
    })
    .with_config(RunConfig::new().with_barrier(barrier));

    let result: Result<(), Error> = program.begin(workers);
    assert_eq!(result, Ok(()));
}
