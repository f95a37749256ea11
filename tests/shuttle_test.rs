#![cfg(feature = "shuttle")]

mod common;

use common::put_to_first_worker;
use shuttle::scheduler::RandomScheduler;
use shuttle::{Config, PortfolioRunner};
use std::fs::File;
use std::io::Read;
use superstep::BarrierKind;
use test_log::test;

#[test]
fn two_worker_put_shuttle_test() {
    let mut portfolio_runner = PortfolioRunner::new(true, Config::new());
    for _ in 0..8 {
        portfolio_runner.add(RandomScheduler::new(1000usize));
    }
    portfolio_runner.run(|| {
        put_to_first_worker(2, BarrierKind::Blocking);
    });
}

#[test]
fn three_worker_spin_put_shuttle_test() {
    shuttle::check_random(|| put_to_first_worker(3, BarrierKind::Spin), 200);
}

#[allow(dead_code)]
fn replay_test(workers: usize, path_to_failing_iteration: &str) {
    let mut file: File = File::open(path_to_failing_iteration).unwrap();
    let mut replay_string: String = String::new();
    file.read_to_string(&mut replay_string).unwrap();
    shuttle::replay(
        move || put_to_first_worker(workers, BarrierKind::Blocking),
        &replay_string,
    );
}
