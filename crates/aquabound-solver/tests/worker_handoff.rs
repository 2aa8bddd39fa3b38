//! Worker-level hand-off invariants.
//!
//! The stealing protocol promises: a sender never re-explores a shipped
//! slice, it resumes exactly at its hand-off root, and the split is booked
//! as a prune so the statistics account for every subtree.

use aquabound_core::{NetworkBounds, PruneReason};
use aquabound_oracle::AnalyticNetwork;
use aquabound_solver::{BoundsChecker, NodeEvaluator, ScheduleCounter, Worker};

type AnalyticWorker = Worker<
    AnalyticNetwork,
    fn() -> Result<AnalyticNetwork, aquabound_core::OracleError>,
>;

fn make_worker(rank: usize, h_max: usize, active: bool) -> AnalyticWorker {
    let factory: fn() -> Result<AnalyticNetwork, aquabound_core::OracleError> =
        || Ok(AnalyticNetwork::builtin());
    let mut probe = factory().unwrap();
    let checker = BoundsChecker::resolve(&NetworkBounds::any_town(), &mut probe).unwrap();
    let counter = ScheduleCounter::new(h_max, checker.num_pumps(), 3);
    let evaluator = NodeEvaluator::new(factory, checker, false);
    Worker::new(rank, counter, evaluator, active)
}

#[test]
fn idle_workers_start_done() {
    let active = make_worker(0, 4, true);
    let idle = make_worker(1, 4, false);
    assert!(!active.done());
    assert!(idle.done());
    assert_eq!(active.cost_ub(), f64::INFINITY);
}

#[test]
fn sender_sits_at_its_root_after_shipping() {
    let mut sender = make_worker(0, 4, true);
    for _ in 0..3 {
        sender.step().unwrap();
    }
    assert!(sender.counter().h() > sender.counter().h_min());

    let level = sender.free_level();
    assert!(level >= sender.counter().h_min());

    let package = sender.ship_work();
    assert!(sender.at_root());
    assert_eq!(package.h_min, sender.counter().h_min());
    assert_eq!(package.h_cut, sender.counter().y()[package.h_min]);
}

#[test]
fn split_is_recorded_as_a_prune() {
    let mut sender = make_worker(0, 4, true);
    for _ in 0..3 {
        sender.step().unwrap();
    }
    sender.free_level();
    let _ = sender.ship_work();

    let (stats, _, _) = sender.into_report();
    assert_eq!(stats.total_prunes(PruneReason::Split), 1);
}

#[test]
fn receiver_resumes_from_the_package() {
    let mut sender = make_worker(0, 4, true);
    for _ in 0..3 {
        sender.step().unwrap();
    }
    sender.free_level();
    let package = sender.ship_work();

    let mut receiver = make_worker(1, 4, false);
    assert!(receiver.done());
    receiver.receive_work(&package);
    assert!(!receiver.done());
    assert_eq!(receiver.counter().h(), package.h);
    assert_eq!(receiver.counter().h_min(), package.h_min);
    assert_eq!(receiver.counter().y(), &package.y[..]);

    // The receiver can carry on searching its slice
    receiver.step().unwrap();
    assert!(receiver.iterations() > 0);
}

#[test]
fn adopted_incumbent_tightens_the_bound() {
    let mut worker = make_worker(0, 4, true);
    let incumbent = aquabound_core::Incumbent {
        cost: 123.0,
        y: vec![0; 5],
        x: vec![0; 15],
        num_pumps: 3,
    };
    worker.adopt_incumbent(&incumbent);
    assert_eq!(worker.cost_ub(), 123.0);

    // A worse peer schedule is ignored
    let worse = aquabound_core::Incumbent { cost: 200.0, ..incumbent.clone() };
    worker.adopt_incumbent(&worse);
    assert_eq!(worker.cost_ub(), 123.0);

    let better = aquabound_core::Incumbent { cost: 42.0, ..incumbent };
    worker.adopt_incumbent(&better);
    assert_eq!(worker.cost_ub(), 42.0);
}

#[test]
fn done_worker_steps_are_no_ops() {
    let mut idle = make_worker(1, 4, false);
    idle.step().unwrap();
    idle.step().unwrap();
    assert_eq!(idle.iterations(), 0);
    assert!(idle.done());
}
