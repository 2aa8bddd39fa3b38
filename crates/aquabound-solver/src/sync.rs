//! Worker synchronization.
//!
//! Shared-memory collectives over `N` search threads: per-worker publish
//! slots read by everyone after a barrier, an incumbent slot written by
//! the cost leader, and one mailbox per worker for subtree hand-offs.
//!
//! Every cycle runs the same sequence on every worker:
//! 1. publish `(cost_ub, done, free_level)` and rendezvous
//! 2. read all slots; the cost leader posts its incumbent; matched
//!    senders post work packages; rendezvous again
//! 3. adopt the posted incumbent, collect any received package
//!
//! The two barriers make the slot data a consistent snapshot: every
//! worker derives the same leader, the same termination verdict, and the
//! same transfer plan from it, so the protocol needs no coordinator.

use aquabound_core::{HydraulicOracle, Incumbent, OracleError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex};
use tracing::debug;

use crate::counter::WorkPackage;
use crate::worker::Worker;

/// Published view of one worker, refreshed every cycle.
#[derive(Clone, Debug)]
struct Slot {
    cost_ub: f64,
    done: bool,
    h_free: usize,
}

/// Free-level sentinel for workers with nothing to offer.
const IDLE: usize = usize::MAX;

/// What the caller must do after a synchronization cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Keep searching
    Continue,
    /// Every worker's subtree is exhausted
    AllDone,
    /// A worker hit a fatal oracle error; drain immediately
    Aborted,
}

/// Shared state for one group of search workers.
pub struct SyncGroup {
    size: usize,
    barrier: Barrier,
    slots: Vec<Mutex<Slot>>,
    incumbent: Mutex<Option<Incumbent>>,
    mailboxes: Vec<Mutex<Option<WorkPackage>>>,
    abort: AtomicBool,
}

impl SyncGroup {
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "a sync group needs at least one worker");
        Self {
            size,
            barrier: Barrier::new(size),
            slots: (0..size)
                .map(|_| Mutex::new(Slot { cost_ub: f64::INFINITY, done: true, h_free: IDLE }))
                .collect(),
            incumbent: Mutex::new(None),
            mailboxes: (0..size).map(|_| Mutex::new(None)).collect(),
            abort: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Flag a fatal failure. Must be raised before the raiser's next
    /// `exchange` so every worker drains on the same cycle.
    pub fn raise_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// One full synchronization cycle for `worker`. Collective: every
    /// worker of the group must call this the same number of times.
    pub fn exchange<O, F>(&self, worker: &mut Worker<O, F>, h_threshold: usize) -> CycleOutcome
    where
        O: HydraulicOracle,
        F: Fn() -> Result<O, OracleError>,
    {
        let rank = worker.rank();

        // Publish phase
        let h_free = if worker.done() { IDLE } else { worker.free_level() };
        {
            let mut slot = self.slots[rank].lock().expect("slot poisoned");
            slot.cost_ub = worker.cost_ub();
            slot.done = worker.done();
            slot.h_free = h_free;
        }
        self.barrier.wait();

        // Read phase: everyone sees the same snapshot and computes the
        // same leader, verdict, and transfer plan
        let slots: Vec<Slot> = self
            .slots
            .iter()
            .map(|slot| slot.lock().expect("slot poisoned").clone())
            .collect();
        let aborted = self.aborted();

        let mut leader = 0;
        let mut cost_min = f64::INFINITY;
        for (i, slot) in slots.iter().enumerate() {
            if slot.cost_ub < cost_min {
                cost_min = slot.cost_ub;
                leader = i;
            }
        }
        if rank == leader && cost_min.is_finite() {
            *self.incumbent.lock().expect("incumbent poisoned") = worker.best().cloned();
        }

        let all_done = slots.iter().all(|slot| slot.done);
        let transfers = if all_done || aborted {
            Vec::new()
        } else {
            let done: Vec<bool> = slots.iter().map(|s| s.done).collect();
            let h_free: Vec<usize> = slots.iter().map(|s| s.h_free).collect();
            plan_transfers(&done, &h_free, h_threshold)
        };
        for &(sender, receiver) in &transfers {
            if sender == rank {
                debug!(sender, receiver, "handing off subtree");
                let package = worker.ship_work();
                *self.mailboxes[receiver].lock().expect("mailbox poisoned") = Some(package);
            }
        }
        self.barrier.wait();

        // Adopt phase
        if let Some(incumbent) = self.incumbent.lock().expect("incumbent poisoned").as_ref() {
            worker.adopt_incumbent(incumbent);
        }
        for &(_, receiver) in &transfers {
            if receiver == rank {
                if let Some(package) =
                    self.mailboxes[rank].lock().expect("mailbox poisoned").take()
                {
                    worker.receive_work(&package);
                }
            }
        }

        if aborted {
            CycleOutcome::Aborted
        } else if all_done {
            CycleOutcome::AllDone
        } else {
            CycleOutcome::Continue
        }
    }
}

/// Match the i-th busy worker with shallow-enough work to the i-th idle
/// worker. Deterministic given the gathered flags, so every worker
/// computes the identical plan without coordination.
pub fn plan_transfers(
    done: &[bool],
    h_free: &[usize],
    h_threshold: usize,
) -> Vec<(usize, usize)> {
    let mut transfers = Vec::new();
    let mut count_send = 0;
    for sender in 0..done.len() {
        if done[sender] {
            continue;
        }
        // A hand-off root deeper than the threshold is too little work to
        // be worth shipping
        if h_free[sender] > h_threshold {
            continue;
        }
        count_send += 1;

        let mut count_recv = 0;
        for receiver in 0..done.len() {
            if !done[receiver] {
                continue;
            }
            count_recv += 1;
            if count_recv == count_send {
                transfers.push((sender, receiver));
                break;
            }
        }
    }
    transfers
}
