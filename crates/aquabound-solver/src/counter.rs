//! Schedule enumeration.
//!
//! `ScheduleCounter` walks the tree of hour-indexed pump configurations in
//! a fixed canonical order. Each tree level is one hour; the branch taken
//! at hour `h` is the aggregate pump count `y[h]`, and the per-pump
//! configuration `x[h,..]` is derived from `y` deterministically, so
//! permutations of equally-actuated pumps are never enumerated twice.
//!
//! The cursor invariants:
//! - `h` is the deepest committed hour, `0 <= h <= h_max`
//! - `h_min` is the shallowest hour this counter may still mutate
//! - `y[h_min]` may grow only up to `h_cut`; deeper hours up to `num_pumps`
//!
//! A counter owns the whole subtree rooted at `(h_min, y[h_min]..=h_cut)`;
//! hand-off to another worker snapshots that root into a `WorkPackage` and
//! narrows the local cut.

use serde::{Deserialize, Serialize};

/// Serializable image of a counter mid-search, the unit of work transfer.
///
/// `feasible` carries the sender's last evaluation verdict so the receiver
/// resumes with the exact same next `advance` transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackage {
    pub h_min: usize,
    pub h_cut: u32,
    pub h: usize,
    pub feasible: bool,
    pub y: Vec<u32>,
    pub x: Vec<u8>,
}

/// Hour-indexed configuration counter with canonical extension.
#[derive(Clone, Debug)]
pub struct ScheduleCounter {
    h_max: usize,
    num_pumps: usize,
    max_actuations: usize,
    /// Deepest committed hour
    h: usize,
    /// Shallowest hour this worker may mutate
    h_min: usize,
    /// Cap on `y[h_min]`
    h_cut: u32,
    /// Pumps on per hour, index 0 is the all-off base
    y: Vec<u32>,
    /// Flat on/off matrix, one `num_pumps` row per hour
    x: Vec<u8>,
}

impl ScheduleCounter {
    pub fn new(h_max: usize, num_pumps: usize, max_actuations: usize) -> Self {
        Self {
            h_max,
            num_pumps,
            max_actuations,
            h: 0,
            h_min: 1,
            h_cut: num_pumps as u32,
            y: vec![0; h_max + 1],
            x: vec![0; num_pumps * (h_max + 1)],
        }
    }

    pub fn h(&self) -> usize {
        self.h
    }

    pub fn h_max(&self) -> usize {
        self.h_max
    }

    pub fn h_min(&self) -> usize {
        self.h_min
    }

    pub fn num_pumps(&self) -> usize {
        self.num_pumps
    }

    pub fn y(&self) -> &[u32] {
        &self.y
    }

    pub fn x(&self) -> &[u8] {
        &self.x
    }

    pub fn x_row(&self, h: usize) -> &[u8] {
        &self.x[self.num_pumps * h..self.num_pumps * (h + 1)]
    }

    /// Move to the next node of the enumeration, given whether the node
    /// just evaluated was feasible. Returns `false` when the subtree owned
    /// by this counter is exhausted.
    ///
    /// Feasible nodes descend; infeasible nodes (and feasible leaves, which
    /// have nowhere to descend) move laterally, popping exhausted levels.
    pub fn advance(&mut self, feasible: bool) -> bool {
        assert!(
            self.h <= self.h_max,
            "cursor h={} outside [0, {}]",
            self.h,
            self.h_max
        );

        if feasible && self.h < self.h_max {
            self.h += 1;
            self.y[self.h] = 0;
            return true;
        }

        // Lateral move: try the next y value at this level, popping when a
        // level has reached its cap. Descending later resets y, so popped
        // levels keep their stale values harmlessly.
        loop {
            if self.h < self.h_min {
                // Only reachable before the first descent (h == 0)
                return false;
            }
            if self.h == self.h_min {
                if self.y[self.h] < self.h_cut {
                    self.y[self.h] += 1;
                    return true;
                }
                return false;
            }
            if self.y[self.h] < self.num_pumps as u32 {
                self.y[self.h] += 1;
                return true;
            }
            self.h -= 1;
        }
    }

    /// Derive `x[h,..]` from `y[h]` and `x[h-1,..]`: keep the previous
    /// configuration and switch the difference among the pumps with the
    /// fewest cumulative actuations, lowest pump index first. Returns
    /// `false` when the required turn-ons would break the actuation cap.
    pub fn materialize(&mut self) -> bool {
        assert!(self.h >= 1, "materialize called at the base hour");
        let ok = self.materialize_inner();
        if ok {
            let sum: u32 = self.x_row(self.h).iter().map(|&v| u32::from(v)).sum();
            assert!(
                sum == self.y[self.h],
                "sum(x[{}])={} != y[{}]={}",
                self.h,
                sum,
                self.h,
                self.y[self.h]
            );
        }
        ok
    }

    fn materialize_inner(&mut self) -> bool {
        let h = self.h;
        let p = self.num_pumps;
        let y_old = self.y[h - 1];
        let y_new = self.y[h];

        let (prev, rest) = self.x.split_at_mut(p * h);
        let row_old = &prev[p * (h - 1)..];
        let row_new = &mut rest[..p];
        row_new.copy_from_slice(&row_old[..p]);

        if y_new == y_old {
            return true;
        }

        let csum = actuation_counts(&self.x[..p * h], p);
        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by_key(|&pump| (csum[pump], pump));

        let row = &mut self.x[p * h..p * (h + 1)];
        if y_new > y_old {
            let mut remaining = y_new - y_old;
            for &pump in &order {
                if remaining == 0 {
                    break;
                }
                if row[pump] == 0 && csum[pump] < self.max_actuations {
                    row[pump] = 1;
                    remaining -= 1;
                }
            }
            return remaining == 0;
        }

        // Turning off the least-actuated pumps first keeps the most
        // flexibility for later hours
        let mut remaining = y_old - y_new;
        for &pump in &order {
            if remaining == 0 {
                break;
            }
            if row[pump] == 1 {
                row[pump] = 0;
                remaining -= 1;
            }
        }
        remaining == 0
    }

    /// Force the current level to its cap so the next `advance` pops it.
    pub fn jump_to_end(&mut self) {
        self.y[self.h] = if self.h == self.h_min {
            self.h_cut
        } else {
            self.num_pumps as u32
        };
    }

    /// The shallowest hour whose `y` can still grow: the hand-off root.
    ///
    /// When the root level is exhausted this advances `h_min` (resetting
    /// the cut to the pump count) before answering, so a hand-off never
    /// ships an empty range. Falls back to `h_max` when nothing is free.
    pub fn free_level(&mut self) -> usize {
        if self.y[self.h_min] < self.h_cut {
            return self.h_min;
        }
        for level in self.h_min + 1..=self.h {
            if self.y[level] < self.num_pumps as u32 {
                self.h_min = level;
                self.h_cut = self.num_pumps as u32;
                return level;
            }
        }
        self.h_max
    }

    /// Install a complete aggregate schedule, materializing hour by hour.
    /// Accepts `y` with or without the leading base entry. Returns `false`
    /// if any hour fails the actuation cap.
    pub fn set_y(&mut self, schedule: &[u32]) -> bool {
        assert!(
            schedule.len() == self.h_max || schedule.len() == self.h_max + 1,
            "schedule length {} does not fit horizon {}",
            schedule.len(),
            self.h_max
        );
        if schedule.len() == self.h_max {
            self.y[0] = 0;
            self.y[1..].copy_from_slice(schedule);
        } else {
            self.y.copy_from_slice(schedule);
        }

        self.h = 0;
        for _ in 0..self.h_max {
            self.h += 1;
            if !self.materialize() {
                return false;
            }
        }
        true
    }

    /// Image of the subtree rooted at `h_min` for hand-off. The receiver's
    /// cut is the current root value: it finishes the subtree under
    /// `y[h_min]` while the sender keeps the values above it.
    pub fn snapshot(&self, feasible: bool) -> WorkPackage {
        WorkPackage {
            h_min: self.h_min,
            h_cut: self.y[self.h_min],
            h: self.h,
            feasible,
            y: self.y.clone(),
            x: self.x.clone(),
        }
    }

    /// Overwrite this counter with a received subtree.
    pub fn restore(&mut self, package: &WorkPackage) {
        assert!(
            package.y.len() == self.y.len() && package.x.len() == self.x.len(),
            "work package shaped for a different horizon"
        );
        self.h_min = package.h_min;
        self.h_cut = package.h_cut;
        self.h = package.h;
        self.y.copy_from_slice(&package.y);
        self.x.copy_from_slice(&package.x);
    }

    /// After shipping a subtree the sender resumes just above it.
    pub fn rewind_to_root(&mut self) {
        self.h = self.h_min;
    }
}

/// Off-to-on transitions per pump across the committed rows of `x`,
/// excluding the switch-on out of the all-off base state.
fn actuation_counts(x: &[u8], num_pumps: usize) -> Vec<usize> {
    let hours = x.len() / num_pumps;
    let mut counts = vec![0usize; num_pumps];
    for h in 2..hours {
        let prev = &x[num_pumps * (h - 1)..num_pumps * h];
        let cur = &x[num_pumps * h..num_pumps * (h + 1)];
        for p in 0..num_pumps {
            if cur[p] > prev[p] {
                counts[p] += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Enumerate aggregate schedules with every node reported feasible,
    /// collecting the visited `(h, y[1..=h])` prefixes.
    fn exhaust(mut counter: ScheduleCounter) -> Vec<(usize, Vec<u32>)> {
        let mut visited = Vec::new();
        let mut feasible = true;
        while counter.advance(feasible) {
            feasible = counter.materialize();
            if feasible {
                visited.push((counter.h(), counter.y()[1..=counter.h()].to_vec()));
            }
        }
        visited
    }

    #[test]
    fn empty_horizon_is_exhausted_immediately() {
        let mut counter = ScheduleCounter::new(0, 3, 3);
        assert!(!counter.advance(true));
    }

    #[test]
    fn single_hour_single_pump_enumerates_in_order() {
        let visited = exhaust(ScheduleCounter::new(1, 1, 3));
        assert_eq!(visited, vec![(1, vec![0]), (1, vec![1])]);
    }

    #[test]
    fn depth_first_descends_before_moving_laterally() {
        let visited = exhaust(ScheduleCounter::new(2, 1, 3));
        let expected = vec![
            (1, vec![0]),
            (2, vec![0, 0]),
            (2, vec![0, 1]),
            (1, vec![1]),
            (2, vec![1, 0]),
            (2, vec![1, 1]),
        ];
        assert_eq!(visited, expected);
    }

    #[test]
    fn full_enumeration_count_matches_tree_size() {
        // 2 pumps, 2 hours, generous cap: 3 + 9 nodes
        let visited = exhaust(ScheduleCounter::new(2, 2, 4));
        assert_eq!(visited.len(), 12);
        let leaves = visited.iter().filter(|(h, _)| *h == 2).count();
        assert_eq!(leaves, 9);
    }

    #[test]
    fn infeasible_node_is_not_descended_into() {
        let mut counter = ScheduleCounter::new(2, 1, 3);
        assert!(counter.advance(true));
        assert_eq!((counter.h(), counter.y()[1]), (1, 0));
        // Report hour 1 infeasible: the counter must move laterally, not down
        assert!(counter.advance(false));
        assert_eq!((counter.h(), counter.y()[1]), (1, 1));
    }

    #[test]
    fn materialization_keeps_row_sums_consistent() {
        let mut counter = ScheduleCounter::new(3, 3, 3);
        let mut feasible = true;
        while counter.advance(feasible) {
            feasible = counter.materialize();
            if feasible {
                let sum: u32 = counter.x_row(counter.h()).iter().map(|&v| u32::from(v)).sum();
                assert_eq!(sum, counter.y()[counter.h()]);
            }
        }
    }

    #[test]
    fn canonical_extension_prefers_least_actuated_lowest_index() {
        let mut counter = ScheduleCounter::new(4, 3, 3);
        // Hour 1: one pump on -> pump 0 by index tie-break
        assert!(counter.set_y(&[1, 0, 1, 1]));
        assert_eq!(counter.x_row(1), &[1, 0, 0]);
        // Hour 2: all off
        assert_eq!(counter.x_row(2), &[0, 0, 0]);
        // Hour 3: cumulative counts are still level, ties resolve to pump 0
        assert_eq!(counter.x_row(3), &[1, 0, 0]);
        // Hour 4: unchanged count keeps the same pump running
        assert_eq!(counter.x_row(4), &[1, 0, 0]);
    }

    #[test]
    fn turn_off_releases_least_actuated_first() {
        let mut counter = ScheduleCounter::new(3, 3, 3);
        assert!(counter.set_y(&[3, 2, 2]));
        assert_eq!(counter.x_row(1), &[1, 1, 1]);
        // Dropping to 2 turns off pump 0: no counted actuations yet, ties by index
        assert_eq!(counter.x_row(2), &[0, 1, 1]);
        assert_eq!(counter.x_row(3), &[0, 1, 1]);
    }

    #[test]
    fn actuation_cap_zero_rejects_any_turn_on_after_hour_one() {
        let mut counter = ScheduleCounter::new(3, 2, 0);
        // Turn-ons out of the base state are not counted actuations, but a
        // cap of zero still rejects them at materialization time
        assert!(!counter.set_y(&[1, 1, 1]));

        let mut counter = ScheduleCounter::new(3, 2, 0);
        assert!(counter.set_y(&[0, 0, 0]));
    }

    #[test]
    fn actuation_cap_limits_on_off_cycling() {
        // One pump cycling on/off: each on after the first costs an actuation
        let mut counter = ScheduleCounter::new(5, 1, 1);
        assert!(counter.set_y(&[1, 0, 1, 0, 0]));

        let mut counter = ScheduleCounter::new(5, 1, 1);
        assert!(!counter.set_y(&[1, 0, 1, 0, 1]));
    }

    #[test]
    fn set_y_accepts_leading_base_entry() {
        let mut with_base = ScheduleCounter::new(3, 2, 3);
        let mut without = ScheduleCounter::new(3, 2, 3);
        assert!(with_base.set_y(&[0, 1, 2, 1]));
        assert!(without.set_y(&[1, 2, 1]));
        assert_eq!(with_base.x(), without.x());
    }

    #[test]
    fn jump_to_end_forces_a_pop() {
        let mut counter = ScheduleCounter::new(2, 2, 3);
        assert!(counter.advance(true)); // h=1, y=0
        assert!(counter.advance(true)); // h=2, y=0
        counter.jump_to_end();
        assert_eq!(counter.y()[2], 2);
        // Next lateral move pops to hour 1
        assert!(counter.advance(false));
        assert_eq!((counter.h(), counter.y()[1]), (1, 1));
    }

    #[test]
    fn free_level_advances_past_exhausted_root() {
        let mut counter = ScheduleCounter::new(3, 2, 3);
        assert!(counter.advance(true)); // h=1
        assert!(counter.advance(true)); // h=2
        assert!(counter.advance(true)); // h=3
        assert_eq!(counter.free_level(), 1);

        // Exhaust the root level
        counter.y[1] = 2;
        assert_eq!(counter.free_level(), 2);
        assert_eq!(counter.h_min(), 2);
        // The cut widens to the pump count at the new root
        assert_eq!(counter.h_cut, 2);
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut counter = ScheduleCounter::new(4, 3, 3);
        assert!(counter.set_y(&[1, 2, 1, 0]));
        let package = counter.snapshot(true);

        let mut other = ScheduleCounter::new(4, 3, 3);
        other.restore(&package);
        assert_eq!(other.h(), counter.h());
        assert_eq!(other.y(), counter.y());
        assert_eq!(other.x(), counter.x());
        assert_eq!(other.snapshot(true), package);
    }

    #[test]
    fn work_package_json_round_trip_is_identity() {
        let mut counter = ScheduleCounter::new(3, 2, 3);
        assert!(counter.set_y(&[1, 2, 0]));
        let package = counter.snapshot(false);
        let text = serde_json::to_string(&package).unwrap();
        let back: WorkPackage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, package);
    }

    #[test]
    fn handed_off_subtrees_partition_the_tree() {
        // Sender at depth 3; ship the subtree under the current root value
        let mut sender = ScheduleCounter::new(3, 2, 3);
        assert!(sender.advance(true)); // h=1, y=[_,0]
        assert!(sender.advance(true)); // h=2
        assert!(sender.advance(true)); // h=3
        assert_eq!(sender.free_level(), 1);

        let package = sender.snapshot(true);
        sender.rewind_to_root();
        assert_eq!(sender.h(), sender.h_min());

        let mut receiver = ScheduleCounter::new(3, 2, 3);
        receiver.restore(&package);

        // Receiver finishes the subtree under y[1]=0 and stops: its cut
        // pins y[1] at the shipped value
        let mut receiver_leaves = Vec::new();
        let mut feasible = package.feasible;
        loop {
            if feasible && receiver.h() == receiver.h_max() {
                receiver_leaves.push(receiver.y()[1..].to_vec());
            }
            if !receiver.advance(feasible) {
                break;
            }
            feasible = receiver.materialize();
        }
        assert!(receiver_leaves.iter().all(|leaf| leaf[0] == 0));

        // Sender resumes above the shipped range: y[1] >= 1 from here on
        let mut sender_leaves = Vec::new();
        let mut feasible = false;
        while sender.advance(feasible) {
            feasible = sender.materialize();
            if feasible && sender.h() == sender.h_max() {
                sender_leaves.push(sender.y()[1..].to_vec());
            }
        }
        assert!(sender_leaves.iter().all(|leaf| leaf[0] >= 1));

        // No leaf explored twice
        for leaf in &receiver_leaves {
            assert!(!sender_leaves.contains(leaf));
        }
    }
}
