//! Bounds filtering for occurrence constraints via Hall intervals.
//!
//! The capacity filter is the two-sweep bounds-consistency algorithm of
//! Quimper et al. (CP 2003), generalising the alldifferent bounds filter of
//! Lopez-Ortiz et al.: the current variable bounds are compressed into a
//! sorted bound vector, a path-compressed interval tree tracks the remaining
//! capacity of every bound interval, and once an interval is saturated (a Hall
//! interval) the bound of every variable spanning it is pushed to its far
//! side. One sweep in ascending order of upper bounds raises lower bounds, a
//! mirrored sweep lowers upper bounds.
//!
//! The demand filter handles minimum occurrence counts. A greedy sweep serves
//! the demanded values in ascending order with the available variable of the
//! smallest upper bound; this succeeds exactly when the demands are
//! satisfiable within the current bounds. Values reachable by an alternating
//! path from an unused variable have slack and never constrain anybody; the
//! variables serving the remaining tight region must cover its demands
//! exactly, so they are clamped onto the tight values and filtered with the
//! Hall sweeps against the demand capacities of that region.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::basic_types::Inconsistency;
use crate::propagators::global_cardinality::partial_sum::PartialSum;

/// Positions of a variable's bounds in the compressed bound vector.
#[derive(Clone, Copy, Debug, Default)]
struct Rank {
    min: usize,
    max: usize,
}

/// Reusable scratch for the two Hall-interval sweeps.
#[derive(Clone, Debug, Default)]
pub(crate) struct HallFilter {
    /// Variable indices in ascending order of upper bound.
    mu: Vec<usize>,
    /// Variable indices in ascending order of lower bound.
    nu: Vec<usize>,
    rank: Vec<Rank>,
    bounds: Vec<i32>,
    nb: usize,
    /// The interval tree: for an exhausted interval, the next candidate in
    /// sweep direction; for an open one, the far end of the exhausted run
    /// beside it.
    t: Vec<i32>,
    /// Remaining capacity per bound interval.
    d: Vec<i32>,
    /// Hall markers: points past the Hall interval a position belongs to.
    h: Vec<i32>,
    new_min: Vec<i32>,
    new_max: Vec<i32>,
}

impl HallFilter {
    /// Narrows `intervals` so that no value interval is claimed by more
    /// variables than `caps` provides, and reports whether anything changed.
    /// Both sweeps run on the bounds as given; the caller re-runs the filter
    /// after applying the changes until nothing moves.
    pub(crate) fn filter(
        &mut self,
        intervals: &mut [(i32, i32)],
        caps: &PartialSum,
    ) -> Result<bool, Inconsistency> {
        if intervals.is_empty() {
            return Ok(false);
        }
        debug_assert!(intervals
            .iter()
            .all(|iv| iv.0 <= iv.1 && iv.0 >= caps.min_value() && iv.1 <= caps.max_value()));
        self.prepare(intervals, caps);
        self.new_min.clear();
        self.new_min.extend(intervals.iter().map(|interval| interval.0));
        self.new_max.clear();
        self.new_max.extend(intervals.iter().map(|interval| interval.1));
        self.sweep_lower(caps)?;
        self.sweep_upper(caps)?;
        let mut changed = false;
        for (index, interval) in intervals.iter_mut().enumerate() {
            if self.new_min[index] > interval.0 {
                interval.0 = self.new_min[index];
                changed = true;
            }
            if self.new_max[index] < interval.1 {
                interval.1 = self.new_max[index];
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Sorts the variables and merges their bounds into the compressed bound
    /// vector `bounds[0..=nb + 1]`, with a sentinel position on each side.
    fn prepare(&mut self, intervals: &[(i32, i32)], caps: &PartialSum) {
        let n = intervals.len();
        self.mu.clear();
        self.mu.extend(0..n);
        self.mu.sort_by_key(|&index| intervals[index].1);
        self.nu.clear();
        self.nu.extend(0..n);
        self.nu.sort_by_key(|&index| intervals[index].0);
        self.rank.clear();
        self.rank.resize(n, Rank::default());

        self.bounds.clear();
        let mut last = caps.min_value() - 2;
        self.bounds.push(last);
        let mut i = 0;
        let mut j = 0;
        while i < n || j < n {
            if i < n && (j == n || intervals[self.nu[i]].0 <= intervals[self.mu[j]].1 + 1) {
                let min = intervals[self.nu[i]].0;
                if min != last {
                    last = min;
                    self.bounds.push(last);
                }
                self.rank[self.nu[i]].min = self.bounds.len() - 1;
                i += 1;
            } else {
                let max_plus_one = intervals[self.mu[j]].1 + 1;
                if max_plus_one != last {
                    last = max_plus_one;
                    self.bounds.push(last);
                }
                self.rank[self.mu[j]].max = self.bounds.len() - 1;
                j += 1;
            }
        }
        self.nb = self.bounds.len() - 1;
        self.bounds.push(caps.max_value() + 3);
    }

    /// Visits the variables in ascending order of upper bound and raises lower
    /// bounds past saturated intervals.
    fn sweep_lower(&mut self, caps: &PartialSum) -> Result<(), Inconsistency> {
        let nb = self.nb;
        self.reset_trees(nb + 2);
        // intervals with no capacity are exhausted from the start; an open
        // interval remembers where the run of exhausted ones to its left began
        let mut zero_run: Option<i32> = None;
        for k in 1..=nb + 1 {
            self.h[k] = k as i32 - 1;
            self.d[k] = caps.sum(self.bounds[k - 1], self.bounds[k] - 1);
            if self.d[k] == 0 {
                self.t[k] = k as i32 + 1;
                if zero_run.is_none() {
                    zero_run = Some(k as i32);
                }
            } else {
                self.t[k] = match zero_run.take() {
                    Some(start) => start - 1,
                    None => k as i32 - 1,
                };
            }
        }
        for mu_index in 0..self.mu.len() {
            let var = self.mu[mu_index];
            let x = self.rank[var].min as i32;
            let y = self.rank[var].max as i32;
            let mut z = pathmax(&self.t, x + 1);
            let j = self.t[z as usize];
            self.d[z as usize] -= 1;
            if self.d[z as usize] == 0 {
                self.t[z as usize] = z + 1;
                z = pathmax(&self.t, self.t[z as usize]);
                self.t[z as usize] = j;
            }
            pathset(&mut self.t, x + 1, z, z);
            let capacity = caps.sum(self.bounds[y as usize], self.bounds[z as usize] - 1);
            if self.d[z as usize] < capacity {
                return Err(Inconsistency::CapacityExceeded {
                    value: self.bounds[y as usize],
                });
            }
            if self.h[x as usize] > x {
                let w = pathmax(&self.h, self.h[x as usize]);
                self.new_min[var] = self.bounds[w as usize];
                pathset(&mut self.h, x, w, w);
            }
            if self.d[z as usize] == capacity {
                let hy = self.h[y as usize];
                pathset(&mut self.h, hy, j - 1, y);
                self.h[y as usize] = j - 1;
            }
        }
        Ok(())
    }

    /// The mirror image of [`HallFilter::sweep_lower`]: descending order of
    /// lower bound, lowering upper bounds.
    fn sweep_upper(&mut self, caps: &PartialSum) -> Result<(), Inconsistency> {
        let nb = self.nb;
        self.reset_trees(nb + 2);
        self.t[nb + 1] = nb as i32 + 2;
        self.h[nb + 1] = nb as i32 + 2;
        let mut zero_run: Option<i32> = None;
        for k in (0..=nb).rev() {
            self.h[k] = k as i32 + 1;
            self.d[k] = caps.sum(self.bounds[k], self.bounds[k + 1] - 1);
            if self.d[k] == 0 {
                self.t[k] = k as i32 - 1;
                if zero_run.is_none() {
                    zero_run = Some(k as i32);
                }
            } else {
                self.t[k] = match zero_run.take() {
                    Some(end) => end + 1,
                    None => k as i32 + 1,
                };
            }
        }
        for nu_index in (0..self.nu.len()).rev() {
            let var = self.nu[nu_index];
            let x = self.rank[var].max as i32;
            let y = self.rank[var].min as i32;
            let mut z = pathmin(&self.t, x - 1);
            let j = self.t[z as usize];
            self.d[z as usize] -= 1;
            if self.d[z as usize] == 0 {
                self.t[z as usize] = z - 1;
                z = pathmin(&self.t, self.t[z as usize]);
                self.t[z as usize] = j;
            }
            pathset(&mut self.t, x - 1, z, z);
            let capacity = caps.sum(self.bounds[z as usize], self.bounds[y as usize] - 1);
            if self.d[z as usize] < capacity {
                return Err(Inconsistency::CapacityExceeded {
                    value: self.bounds[z as usize],
                });
            }
            if self.h[x as usize] < x {
                let w = pathmin(&self.h, self.h[x as usize]);
                self.new_max[var] = self.bounds[w as usize] - 1;
                pathset(&mut self.h, x, w, w);
            }
            if self.d[z as usize] == capacity {
                let hy = self.h[y as usize];
                pathset(&mut self.h, hy, j + 1, y);
                self.h[y as usize] = j + 1;
            }
        }
        Ok(())
    }

    fn reset_trees(&mut self, len: usize) {
        self.t.clear();
        self.t.resize(len, 0);
        self.d.clear();
        self.d.resize(len, 0);
        self.h.clear();
        self.h.resize(len, 0);
        self.t[0] = -1;
        self.h[0] = -1;
    }
}

fn pathmax(tree: &[i32], mut position: i32) -> i32 {
    while tree[position as usize] > position {
        position = tree[position as usize];
    }
    position
}

fn pathmin(tree: &[i32], mut position: i32) -> i32 {
    while tree[position as usize] < position {
        position = tree[position as usize];
    }
    position
}

fn pathset(tree: &mut [i32], from: i32, to: i32, value: i32) {
    let mut cursor = from;
    while cursor != to {
        debug_assert!(cursor >= 0);
        let next = tree[cursor as usize];
        tree[cursor as usize] = value;
        cursor = next;
    }
}

/// Filters variable bounds against minimum-occurrence demands.
#[derive(Clone, Debug, Default)]
pub(crate) struct LowerFilter {
    /// Per variable, the demanded value it serves in the witness matching.
    matched: Vec<Option<i32>>,
    absorbed: Vec<bool>,
    /// Merged value intervals reachable from an unused variable.
    stable: Vec<(i32, i32)>,
    /// Variables serving a demand outside the stable region.
    pinned: Vec<usize>,
    sub_intervals: Vec<(i32, i32)>,
    hall: HallFilter,
}

impl LowerFilter {
    /// Narrows `intervals` so that every value keeps its minimum number of
    /// occurrences reachable, where `lps` carries the demanded minima.
    /// Reports whether anything changed; like the capacity filter, it runs on
    /// the bounds as given and is re-run by the caller until nothing moves.
    pub(crate) fn filter(
        &mut self,
        intervals: &mut [(i32, i32)],
        lps: &PartialSum,
    ) -> Result<bool, Inconsistency> {
        self.witness(intervals, lps)?;
        self.compute_stable(intervals);
        self.pinned.clear();
        for index in 0..intervals.len() {
            if let Some(value) = self.matched[index] {
                if !covered(&self.stable, value) {
                    self.pinned.push(index);
                }
            }
        }
        if self.pinned.is_empty() {
            return Ok(false);
        }

        // demands of the tight region; values with slack put no claim on the
        // pinned variables and get zero capacity
        let mut tight: Vec<(i32, i32)> = Vec::new();
        let mut value = lps.skip_non_zero_right(lps.min_value());
        while value <= lps.max_value() {
            if !covered(&self.stable, value) {
                tight.push((value, lps.sum(value, value)));
            }
            value = lps.skip_non_zero_right(value + 1);
        }
        let exact = PartialSum::new(lps.min_value(), lps.max_value(), &tight);

        self.sub_intervals.clear();
        self.sub_intervals
            .extend(self.pinned.iter().map(|&index| intervals[index]));
        let mut changed = self.snap(&exact)?;
        changed |= self.hall.filter(&mut self.sub_intervals, &exact)?;
        changed |= self.snap(&exact)?;
        for (position, &index) in self.pinned.iter().enumerate() {
            intervals[index] = self.sub_intervals[position];
        }
        Ok(changed)
    }

    /// Serves the demanded values in ascending order, each with the available
    /// variables of smallest upper bound. Variables that are never taken, or
    /// whose upper bound falls short of every remaining demand, stay free.
    fn witness(
        &mut self,
        intervals: &[(i32, i32)],
        lps: &PartialSum,
    ) -> Result<(), Inconsistency> {
        let n = intervals.len();
        self.matched.clear();
        self.matched.resize(n, None);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&index| intervals[index].0);
        let mut available: BinaryHeap<Reverse<(i32, usize)>> = BinaryHeap::with_capacity(n);
        let mut next = 0;
        let mut value = lps.skip_non_zero_right(lps.min_value());
        while value <= lps.max_value() {
            while next < n && intervals[order[next]].0 <= value {
                let index = order[next];
                available.push(Reverse((intervals[index].1, index)));
                next += 1;
            }
            let mut required = lps.sum(value, value);
            while required > 0 {
                match available.pop() {
                    Some(Reverse((upper, index))) => {
                        if upper < value {
                            // cannot serve this demand nor any later one
                            continue;
                        }
                        self.matched[index] = Some(value);
                        required -= 1;
                    }
                    None => return Err(Inconsistency::InsufficientSupply { value }),
                }
            }
            value = lps.skip_non_zero_right(value + 1);
        }
        Ok(())
    }

    /// Grows the stable region: the bounds of every unused variable, closed
    /// under absorbing variables whose served value already lies inside.
    fn compute_stable(&mut self, intervals: &[(i32, i32)]) {
        let n = intervals.len();
        self.stable.clear();
        self.absorbed.clear();
        self.absorbed.resize(n, false);
        for index in 0..n {
            if self.matched[index].is_none() {
                self.stable.push(intervals[index]);
                self.absorbed[index] = true;
            }
        }
        merge_intervals(&mut self.stable);
        let mut grew = true;
        while grew {
            grew = false;
            for index in 0..n {
                if self.absorbed[index] {
                    continue;
                }
                if let Some(value) = self.matched[index] {
                    if covered(&self.stable, value) {
                        self.absorbed[index] = true;
                        self.stable.push(intervals[index]);
                        grew = true;
                    }
                }
            }
            if grew {
                merge_intervals(&mut self.stable);
            }
        }
    }

    /// Moves the bounds of the pinned variables onto values that still carry
    /// demand.
    fn snap(&mut self, exact: &PartialSum) -> Result<bool, Inconsistency> {
        let mut changed = false;
        for interval in &mut self.sub_intervals {
            let lower = exact.skip_non_zero_right(interval.0);
            let upper = exact.skip_non_zero_left(interval.1);
            if lower > upper {
                return Err(Inconsistency::InsufficientSupply { value: interval.0 });
            }
            if lower > interval.0 {
                interval.0 = lower;
                changed = true;
            }
            if upper < interval.1 {
                interval.1 = upper;
                changed = true;
            }
        }
        Ok(changed)
    }
}

fn merge_intervals(intervals: &mut Vec<(i32, i32)>) {
    intervals.sort_unstable();
    let mut merged: Vec<(i32, i32)> = Vec::with_capacity(intervals.len());
    for &(lower, upper) in intervals.iter() {
        match merged.last_mut() {
            Some(last) if lower <= last.1 + 1 => last.1 = last.1.max(upper),
            _ => merged.push((lower, upper)),
        }
    }
    *intervals = merged;
}

fn covered(intervals: &[(i32, i32)], value: i32) -> bool {
    match intervals.binary_search_by(|&(lower, _)| lower.cmp(&value)) {
        Ok(_) => true,
        Err(0) => false,
        Err(position) => intervals[position - 1].1 >= value,
    }
}
