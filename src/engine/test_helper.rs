//! A miniature solver used to test propagators in isolation: it owns the
//! domain store, runs posted propagators to a common fixpoint, and replays
//! domain events to the subscribed propagators the way the full engine would.

use crate::basic_types::Inconsistency;
use crate::basic_types::Propagation;
use crate::basic_types::PropagationStatusCP;
use crate::engine::cp::assignments::Assignments;
use crate::engine::cp::domain_events::DomainEvents;
use crate::engine::cp::propagation::PropagationContext;
use crate::engine::cp::propagation::PropagationContextMut;
use crate::engine::cp::propagation::Propagator;
use crate::engine::cp::propagation::PropagatorInitialisationContext;
use crate::variables::DomainId;

/// Identifier of a propagator posted to the [`TestSolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PropagatorId(usize);

#[derive(Default)]
pub(crate) struct TestSolver {
    assignments: Assignments,
    propagators: Vec<Entry>,
}

struct Entry {
    propagator: Box<dyn Propagator>,
    subscriptions: Vec<(DomainId, DomainEvents)>,
    subsumed: bool,
}

impl TestSolver {
    pub(crate) fn new_variable(&mut self, lower: i32, upper: i32) -> DomainId {
        self.assignments.grow(lower, upper)
    }

    pub(crate) fn new_sparse_variable(&mut self, values: &[i32]) -> DomainId {
        self.assignments.grow_sparse(values)
    }

    /// Posts the propagator: initialises it at the root and propagates until
    /// all posted propagators are at fixpoint.
    pub(crate) fn new_propagator(
        &mut self,
        propagator: impl Propagator + 'static,
    ) -> Result<PropagatorId, Inconsistency> {
        let mut propagator = Box::new(propagator);
        let mut context = PropagatorInitialisationContext::new(&mut self.assignments);
        propagator.initialise_at_root(&mut context)?;
        let subscriptions = context.into_registrations();
        let id = PropagatorId(self.propagators.len());
        self.propagators.push(Entry {
            propagator,
            subscriptions,
            subsumed: false,
        });
        let _ = self.assignments.drain_events();
        self.propagate_until_fixpoint()?;
        Ok(id)
    }

    /// Runs all non-subsumed propagators to a common fixpoint, waking them on
    /// the events their subscriptions cover, cheapest cost class first.
    pub(crate) fn propagate_until_fixpoint(&mut self) -> Result<(), Inconsistency> {
        let mut scheduled = vec![true; self.propagators.len()];
        // pick up events from mutations made outside of propagation
        self.reschedule(&mut scheduled);
        loop {
            let next = scheduled
                .iter()
                .enumerate()
                .filter(|(index, waiting)| **waiting && !self.propagators[*index].subsumed)
                .min_by_key(|(index, _)| {
                    self.propagators[*index]
                        .propagator
                        .cost(PropagationContext::new(&self.assignments))
                })
                .map(|(index, _)| index);
            let Some(index) = next else {
                return Ok(());
            };
            scheduled[index] = false;
            let status = self.propagators[index]
                .propagator
                .propagate(PropagationContextMut::new(&mut self.assignments))?;
            match status {
                Propagation::Subsumed => self.propagators[index].subsumed = true,
                Propagation::NotAtFixpoint => scheduled[index] = true,
                Propagation::AtFixpoint => {}
            }
            self.reschedule(&mut scheduled);
        }
    }

    fn reschedule(&mut self, scheduled: &mut [bool]) {
        for (domain, event) in self.assignments.drain_events() {
            for (index, entry) in self.propagators.iter().enumerate() {
                if entry.subsumed {
                    continue;
                }
                let watches = entry
                    .subscriptions
                    .iter()
                    .any(|(watched, events)| *watched == domain && events.contains(event));
                if watches {
                    scheduled[index] = true;
                }
            }
        }
    }

    /// Invokes a single propagator once, without running others afterwards.
    pub(crate) fn propagate(&mut self, propagator: PropagatorId) -> PropagationStatusCP {
        let status = self.propagators[propagator.0]
            .propagator
            .propagate(PropagationContextMut::new(&mut self.assignments))?;
        let _ = self.assignments.drain_events();
        Ok(status)
    }

    pub(crate) fn is_subsumed(&self, propagator: PropagatorId) -> bool {
        self.propagators[propagator.0].subsumed
    }

    pub(crate) fn remove(&mut self, var: DomainId, value: i32) -> Result<(), Inconsistency> {
        let _ = self.assignments.remove(var, value)?;
        Ok(())
    }

    pub(crate) fn set_lower_bound(&mut self, var: DomainId, bound: i32) -> Result<(), Inconsistency> {
        let _ = self.assignments.set_lower_bound(var, bound)?;
        Ok(())
    }

    pub(crate) fn set_upper_bound(&mut self, var: DomainId, bound: i32) -> Result<(), Inconsistency> {
        let _ = self.assignments.set_upper_bound(var, bound)?;
        Ok(())
    }

    pub(crate) fn assign(&mut self, var: DomainId, value: i32) -> Result<(), Inconsistency> {
        let _ = self.assignments.assign(var, value)?;
        Ok(())
    }

    pub(crate) fn lower_bound(&self, var: DomainId) -> i32 {
        self.assignments.lower_bound(var)
    }

    pub(crate) fn upper_bound(&self, var: DomainId) -> i32 {
        self.assignments.upper_bound(var)
    }

    pub(crate) fn is_fixed(&self, var: DomainId) -> bool {
        self.assignments.is_fixed(var)
    }

    pub(crate) fn domain(&self, var: DomainId) -> Vec<i32> {
        self.assignments.domain_iterator(var).collect()
    }

    pub(crate) fn assert_bounds(&self, var: DomainId, lower: i32, upper: i32) {
        assert_eq!(
            (lower, upper),
            (self.lower_bound(var), self.upper_bound(var)),
            "expected {var:?} to have bounds {lower}..={upper}"
        );
    }

    pub(crate) fn assert_domain(&self, var: DomainId, expected: impl IntoIterator<Item = i32>) {
        let expected: Vec<i32> = expected.into_iter().collect();
        assert_eq!(
            expected,
            self.domain(var),
            "unexpected domain for {var:?}"
        );
    }
}
