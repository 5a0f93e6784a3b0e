//! Bounds-consistent filtering of the global cardinality constraint.

use log::trace;

use crate::basic_types::Inconsistency;
use crate::basic_types::Propagation;
use crate::basic_types::PropagationStatusCP;
use crate::engine::cp::domain_events::DomainEvents;
use crate::engine::cp::domain_events::ModEvent;
use crate::engine::cp::propagation::propagation_context::ReadDomains;
use crate::engine::cp::propagation::CostClass;
use crate::engine::cp::propagation::PropagationContext;
use crate::engine::cp::propagation::PropagationContextMut;
use crate::engine::cp::propagation::Propagator;
use crate::engine::cp::propagation::PropagatorInitialisationContext;
use crate::propagators::global_cardinality::cardinality::Cardinality;
use crate::propagators::global_cardinality::conclude;
use crate::propagators::global_cardinality::hall::HallFilter;
use crate::propagators::global_cardinality::hall::LowerFilter;
use crate::propagators::global_cardinality::initialise_cardinalities;
use crate::propagators::global_cardinality::partial_sum::PartialSum;
use crate::propagators::global_cardinality::prune_cards;
use crate::variables::IntegerVariable;

/// Bounds-consistent filtering: two partial-sum capacity structures are built
/// over the specified values, one from the maximum counts (`ups`) and one from
/// the minimum counts (`lps`); the Hall-interval sweeps narrow the variable
/// bounds against `ups`, the demand filter against `lps`. The partial sums are
/// cached while the counts are fixed and rebuilt whenever they may have moved.
#[derive(Clone, Debug)]
pub struct GlobalCardinalityBoundsPropagator<Var> {
    variables: Box<[Var]>,
    cardinalities: Vec<Cardinality<Var>>,
    closed: bool,
    is_view: bool,
    ups: Option<PartialSum>,
    lps: Option<PartialSum>,
    hall: HallFilter,
    lower: LowerFilter,
    intervals: Vec<(i32, i32)>,
}

impl<Var: IntegerVariable> GlobalCardinalityBoundsPropagator<Var> {
    pub fn new(
        variables: Box<[Var]>,
        cardinalities: Vec<Cardinality<Var>>,
        closed: bool,
    ) -> Self {
        let is_view = cardinalities.iter().any(Cardinality::is_variable);
        GlobalCardinalityBoundsPropagator {
            variables,
            cardinalities,
            closed,
            is_view,
            ups: None,
            lps: None,
            hall: HallFilter::default(),
            lower: LowerFilter::default(),
            intervals: Vec::new(),
        }
    }

    fn rebuild_partial_sums(&mut self, context: &PropagationContextMut<'_>) {
        if !self.is_view && self.ups.is_some() {
            return;
        }
        let min_value = self.cardinalities.first().map(Cardinality::value).unwrap();
        let max_value = self.cardinalities.last().map(Cardinality::value).unwrap();
        let maximums: Vec<(i32, i32)> = self
            .cardinalities
            .iter()
            .map(|c| (c.value(), c.max(context)))
            .collect();
        let minimums: Vec<(i32, i32)> = self
            .cardinalities
            .iter()
            .map(|c| (c.value(), c.min(context)))
            .collect();
        self.ups = Some(PartialSum::new(min_value, max_value, &maximums));
        self.lps = Some(PartialSum::new(min_value, max_value, &minimums));
    }
}

impl<Var: IntegerVariable + 'static> Propagator for GlobalCardinalityBoundsPropagator<Var> {
    fn name(&self) -> &str {
        "GlobalCardinalityBounds"
    }

    fn initialise_at_root(
        &mut self,
        context: &mut PropagatorInitialisationContext<'_>,
    ) -> Result<(), Inconsistency> {
        if self.cardinalities.is_empty() {
            return Ok(());
        }
        initialise_cardinalities(context, &self.variables, &mut self.cardinalities, self.closed)?;
        for var in self.variables.iter() {
            context.register(var.clone(), DomainEvents::BOUNDS);
        }
        for cardinality in &self.cardinalities {
            if let Some(count) = cardinality.count_variable() {
                context.register(count.clone(), DomainEvents::BOUNDS);
            }
        }
        Ok(())
    }

    fn propagate(&mut self, mut context: PropagationContextMut<'_>) -> PropagationStatusCP {
        if self.cardinalities.is_empty() {
            return Ok(Propagation::Subsumed);
        }
        let mut change = ModEvent::None;
        if self.is_view {
            change = change.join(prune_cards(
                &mut context,
                &self.variables,
                &mut self.cardinalities,
            )?);
        }
        self.rebuild_partial_sums(&context);

        self.intervals.clear();
        self.intervals.extend(
            self.variables
                .iter()
                .map(|var| (context.lower_bound(var), context.upper_bound(var))),
        );
        let ups = self.ups.as_ref().unwrap();
        let lps = self.lps.as_ref().unwrap();
        let mut narrowed = self.hall.filter(&mut self.intervals, ups)?;

        // with every count fixed the totals match the number of variables
        // exactly, so saturating the capacities already meets the minima
        let card_fixed = self
            .cardinalities
            .iter()
            .all(|c| c.min(&context) == c.max(&context));
        let skip_lower = self.cardinalities.iter().all(|c| c.min(&context) == 0);
        if !card_fixed && !skip_lower {
            narrowed |= self.lower.filter(&mut self.intervals, lps)?;
        }
        if narrowed {
            trace!("hall filtering narrowed the variable bounds");
        }

        for (index, var) in self.variables.iter().enumerate() {
            change = change.join(context.set_lower_bound(var, self.intervals[index].0)?);
            change = change.join(context.set_upper_bound(var, self.intervals[index].1)?);
        }
        if self.is_view {
            change = change.join(prune_cards(
                &mut context,
                &self.variables,
                &mut self.cardinalities,
            )?);
        }
        conclude(&mut context, &self.variables, &mut self.cardinalities, change)
    }

    fn cost(&self, _context: PropagationContext<'_>) -> CostClass {
        CostClass::LinearLo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_helper::TestSolver;
    use crate::variables::DomainId;

    fn cards(entries: &[(i32, i32, i32)]) -> Vec<Cardinality<DomainId>> {
        entries
            .iter()
            .map(|&(value, min, max)| Cardinality::fixed(value, min, max))
            .collect()
    }

    #[test]
    fn hall_interval_pushes_the_spanning_variable() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let _ = solver
            .new_propagator(GlobalCardinalityBoundsPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 1, 1), (2, 1, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.assert_bounds(x0, 1, 2);
        solver.assert_bounds(x1, 1, 2);
        solver.assert_bounds(x2, 3, 3);
    }

    #[test]
    fn loose_counts_leave_the_bounds_alone() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 2);

        let id = solver
            .new_propagator(GlobalCardinalityBoundsPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 1, 3), (2, 1, 3)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.assert_bounds(x0, 1, 2);
        solver.assert_bounds(x1, 1, 2);
        solver.assert_bounds(x2, 1, 2);
        assert_eq!(Ok(Propagation::AtFixpoint), solver.propagate(id));
    }

    #[test]
    fn shortage_of_capacity_fails_at_posting() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 2);

        let result = solver.new_propagator(GlobalCardinalityBoundsPropagator::new(
            Box::new([x0, x1, x2]),
            cards(&[(1, 0, 1), (2, 0, 1)]),
            true,
        ));

        assert!(result.is_err());
    }

    #[test]
    fn demands_tighten_upper_bounds() {
        // three variables, value 1 needs two of them and value 3 one; the
        // variable capped at 2 must supply value 1
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 2);

        let _ = solver
            .new_propagator(GlobalCardinalityBoundsPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 2, 2), (2, 0, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.assert_bounds(x2, 1, 1);
    }

    #[test]
    fn variable_counts_are_tightened_to_the_candidates() {
        let mut solver = TestSolver::default();
        let x: Vec<DomainId> = (0..4).map(|_| solver.new_variable(1, 5)).collect();
        let counts: Vec<DomainId> = (0..5).map(|_| solver.new_variable(0, 5)).collect();
        let cardinalities = counts
            .iter()
            .enumerate()
            .map(|(index, &count)| Cardinality::from_variable(index as i32 + 1, count))
            .collect();

        let _ = solver
            .new_propagator(GlobalCardinalityBoundsPropagator::new(
                x.clone().into_boxed_slice(),
                cardinalities,
                true,
            ))
            .expect("expected feasible posting");

        for &count in &counts {
            solver.assert_bounds(count, 0, 4);
        }
        for &var in &x {
            solver.assert_bounds(var, 1, 5);
        }
    }

    #[test]
    fn fixed_view_counts_behave_like_fixed_counts() {
        let mut run = |with_views: bool| {
            let mut solver = TestSolver::default();
            let x0 = solver.new_variable(1, 2);
            let x1 = solver.new_variable(1, 2);
            let x2 = solver.new_variable(1, 3);
            let cardinalities = if with_views {
                (1..=3)
                    .map(|value| {
                        let count = solver.new_variable(1, 1);
                        Cardinality::from_variable(value, count)
                    })
                    .collect()
            } else {
                cards(&[(1, 1, 1), (2, 1, 1), (3, 1, 1)])
            };
            let _ = solver
                .new_propagator(GlobalCardinalityBoundsPropagator::new(
                    Box::new([x0, x1, x2]),
                    cardinalities,
                    true,
                ))
                .expect("expected feasible posting");
            (
                (solver.lower_bound(x0), solver.upper_bound(x0)),
                (solver.lower_bound(x1), solver.upper_bound(x1)),
                (solver.lower_bound(x2), solver.upper_bound(x2)),
            )
        };

        assert_eq!(run(false), run(true));
    }

    #[test]
    fn bounds_follow_external_decisions() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);

        let id = solver
            .new_propagator(GlobalCardinalityBoundsPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 1, 1), (2, 1, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.set_upper_bound(x0, 1).expect("decision is consistent");
        solver.set_lower_bound(x2, 3).expect("decision is consistent");
        solver.propagate_until_fixpoint().expect("still satisfiable");

        assert!(solver.is_fixed(x0));
        solver.assert_bounds(x1, 2, 2);
        assert!(solver.is_subsumed(id));
        solver
            .assign(x1, 2)
            .expect("the decided variable accepts its value");
    }

    #[test]
    fn second_invocation_is_at_fixpoint() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let id = solver
            .new_propagator(GlobalCardinalityBoundsPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 0, 1), (2, 0, 2), (3, 0, 2)]),
                true,
            ))
            .expect("expected feasible posting");

        let before: Vec<(i32, i32)> = [x0, x1, x2]
            .iter()
            .map(|&v| (solver.lower_bound(v), solver.upper_bound(v)))
            .collect();
        assert_eq!(Ok(Propagation::AtFixpoint), solver.propagate(id));
        let after: Vec<(i32, i32)> = [x0, x1, x2]
            .iter()
            .map(|&v| (solver.lower_bound(v), solver.upper_bound(v)))
            .collect();
        assert_eq!(before, after);
    }
}
