//! Domain-consistent filtering of the global cardinality constraint.

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
use crate::propagators::global_cardinality::initialise_cardinalities;
use crate::propagators::global_cardinality::prune_cards;
use crate::propagators::global_cardinality::var_val_graph::VarValGraph;
use crate::variables::IntegerVariable;

/// Domain-consistent filtering: a persistent variable-value graph carries a
/// many-to-one matching which is repaired incrementally on every invocation;
/// after repair, every edge outside a strongly connected component of the
/// matching orientation is pruned. The graph survives between invocations and
/// deep-clones with the propagator when the search state is copied.
#[derive(Clone, Debug)]
pub struct GlobalCardinalityDomainPropagator<Var> {
    variables: Box<[Var]>,
    cardinalities: Vec<Cardinality<Var>>,
    closed: bool,
    is_view: bool,
    graph: Option<VarValGraph>,
}

impl<Var: IntegerVariable> GlobalCardinalityDomainPropagator<Var> {
    pub fn new(
        variables: Box<[Var]>,
        cardinalities: Vec<Cardinality<Var>>,
        closed: bool,
    ) -> Self {
        let is_view = cardinalities.iter().any(Cardinality::is_variable);
        GlobalCardinalityDomainPropagator {
            variables,
            cardinalities,
            closed,
            is_view,
            graph: None,
        }
    }
}

impl<Var: IntegerVariable + 'static> Propagator for GlobalCardinalityDomainPropagator<Var> {
    fn name(&self) -> &str {
        "GlobalCardinalityDomain"
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
            context.register(var.clone(), DomainEvents::ANY_INT);
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
        let minimums: Vec<i32> = self
            .cardinalities
            .iter()
            .map(|c| c.min(&context))
            .collect();
        let maximums: Vec<i32> = self
            .cardinalities
            .iter()
            .map(|c| c.max(&context))
            .collect();

        match self.graph.as_mut() {
            None => {
                let values: Vec<i32> =
                    self.cardinalities.iter().map(Cardinality::value).collect();
                self.graph = Some(VarValGraph::new(&context, &self.variables, &values));
            }
            Some(graph) => graph.sync(&context, &self.variables),
        }
        let graph = self.graph.as_mut().unwrap();
        graph.enforce_maximums(&maximums);
        graph.saturate_values(&minimums)?;
        graph.saturate_variables(&maximums)?;

        let prunable = graph.prunable_edges(&minimums, &maximums);
        if !prunable.is_empty() {
            trace!("{} edges lie on no feasible matching", prunable.len());
        }
        for (index, value) in prunable {
            change = change.join(context.remove(&self.variables[index], value)?);
            graph.remove_edge(index, value);
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

    fn cost(&self, context: PropagationContext<'_>) -> CostClass {
        let n = self.variables.len();
        let d = self
            .variables
            .iter()
            .map(|var| context.size(var))
            .max()
            .unwrap_or(0);
        if d < 6 {
            CostClass::LinearLo
        } else if d < n / 2 {
            CostClass::LinearHi
        } else if d < n * n {
            CostClass::QuadraticLo
        } else {
            CostClass::CubicHi
        }
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
    fn permutation_domains_stay_arc_consistent() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);

        let _ = solver
            .new_propagator(GlobalCardinalityDomainPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 1, 1), (2, 1, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.assert_domain(x0, [1, 2, 3]);
        solver.assert_domain(x1, [1, 2, 3]);
        solver.assert_domain(x2, [1, 2, 3]);
    }

    #[test]
    fn hall_set_prunes_the_spanning_variable() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let _ = solver
            .new_propagator(GlobalCardinalityDomainPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 1, 1), (2, 1, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.assert_domain(x2, [3]);
    }

    #[test]
    fn interior_values_without_support_are_removed() {
        // value 1 needs two occurrences and value 3 exactly one, so nobody can
        // afford to sit on value 2
        let mut solver = TestSolver::default();
        let x0 = solver.new_sparse_variable(&[1, 3]);
        let x1 = solver.new_sparse_variable(&[1, 3]);
        let x2 = solver.new_variable(1, 3);

        let _ = solver
            .new_propagator(GlobalCardinalityDomainPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 2, 2), (2, 0, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.assert_domain(x2, [1, 3]);
    }

    #[test]
    fn infeasible_counts_fail() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 2);

        let result = solver.new_propagator(GlobalCardinalityDomainPropagator::new(
            Box::new([x0, x1, x2]),
            cards(&[(1, 0, 1), (2, 0, 1)]),
            true,
        ));

        assert!(result.is_err());
    }

    #[test]
    fn matching_is_repaired_after_external_removals() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);

        let id = solver
            .new_propagator(GlobalCardinalityDomainPropagator::new(
                Box::new([x0, x1, x2]),
                cards(&[(1, 1, 1), (2, 1, 1), (3, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        solver.remove(x2, 3).expect("removal is consistent");
        solver.remove(x1, 3).expect("removal is consistent");
        assert!(solver.propagate(id).is_ok());

        // the two variables confined to {1, 2} form a tight set
        solver.assert_domain(x0, [3]);
        solver.assert_domain(x1, [1, 2]);
        solver.assert_domain(x2, [1, 2]);
    }

    #[test]
    fn free_counts_stay_within_the_candidate_range() {
        let mut solver = TestSolver::default();
        let x: Vec<DomainId> = (0..4).map(|_| solver.new_variable(1, 5)).collect();
        let counts: Vec<DomainId> = (0..5).map(|_| solver.new_variable(0, 4)).collect();
        let cardinalities = counts
            .iter()
            .enumerate()
            .map(|(index, &count)| Cardinality::from_variable(index as i32 + 1, count))
            .collect();

        let _ = solver
            .new_propagator(GlobalCardinalityDomainPropagator::new(
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
    fn single_value_instance_is_decided_at_posting() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(7, 7);

        let id = solver
            .new_propagator(GlobalCardinalityDomainPropagator::new(
                Box::new([x0]),
                cards(&[(7, 1, 1)]),
                true,
            ))
            .expect("expected feasible posting");

        assert!(solver.is_subsumed(id));
    }
}
