//! Value-consistent filtering of the global cardinality constraint.

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
use crate::variables::IntegerVariable;

/// The cheap counting propagator: a value fixed in as many variables as its
/// maximum count disappears from the remaining variables, and a value with
/// exactly as many candidate variables as its minimum count claims them all.
/// Runs these two rules to a local fixpoint.
#[derive(Clone, Debug)]
pub struct GlobalCardinalityValuePropagator<Var> {
    variables: Box<[Var]>,
    cardinalities: Vec<Cardinality<Var>>,
    closed: bool,
    is_view: bool,
}

impl<Var: IntegerVariable> GlobalCardinalityValuePropagator<Var> {
    pub fn new(
        variables: Box<[Var]>,
        cardinalities: Vec<Cardinality<Var>>,
        closed: bool,
    ) -> Self {
        let is_view = cardinalities.iter().any(Cardinality::is_variable);
        GlobalCardinalityValuePropagator {
            variables,
            cardinalities,
            closed,
            is_view,
        }
    }
}

impl<Var: IntegerVariable + 'static> Propagator for GlobalCardinalityValuePropagator<Var> {
    fn name(&self) -> &str {
        "GlobalCardinalityValue"
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
        let mut candidates: Vec<usize> = Vec::with_capacity(self.variables.len());
        let mut change = ModEvent::None;
        loop {
            let mut round = ModEvent::None;
            if self.is_view {
                round = round.join(prune_cards(
                    &mut context,
                    &self.variables,
                    &mut self.cardinalities,
                )?);
            }
            for index in 0..self.cardinalities.len() {
                let value = self.cardinalities[index].value();
                candidates.clear();
                let mut fixed = 0;
                for (position, var) in self.variables.iter().enumerate() {
                    if context.contains(var, value) {
                        candidates.push(position);
                        if context.is_fixed(var) {
                            fixed += 1;
                        }
                    }
                }
                self.cardinalities[index].set_counter(fixed);
                let minimum = self.cardinalities[index].min(&context);
                let maximum = self.cardinalities[index].max(&context);
                if fixed > maximum {
                    return Err(Inconsistency::CapacityExceeded { value });
                }
                if (candidates.len() as i32) < minimum {
                    return Err(Inconsistency::InsufficientSupply { value });
                }
                if fixed == maximum {
                    // the value is used up; it disappears from the unassigned
                    // variables
                    for var in self.variables.iter() {
                        if !context.is_fixed(var) {
                            round = round.join(context.remove(var, value)?);
                        }
                    }
                } else if candidates.len() as i32 == minimum && minimum > 0 {
                    // every remaining candidate is needed
                    for &position in &candidates {
                        round = round.join(context.assign(&self.variables[position], value)?);
                    }
                }
            }
            if !round.changed() {
                break;
            }
            change = change.join(round);
        }
        conclude(&mut context, &self.variables, &mut self.cardinalities, change)
    }

    fn cost(&self, _context: PropagationContext<'_>) -> CostClass {
        CostClass::LinearHi
    }
}
