//! Propagators for the global cardinality constraint.
//!
//! Given variables `x[0..n)` and occurrence specifications pairing a value
//! with a count interval, the constraint holds when every value is taken by a
//! number of variables within its interval. Three propagators of increasing
//! strength are provided:
//!
//! - [`GlobalCardinalityValuePropagator`]: value-consistent counting. Saturated
//!   values are removed from the other variables, values with exactly as many
//!   candidates as required occurrences force those candidates.
//! - [`GlobalCardinalityBoundsPropagator`]: bounds-consistent filtering via
//!   Hall intervals over partial-sum capacity structures.
//! - [`GlobalCardinalityDomainPropagator`]: domain-consistent filtering via a
//!   persistent variable-value graph with a many-to-one matching and strongly
//!   connected component analysis.
//!
//! Occurrence counts may be backed by integer variables, in which case the
//! propagators also tighten the counts. The counts are treated as a closed
//! world: a value no occurrence specification covers is either removed from
//! all variables at posting time (`closed`) or receives an implicit
//! unconstrained specification (`open`), so that the occurrence counts of all
//! specified values always partition the variables.

pub mod cardinality;
mod bounds;
mod domain;
mod hall;
mod partial_sum;
mod value;
mod var_val_graph;

pub use bounds::GlobalCardinalityBoundsPropagator;
pub use cardinality::Cardinality;
pub use domain::GlobalCardinalityDomainPropagator;
pub use value::GlobalCardinalityValuePropagator;

use log::debug;

use crate::basic_types::Inconsistency;
use crate::basic_types::Propagation;
use crate::basic_types::PropagationStatusCP;
use crate::engine::cp::domain_events::ModEvent;
use crate::engine::cp::propagation::propagation_context::ReadDomains;
use crate::engine::cp::propagation::PropagationContextMut;
use crate::engine::cp::propagation::PropagatorInitialisationContext;
use crate::variables::IntegerVariable;

/// Checks the posting contract and normalises the occurrence specifications.
///
/// After this call the specifications are sorted by value, cover every value
/// occurring in some domain, have their count variables clamped to `0..=n`,
/// values without capacity are removed from all domains, and the total counts
/// are known to admit `n` occurrences.
pub(crate) fn initialise_cardinalities<Var: IntegerVariable>(
    context: &mut PropagatorInitialisationContext<'_>,
    variables: &[Var],
    cardinalities: &mut Vec<Cardinality<Var>>,
    closed: bool,
) -> Result<(), Inconsistency> {
    let n = variables.len() as i32;
    cardinalities.sort_by_key(Cardinality::value);
    assert!(
        cardinalities
            .windows(2)
            .all(|pair| pair[0].value() < pair[1].value()),
        "occurrence specifications must name distinct values"
    );
    for cardinality in cardinalities.iter() {
        if let Some(count) = cardinality.count_variable() {
            let _ = context.set_lower_bound(count, 0)?;
            let _ = context.set_upper_bound(count, n)?;
        }
    }

    let specified: Vec<i32> = cardinalities.iter().map(Cardinality::value).collect();
    let mut uncovered: Vec<i32> = Vec::new();
    for var in variables {
        for value in context.iterate_domain(var) {
            if specified.binary_search(&value).is_err() {
                uncovered.push(value);
            }
        }
    }
    uncovered.sort_unstable();
    uncovered.dedup();
    if closed {
        for var in variables {
            for &value in &uncovered {
                let _ = context.remove(var, value)?;
            }
        }
    } else {
        for &value in &uncovered {
            cardinalities.push(Cardinality::fixed(value, 0, n));
        }
        cardinalities.sort_by_key(Cardinality::value);
    }

    for cardinality in cardinalities.iter() {
        if cardinality.max(context) == 0 {
            for var in variables {
                let _ = context.remove(var, cardinality.value())?;
            }
        }
    }

    let total_min: i32 = cardinalities.iter().map(|c| c.min(context)).sum();
    let total_max: i32 = cardinalities.iter().map(|c| c.max(context)).sum();
    if total_min > n {
        let value = cardinalities
            .iter()
            .find(|c| c.min(context) > 0)
            .map(Cardinality::value)
            .unwrap_or_default();
        return Err(Inconsistency::InsufficientSupply { value });
    }
    if total_max < n {
        let value = cardinalities
            .first()
            .map(Cardinality::value)
            .unwrap_or_default();
        return Err(Inconsistency::CapacityExceeded { value });
    }
    debug!(
        "posted occurrence constraint over {} variables and {} values (closed: {closed})",
        variables.len(),
        cardinalities.len(),
    );
    Ok(())
}

/// Tightens variable-backed counts from the current domains: a count is at
/// least the number of variables fixed to its value and at most the number of
/// variables still containing it, and since the counts of all specified values
/// partition the variables, the counts also bound each other through their
/// sums. Values without remaining capacity are removed from every domain.
pub(crate) fn prune_cards<Var: IntegerVariable>(
    context: &mut PropagationContextMut<'_>,
    variables: &[Var],
    cardinalities: &mut [Cardinality<Var>],
) -> Result<ModEvent, Inconsistency> {
    let n = variables.len() as i32;
    let minimums: Vec<i32> = cardinalities.iter().map(|c| c.min(context)).collect();
    let maximums: Vec<i32> = cardinalities.iter().map(|c| c.max(context)).collect();
    let total_min: i32 = minimums.iter().sum();
    let total_max: i32 = maximums.iter().sum();

    let mut change = ModEvent::None;
    for index in 0..cardinalities.len() {
        let value = cardinalities[index].value();
        let mut fixed = 0;
        let mut possible = 0;
        for var in variables {
            if context.contains(var, value) {
                possible += 1;
                if context.is_fixed(var) {
                    fixed += 1;
                }
            }
        }
        cardinalities[index].set_counter(fixed);

        let cardinality = &cardinalities[index];
        if fixed > cardinality.max(context) {
            return Err(Inconsistency::CapacityExceeded { value });
        }
        if possible < cardinality.min(context) {
            return Err(Inconsistency::InsufficientSupply { value });
        }
        // the counts of the other values claim the remaining variables
        let lower_from_sums = n - (total_max - maximums[index]);
        let upper_from_sums = n - (total_min - minimums[index]);
        if lower_from_sums > cardinality.max(context) || upper_from_sums < cardinality.min(context)
        {
            return Err(Inconsistency::InconsistentCardinality { value });
        }
        change = change.join(cardinality.tighten_min(context, fixed.max(lower_from_sums))?);
        change = change.join(cardinality.tighten_max(context, possible.min(upper_from_sums))?);

        if cardinality.max(context) == 0 {
            for var in variables {
                change = change.join(context.remove(var, value)?);
            }
        }
    }
    Ok(change)
}

/// The common tail of every propagate call: once all variables are assigned
/// the counters are checked against their intervals, variable-backed counts
/// are fixed and the propagator is subsumed. Otherwise any change means the
/// propagator wants to run again.
pub(crate) fn conclude<Var: IntegerVariable>(
    context: &mut PropagationContextMut<'_>,
    variables: &[Var],
    cardinalities: &mut [Cardinality<Var>],
    change: ModEvent,
) -> PropagationStatusCP {
    if variables.iter().all(|var| context.is_fixed(var)) {
        for index in 0..cardinalities.len() {
            let value = cardinalities[index].value();
            let occurrences = variables
                .iter()
                .filter(|var| context.lower_bound(*var) == value)
                .count() as i32;
            cardinalities[index].set_counter(occurrences);
            let cardinality = &cardinalities[index];
            if cardinality.counter() > cardinality.max(context) {
                return Err(Inconsistency::CapacityExceeded { value });
            }
            if cardinality.counter() < cardinality.min(context) {
                return Err(Inconsistency::InsufficientSupply { value });
            }
            let _ = cardinality.fix(context, occurrences)?;
        }
        return Ok(Propagation::Subsumed);
    }
    if change.changed() {
        Ok(Propagation::NotAtFixpoint)
    } else {
        Ok(Propagation::AtFixpoint)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::engine::test_helper::TestSolver;
    use crate::variables::DomainId;

    struct Instance {
        domains: Vec<Vec<i32>>,
        counts: Vec<(i32, i32, i32)>,
    }

    impl Instance {
        /// All assignments over the current domains that satisfy every count.
        fn solutions(&self) -> Vec<Vec<i32>> {
            let mut solutions = Vec::new();
            let mut assignment = vec![0; self.domains.len()];
            self.enumerate(0, &mut assignment, &mut solutions);
            solutions
        }

        fn enumerate(&self, depth: usize, assignment: &mut [i32], solutions: &mut Vec<Vec<i32>>) {
            if depth == self.domains.len() {
                let satisfied = self.counts.iter().all(|&(value, min, max)| {
                    let occurrences =
                        assignment.iter().filter(|&&taken| taken == value).count() as i32;
                    min <= occurrences && occurrences <= max
                });
                if satisfied {
                    solutions.push(assignment.to_vec());
                }
                return;
            }
            for &value in &self.domains[depth] {
                assignment[depth] = value;
                self.enumerate(depth + 1, assignment, solutions);
            }
        }

        /// Per variable, the values that appear in some solution.
        fn supported(&self) -> Vec<Vec<i32>> {
            let solutions = self.solutions();
            self.domains
                .iter()
                .enumerate()
                .map(|(index, domain)| {
                    domain
                        .iter()
                        .copied()
                        .filter(|&value| {
                            solutions.iter().any(|solution| solution[index] == value)
                        })
                        .collect()
                })
                .collect()
        }
    }

    #[derive(Clone, Copy)]
    enum Variant {
        Value,
        Bounds,
        Domain,
    }

    fn run(
        instance: &Instance,
        variant: Variant,
    ) -> Result<(TestSolver, Vec<DomainId>), Inconsistency> {
        let mut solver = TestSolver::default();
        let variables: Vec<DomainId> = instance
            .domains
            .iter()
            .map(|values| solver.new_sparse_variable(values))
            .collect();
        let cardinalities: Vec<Cardinality<DomainId>> = instance
            .counts
            .iter()
            .map(|&(value, min, max)| Cardinality::fixed(value, min, max))
            .collect();
        let boxed = variables.clone().into_boxed_slice();
        let posted = match variant {
            Variant::Value => solver.new_propagator(GlobalCardinalityValuePropagator::new(
                boxed,
                cardinalities,
                true,
            )),
            Variant::Bounds => solver.new_propagator(GlobalCardinalityBoundsPropagator::new(
                boxed,
                cardinalities,
                true,
            )),
            Variant::Domain => solver.new_propagator(GlobalCardinalityDomainPropagator::new(
                boxed,
                cardinalities,
                true,
            )),
        };
        posted.map(|_| (solver, variables))
    }

    fn random_instance(rng: &mut SmallRng, interval_domains: bool) -> Instance {
        let num_variables = rng.gen_range(2..=4);
        let domains = (0..num_variables)
            .map(|_| {
                if interval_domains {
                    let lower = rng.gen_range(1..=4);
                    let upper = rng.gen_range(lower..=4);
                    (lower..=upper).collect()
                } else {
                    let mut values: Vec<i32> =
                        (1..=4).filter(|_| rng.gen_bool(0.6)).collect();
                    if values.is_empty() {
                        values.push(rng.gen_range(1..=4));
                    }
                    values
                }
            })
            .collect();
        let counts = (1..=4)
            .map(|value| {
                let min = rng.gen_range(0..=2);
                let max = rng.gen_range(min..=4);
                (value, min, max)
            })
            .collect();
        Instance { domains, counts }
    }

    #[test]
    fn domain_propagation_matches_brute_force_arc_consistency() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for round in 0..200 {
            let instance = random_instance(&mut rng, round % 2 == 0);
            let supported = instance.supported();
            let has_solution = supported.iter().all(|values| !values.is_empty())
                && !instance.domains.is_empty();
            match run(&instance, Variant::Domain) {
                Err(_) => assert!(
                    !has_solution,
                    "round {round}: propagation failed on a satisfiable instance"
                ),
                Ok((solver, variables)) => {
                    assert!(has_solution, "round {round}: failure was not detected");
                    for (index, &var) in variables.iter().enumerate() {
                        assert_eq!(
                            supported[index],
                            solver.domain(var),
                            "round {round}: variable {index} is not arc consistent"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn weaker_variants_never_prune_supported_values() {
        let mut rng = SmallRng::seed_from_u64(0xacc);
        for round in 0..200 {
            let instance = random_instance(&mut rng, round % 2 == 0);
            let supported = instance.supported();
            let has_solution = supported.iter().all(|values| !values.is_empty());
            for variant in [Variant::Value, Variant::Bounds] {
                match run(&instance, variant) {
                    Err(_) => assert!(
                        !has_solution,
                        "round {round}: propagation failed on a satisfiable instance"
                    ),
                    Ok((solver, variables)) => {
                        for (index, &var) in variables.iter().enumerate() {
                            for &value in &supported[index] {
                                assert!(
                                    solver.domain(var).contains(&value),
                                    "round {round}: supported value {value} was pruned"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn propagation_strength_is_ordered() {
        let mut rng = SmallRng::seed_from_u64(0x07de7);
        for round in 0..200 {
            let instance = random_instance(&mut rng, round % 2 == 0);
            let strongest = run(&instance, Variant::Domain);
            for variant in [Variant::Value, Variant::Bounds] {
                match (run(&instance, variant), &strongest) {
                    (Err(_), Ok(_)) => panic!(
                        "round {round}: a weaker variant failed where the domain variant did not"
                    ),
                    (Ok((weaker, weaker_vars)), Ok((domain, domain_vars))) => {
                        for (index, (&weak, &strong)) in
                            weaker_vars.iter().zip(domain_vars.iter()).enumerate()
                        {
                            for value in domain.domain(strong) {
                                assert!(
                                    weaker.domain(weak).contains(&value),
                                    "round {round}: variable {index} lost value {value} \
                                     in a weaker variant"
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
