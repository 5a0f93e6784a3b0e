//! Occurrence specifications: how often a value must appear in the constrained
//! sequence.

use crate::basic_types::EmptyDomain;
use crate::engine::cp::domain_events::ModEvent;
use crate::engine::cp::propagation::propagation_context::ReadDomains;
use crate::engine::cp::propagation::PropagationContextMut;
use crate::variables::IntegerVariable;

/// A required occurrence count for one value: the value must be taken by
/// between `min` and `max` of the constrained variables.
///
/// The count is either a fixed interval or backed by an integer variable, in
/// which case the propagators also tighten the count's own bounds. The
/// `counter` tracks how many variables are currently assigned to the value
/// during a propagation pass.
#[derive(Clone, Debug)]
pub struct Cardinality<Var> {
    value: i32,
    bounds: CountBounds<Var>,
    counter: i32,
}

#[derive(Clone, Debug)]
enum CountBounds<Var> {
    Fixed { min: i32, max: i32 },
    Variable(Var),
}

impl<Var: IntegerVariable> Cardinality<Var> {
    /// An occurrence count fixed at posting time.
    pub fn fixed(value: i32, min: i32, max: i32) -> Cardinality<Var> {
        assert!(0 <= min && min <= max, "occurrence bounds must be a non-negative interval");
        Cardinality {
            value,
            bounds: CountBounds::Fixed { min, max },
            counter: 0,
        }
    }

    /// An occurrence count backed by an integer variable.
    pub fn from_variable(value: i32, count: Var) -> Cardinality<Var> {
        Cardinality {
            value,
            bounds: CountBounds::Variable(count),
            counter: 0,
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.bounds, CountBounds::Variable(_))
    }

    /// The fewest occurrences the value must still get.
    pub fn min(&self, context: &impl ReadDomains) -> i32 {
        match &self.bounds {
            CountBounds::Fixed { min, .. } => *min,
            CountBounds::Variable(count) => context.lower_bound(count),
        }
    }

    /// The most occurrences the value may still get.
    pub fn max(&self, context: &impl ReadDomains) -> i32 {
        match &self.bounds {
            CountBounds::Fixed { max, .. } => *max,
            CountBounds::Variable(count) => context.upper_bound(count),
        }
    }

    pub(crate) fn counter(&self) -> i32 {
        self.counter
    }

    pub(crate) fn set_counter(&mut self, counter: i32) {
        self.counter = counter;
    }

    /// Raises the count's lower bound. A no-op for fixed counts; callers check
    /// the fixed interval themselves.
    pub(crate) fn tighten_min(
        &self,
        context: &mut PropagationContextMut<'_>,
        bound: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        match &self.bounds {
            CountBounds::Fixed { .. } => Ok(ModEvent::None),
            CountBounds::Variable(count) => context.set_lower_bound(count, bound),
        }
    }

    /// Lowers the count's upper bound. A no-op for fixed counts.
    pub(crate) fn tighten_max(
        &self,
        context: &mut PropagationContextMut<'_>,
        bound: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        match &self.bounds {
            CountBounds::Fixed { .. } => Ok(ModEvent::None),
            CountBounds::Variable(count) => context.set_upper_bound(count, bound),
        }
    }

    /// Fixes the count once the number of occurrences is decided.
    pub(crate) fn fix(
        &self,
        context: &mut PropagationContextMut<'_>,
        occurrences: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        match &self.bounds {
            CountBounds::Fixed { .. } => Ok(ModEvent::None),
            CountBounds::Variable(count) => context.assign(count, occurrences),
        }
    }

    /// The backing count variable, if any.
    pub(crate) fn count_variable(&self) -> Option<&Var> {
        match &self.bounds {
            CountBounds::Fixed { .. } => None,
            CountBounds::Variable(count) => Some(count),
        }
    }
}
