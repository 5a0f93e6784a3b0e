//! Contexts through which propagators read and mutate domains.

use crate::basic_types::EmptyDomain;
use crate::engine::cp::assignments::Assignments;
use crate::engine::cp::domain_events::ModEvent;
use crate::variables::IntegerVariable;

/// Read access to the current domains.
pub trait ReadDomains {
    fn assignments(&self) -> &Assignments;

    fn lower_bound(&self, var: &impl IntegerVariable) -> i32 {
        self.assignments().lower_bound(var.id())
    }

    fn upper_bound(&self, var: &impl IntegerVariable) -> i32 {
        self.assignments().upper_bound(var.id())
    }

    fn size(&self, var: &impl IntegerVariable) -> usize {
        self.assignments().size(var.id())
    }

    fn is_fixed(&self, var: &impl IntegerVariable) -> bool {
        self.assignments().is_fixed(var.id())
    }

    fn contains(&self, var: &impl IntegerVariable, value: i32) -> bool {
        self.assignments().contains(var.id(), value)
    }

    /// The values of the variable's domain in ascending order.
    fn iterate_domain<'a>(&'a self, var: &impl IntegerVariable) -> impl Iterator<Item = i32> + 'a {
        self.assignments().domain_iterator(var.id())
    }
}

/// The read-only context handed to cost estimation.
#[derive(Clone, Copy, Debug)]
pub struct PropagationContext<'a> {
    assignments: &'a Assignments,
}

impl<'a> PropagationContext<'a> {
    pub fn new(assignments: &'a Assignments) -> Self {
        PropagationContext { assignments }
    }
}

impl ReadDomains for PropagationContext<'_> {
    fn assignments(&self) -> &Assignments {
        self.assignments
    }
}

/// The context handed to [`Propagator::propagate`](super::Propagator::propagate).
///
/// Every mutator returns the [`ModEvent`] describing the change it made, or
/// [`EmptyDomain`] when the domain would run empty.
#[derive(Debug)]
pub struct PropagationContextMut<'a> {
    assignments: &'a mut Assignments,
}

impl<'a> PropagationContextMut<'a> {
    pub fn new(assignments: &'a mut Assignments) -> Self {
        PropagationContextMut { assignments }
    }

    pub fn set_lower_bound(
        &mut self,
        var: &impl IntegerVariable,
        bound: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        self.assignments.set_lower_bound(var.id(), bound)
    }

    pub fn set_upper_bound(
        &mut self,
        var: &impl IntegerVariable,
        bound: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        self.assignments.set_upper_bound(var.id(), bound)
    }

    pub fn remove(
        &mut self,
        var: &impl IntegerVariable,
        value: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        self.assignments.remove(var.id(), value)
    }

    pub fn assign(
        &mut self,
        var: &impl IntegerVariable,
        value: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        self.assignments.assign(var.id(), value)
    }
}

impl ReadDomains for PropagationContextMut<'_> {
    fn assignments(&self) -> &Assignments {
        self.assignments
    }
}
