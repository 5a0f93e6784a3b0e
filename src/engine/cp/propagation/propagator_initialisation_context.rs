//! The context handed to a propagator when it is posted.

use crate::basic_types::EmptyDomain;
use crate::engine::cp::assignments::Assignments;
use crate::engine::cp::domain_events::DomainEvents;
use crate::engine::cp::domain_events::ModEvent;
use crate::variables::DomainId;
use crate::variables::IntegerVariable;

/// Gives a freshly posted propagator the means to subscribe to its variables
/// and to perform its root-level pruning.
#[derive(Debug)]
pub struct PropagatorInitialisationContext<'a> {
    assignments: &'a mut Assignments,
    registrations: Vec<(DomainId, DomainEvents)>,
}

impl<'a> PropagatorInitialisationContext<'a> {
    pub fn new(assignments: &'a mut Assignments) -> Self {
        PropagatorInitialisationContext {
            assignments,
            registrations: Vec::new(),
        }
    }

    /// Subscribes the propagator to the given events on `var`.
    pub fn register(&mut self, var: impl IntegerVariable, events: DomainEvents) {
        self.registrations.push((var.id(), events));
    }

    pub fn into_registrations(self) -> Vec<(DomainId, DomainEvents)> {
        self.registrations
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
}

impl super::propagation_context::ReadDomains for PropagatorInitialisationContext<'_> {
    fn assignments(&self) -> &Assignments {
        self.assignments
    }
}
