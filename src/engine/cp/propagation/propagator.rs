use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationStatusCP;
use crate::engine::cp::propagation::PropagationContext;
use crate::engine::cp::propagation::PropagationContextMut;
use crate::engine::cp::propagation::PropagatorInitialisationContext;

/// Worst-case running-time class reported by a propagator for its next
/// invocation. The scheduler runs cheaper propagators first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CostClass {
    LinearLo,
    LinearHi,
    QuadraticLo,
    QuadraticHi,
    CubicLo,
    CubicHi,
}

/// A propagator narrows the domains of the variables it watches so that every
/// remaining assignment can still satisfy its constraint.
///
/// The lifecycle is: `initialise_at_root` is called once when the propagator is
/// posted (argument checks, initial pruning, event subscriptions); `propagate`
/// is called whenever a subscribed event fired, and runs to its own fixpoint on
/// the current domains before returning.
pub trait Propagator {
    fn name(&self) -> &str;

    /// Checks the posting contract, performs root-level pruning and registers
    /// the propagator's event subscriptions.
    fn initialise_at_root(
        &mut self,
        context: &mut PropagatorInitialisationContext<'_>,
    ) -> Result<(), Inconsistency>;

    fn propagate(&mut self, context: PropagationContextMut<'_>) -> PropagationStatusCP;

    /// The cost class of running this propagator on the current domains.
    fn cost(&self, context: PropagationContext<'_>) -> CostClass;
}
