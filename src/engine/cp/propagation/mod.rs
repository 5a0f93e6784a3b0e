pub mod propagation_context;
mod propagator;
mod propagator_initialisation_context;

pub use propagation_context::PropagationContext;
pub use propagation_context::PropagationContextMut;
pub use propagator::CostClass;
pub use propagator::Propagator;
pub use propagator_initialisation_context::PropagatorInitialisationContext;
