//! Shared result and error types of the propagation engine.

use thiserror::Error;

/// The result of a single [`Propagator::propagate`](crate::engine::cp::propagation::Propagator::propagate)
/// call: either a successful [`Propagation`] outcome or an [`Inconsistency`]
/// which the surrounding search interprets as a dead branch.
pub type PropagationStatusCP = Result<Propagation, Inconsistency>;

/// Outcome of a successful propagation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// Re-running the propagator without external changes cannot prune further.
    AtFixpoint,
    /// The propagator modified views it is itself subscribed to and should be
    /// scheduled again.
    NotAtFixpoint,
    /// The constraint holds in every extension of the current domains; the
    /// propagator can be removed.
    Subsumed,
}

/// Raised by a domain mutator that would leave a variable without any value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmptyDomain;

/// The ways in which propagation detects that the current domains admit no
/// solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Inconsistency {
    /// A variable has no values left after a mutation.
    #[error("a variable domain became empty")]
    EmptyDomain,
    /// More variables are forced into a value (or value interval) than its
    /// occurrence bounds allow.
    #[error("the capacity of value {value} is exceeded")]
    CapacityExceeded { value: i32 },
    /// Fewer variables can still take a value than its required minimum number
    /// of occurrences.
    #[error("too few variables can still take value {value}")]
    InsufficientSupply { value: i32 },
    /// The occurrence bounds of a value are inconsistent with each other or
    /// with the number of constrained variables.
    #[error("the occurrence bounds for value {value} are inconsistent")]
    InconsistentCardinality { value: i32 },
}

impl From<EmptyDomain> for Inconsistency {
    fn from(_: EmptyDomain) -> Self {
        Inconsistency::EmptyDomain
    }
}
