//! Domain change events: the per-mutation summary returned to the calling
//! propagator, and the event sets used for propagator scheduling.

use enumset::enum_set;
use enumset::EnumSet;
use enumset::EnumSetType;

/// Summary of what a domain mutator did, ordered as a lattice
/// `None < Bounds < Domain < Assigned`. Failure is not part of the lattice; it
/// is the error side of the mutator result and absorbs everything through `?`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModEvent {
    /// The mutation was a no-op on the current domain.
    None,
    /// A bound moved.
    Bounds,
    /// A value was removed from the interior of the domain.
    Domain,
    /// The domain became a singleton.
    Assigned,
}

impl ModEvent {
    /// The join of two events in the lattice.
    pub fn join(self, other: ModEvent) -> ModEvent {
        self.max(other)
    }

    /// Whether the mutation changed the domain at all.
    pub fn changed(self) -> bool {
        self != ModEvent::None
    }
}

/// A change recorded on an integer domain, consumed by the scheduler to decide
/// which subscribed propagators to wake up.
#[derive(Debug, EnumSetType)]
pub enum IntDomainEvent {
    /// The domain became a singleton.
    Assign,
    /// The lower bound moved up.
    LowerBound,
    /// The upper bound moved down.
    UpperBound,
    /// A value was removed from the interior of the domain.
    Removal,
}

/// The set of domain events a propagator subscribes to for one variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainEvents {
    events: EnumSet<IntDomainEvent>,
}

impl DomainEvents {
    /// Any change to the domain.
    pub const ANY_INT: DomainEvents = DomainEvents::create(enum_set!(
        IntDomainEvent::Assign
            | IntDomainEvent::LowerBound
            | IntDomainEvent::UpperBound
            | IntDomainEvent::Removal
    ));
    /// Bound changes, including assignment.
    pub const BOUNDS: DomainEvents = DomainEvents::create(enum_set!(
        IntDomainEvent::Assign | IntDomainEvent::LowerBound | IntDomainEvent::UpperBound
    ));
    /// Assignment only.
    pub const ASSIGN: DomainEvents = DomainEvents::create(enum_set!(IntDomainEvent::Assign));

    const fn create(events: EnumSet<IntDomainEvent>) -> DomainEvents {
        DomainEvents { events }
    }

    pub fn contains(&self, event: IntDomainEvent) -> bool {
        self.events.contains(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_picks_the_stronger_event() {
        assert_eq!(ModEvent::Bounds, ModEvent::None.join(ModEvent::Bounds));
        assert_eq!(ModEvent::Domain, ModEvent::Domain.join(ModEvent::Bounds));
        assert_eq!(ModEvent::Assigned, ModEvent::Domain.join(ModEvent::Assigned));
        assert!(!ModEvent::None.changed());
        assert!(ModEvent::Bounds.changed());
    }

    #[test]
    fn event_sets_contain_their_events() {
        assert!(DomainEvents::ANY_INT.contains(IntDomainEvent::Removal));
        assert!(DomainEvents::BOUNDS.contains(IntDomainEvent::Assign));
        assert!(!DomainEvents::BOUNDS.contains(IntDomainEvent::Removal));
        assert!(!DomainEvents::ASSIGN.contains(IntDomainEvent::LowerBound));
    }
}
