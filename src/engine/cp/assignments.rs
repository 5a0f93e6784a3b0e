//! The store of integer domains behind all variables of a problem.
//!
//! A domain is a bound interval with a set of removed interior values. The
//! mutators keep the invariant that both bounds are always present in the
//! domain: removing a bound value slides the bound past any adjacent holes.

use std::collections::BTreeSet;

use crate::basic_types::EmptyDomain;
use crate::engine::cp::domain_events::IntDomainEvent;
use crate::engine::cp::domain_events::ModEvent;
use crate::variables::DomainId;

#[derive(Clone, Debug, Default)]
pub struct Assignments {
    domains: Vec<IntDomain>,
    events: Vec<(DomainId, IntDomainEvent)>,
}

#[derive(Clone, Debug)]
struct IntDomain {
    lower: i32,
    upper: i32,
    /// Removed values, always strictly between the bounds.
    holes: BTreeSet<i32>,
}

impl IntDomain {
    fn new(lower: i32, upper: i32) -> IntDomain {
        assert!(lower <= upper, "cannot create an empty domain");
        IntDomain {
            lower,
            upper,
            holes: BTreeSet::new(),
        }
    }

    fn contains(&self, value: i32) -> bool {
        value >= self.lower && value <= self.upper && !self.holes.contains(&value)
    }

    fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    fn size(&self) -> usize {
        (self.upper - self.lower + 1) as usize - self.holes.len()
    }

    fn pull_up_lower(&mut self) {
        self.holes = self.holes.split_off(&self.lower);
        while self.holes.remove(&self.lower) {
            self.lower += 1;
        }
    }

    fn pull_down_upper(&mut self) {
        let _ = self.holes.split_off(&(self.upper + 1));
        while self.holes.remove(&self.upper) {
            self.upper -= 1;
        }
    }

    fn bound_event(&self) -> ModEvent {
        if self.is_fixed() {
            ModEvent::Assigned
        } else {
            ModEvent::Bounds
        }
    }

    fn set_lower_bound(&mut self, value: i32) -> Result<ModEvent, EmptyDomain> {
        if value <= self.lower {
            return Ok(ModEvent::None);
        }
        if value > self.upper {
            return Err(EmptyDomain);
        }
        self.lower = value;
        self.pull_up_lower();
        Ok(self.bound_event())
    }

    fn set_upper_bound(&mut self, value: i32) -> Result<ModEvent, EmptyDomain> {
        if value >= self.upper {
            return Ok(ModEvent::None);
        }
        if value < self.lower {
            return Err(EmptyDomain);
        }
        self.upper = value;
        self.pull_down_upper();
        Ok(self.bound_event())
    }

    fn remove(&mut self, value: i32) -> Result<ModEvent, EmptyDomain> {
        if !self.contains(value) {
            return Ok(ModEvent::None);
        }
        if self.is_fixed() {
            return Err(EmptyDomain);
        }
        if value == self.lower {
            self.lower += 1;
            self.pull_up_lower();
            return Ok(self.bound_event());
        }
        if value == self.upper {
            self.upper -= 1;
            self.pull_down_upper();
            return Ok(self.bound_event());
        }
        let _ = self.holes.insert(value);
        Ok(ModEvent::Domain)
    }

    fn assign(&mut self, value: i32) -> Result<ModEvent, EmptyDomain> {
        if !self.contains(value) {
            return Err(EmptyDomain);
        }
        if self.is_fixed() {
            return Ok(ModEvent::None);
        }
        self.lower = value;
        self.upper = value;
        self.holes.clear();
        Ok(ModEvent::Assigned)
    }
}

impl Assignments {
    /// Creates a new domain over the inclusive interval `lower..=upper`.
    pub fn grow(&mut self, lower: i32, upper: i32) -> DomainId {
        let id = DomainId::new(self.domains.len() as u32);
        self.domains.push(IntDomain::new(lower, upper));
        id
    }

    /// Creates a new domain holding exactly the given values.
    pub fn grow_sparse(&mut self, values: &[i32]) -> DomainId {
        assert!(!values.is_empty(), "cannot create an empty domain");
        let lower = *values.iter().min().unwrap();
        let upper = *values.iter().max().unwrap();
        let id = self.grow(lower, upper);
        let domain = &mut self.domains[id.index()];
        for value in lower..=upper {
            if !values.contains(&value) {
                let _ = domain.holes.insert(value);
            }
        }
        id
    }

    pub fn lower_bound(&self, domain: DomainId) -> i32 {
        self.domains[domain.index()].lower
    }

    pub fn upper_bound(&self, domain: DomainId) -> i32 {
        self.domains[domain.index()].upper
    }

    pub fn size(&self, domain: DomainId) -> usize {
        self.domains[domain.index()].size()
    }

    pub fn is_fixed(&self, domain: DomainId) -> bool {
        self.domains[domain.index()].is_fixed()
    }

    pub fn contains(&self, domain: DomainId, value: i32) -> bool {
        self.domains[domain.index()].contains(value)
    }

    /// The values of the domain in ascending order.
    pub fn domain_iterator(&self, domain: DomainId) -> impl Iterator<Item = i32> + '_ {
        let domain = &self.domains[domain.index()];
        (domain.lower..=domain.upper).filter(move |value| !domain.holes.contains(value))
    }

    pub fn set_lower_bound(
        &mut self,
        domain: DomainId,
        value: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        let event = self.domains[domain.index()].set_lower_bound(value)?;
        self.record(domain, event, IntDomainEvent::LowerBound);
        Ok(event)
    }

    pub fn set_upper_bound(
        &mut self,
        domain: DomainId,
        value: i32,
    ) -> Result<ModEvent, EmptyDomain> {
        let event = self.domains[domain.index()].set_upper_bound(value)?;
        self.record(domain, event, IntDomainEvent::UpperBound);
        Ok(event)
    }

    pub fn remove(&mut self, domain: DomainId, value: i32) -> Result<ModEvent, EmptyDomain> {
        let lower = self.domains[domain.index()].lower;
        let upper = self.domains[domain.index()].upper;
        let event = self.domains[domain.index()].remove(value)?;
        if event.changed() {
            if self.domains[domain.index()].lower != lower {
                self.events.push((domain, IntDomainEvent::LowerBound));
            }
            if self.domains[domain.index()].upper != upper {
                self.events.push((domain, IntDomainEvent::UpperBound));
            }
            if event == ModEvent::Domain {
                self.events.push((domain, IntDomainEvent::Removal));
            }
            if event == ModEvent::Assigned {
                self.events.push((domain, IntDomainEvent::Assign));
            }
        }
        Ok(event)
    }

    pub fn assign(&mut self, domain: DomainId, value: i32) -> Result<ModEvent, EmptyDomain> {
        let event = self.domains[domain.index()].assign(value)?;
        self.record(domain, event, IntDomainEvent::LowerBound);
        if event.changed() {
            self.events.push((domain, IntDomainEvent::UpperBound));
        }
        Ok(event)
    }

    fn record(&mut self, domain: DomainId, event: ModEvent, kind: IntDomainEvent) {
        if !event.changed() {
            return;
        }
        self.events.push((domain, kind));
        if event == ModEvent::Assigned {
            self.events.push((domain, IntDomainEvent::Assign));
        }
    }

    /// Takes the events accumulated since the last drain.
    pub fn drain_events(&mut self) -> Vec<(DomainId, IntDomainEvent)> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_slide_past_holes() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(1, 5);

        assert_eq!(Ok(ModEvent::Domain), assignments.remove(x, 2));
        assert_eq!(Ok(ModEvent::Bounds), assignments.remove(x, 1));
        assert_eq!(3, assignments.lower_bound(x));
        assert_eq!(vec![3, 4, 5], assignments.domain_iterator(x).collect::<Vec<_>>());
    }

    #[test]
    fn removing_the_last_value_fails() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(4, 4);

        assert_eq!(Err(EmptyDomain), assignments.remove(x, 4));
    }

    #[test]
    fn tightening_to_a_singleton_reports_assignment() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 3);

        assert_eq!(Ok(ModEvent::Bounds), assignments.set_lower_bound(x, 2));
        assert_eq!(Ok(ModEvent::Assigned), assignments.set_upper_bound(x, 2));
        assert!(assignments.is_fixed(x));
    }

    #[test]
    fn sparse_domains_skip_missing_values() {
        let mut assignments = Assignments::default();
        let x = assignments.grow_sparse(&[1, 3, 6]);

        assert_eq!(3, assignments.size(x));
        assert!(!assignments.contains(x, 2));
        assert_eq!(Ok(ModEvent::Bounds), assignments.set_lower_bound(x, 2));
        assert_eq!(3, assignments.lower_bound(x));
    }

    #[test]
    fn events_reflect_the_kind_of_change() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(1, 4);
        let _ = assignments.drain_events();

        let _ = assignments.remove(x, 2).unwrap();
        let _ = assignments.set_upper_bound(x, 3).unwrap();
        let events = assignments.drain_events();
        assert_eq!(
            vec![(x, IntDomainEvent::Removal), (x, IntDomainEvent::UpperBound)],
            events
        );
    }
}
