//! A small finite-domain constraint propagation library built around the
//! global cardinality constraint.
//!
//! The crate provides the constraint's three classic propagators (value-,
//! bounds- and domain-consistent) on top of a minimal propagation engine: a
//! domain store with modification events, propagation contexts, and a
//! scheduling contract expressed through the [`Propagator`] trait.
//!
//! ```
//! use tally::propagators::global_cardinality::Cardinality;
//! use tally::propagators::global_cardinality::GlobalCardinalityDomainPropagator;
//! use tally::variables::DomainId;
//!
//! // exactly one occurrence of each of the values 1, 2 and 3
//! let cardinalities: Vec<Cardinality<DomainId>> = (1..=3)
//!     .map(|value| Cardinality::fixed(value, 1, 1))
//!     .collect();
//! let _propagator = GlobalCardinalityDomainPropagator::new(
//!     Box::new([DomainId::new(0), DomainId::new(1), DomainId::new(2)]),
//!     cardinalities,
//!     true,
//! );
//! ```

pub mod basic_types;
pub mod engine;
pub mod propagators;
pub mod variables;

pub use basic_types::Inconsistency;
pub use basic_types::Propagation;
pub use basic_types::PropagationStatusCP;
pub use engine::cp::propagation::Propagator;
