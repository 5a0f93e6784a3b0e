pub mod assignments;
pub mod domain_events;
pub mod propagation;

pub use assignments::Assignments;
