//! Propagator implementations.

pub mod global_cardinality;
