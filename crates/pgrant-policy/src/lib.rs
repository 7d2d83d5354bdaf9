//! pgrant access classification
//!
//! Turns an arbitrary collection of Postgres privilege tokens into the single
//! best-matching coarse access level for an object kind.

pub mod resolver;

pub use resolver::GrantResolver;
