//! Safe SQL: identifiers from validated descriptors only, values as parameters.

mod builder;
pub mod filter;
pub mod params;
pub use builder::*;
pub use filter::{build_filter_clause, compile, FilterExpression, Predicate};
pub use params::*;
