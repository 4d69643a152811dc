//! Supplier matching

mod matcher;

pub use matcher::{MatchOutcome, resolve_interested_suppliers};
