//! Aggregation views over the session context.

pub mod views;

pub use views::*;
