//! Report rendering to disk formats.

pub mod generator;

pub use generator::*;
