//! Driver implementations.
//!
//! - [`simulation`] - Software simulation drivers for development and testing

pub mod simulation;
