//! Core types and error definitions shared by the strut crates.
//!
//! This crate provides:
//! - The error taxonomy for solving and layout
//! - Widget identifiers and axis/edge vocabulary

pub mod errors;
pub mod types;

pub use errors::*;
pub use types::*;
