//! Editor State Module
//!
//! The single canonical state aggregate and the phase machine that guards
//! every transition over it.

mod machine;
mod model;

pub use machine::*;
pub use model::*;
