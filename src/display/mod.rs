//! Human-readable renderings of formulas and dependency trees.
pub mod describe;
pub mod trace;
