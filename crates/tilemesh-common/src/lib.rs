#![warn(missing_docs)]

//! Common types for tilemesh.
//!
//! Everything that crosses the boundary between the matmul planner and a tensor runtime lives
//! here, so that both sides agree on the vocabulary without depending on each other.

#[macro_use]
extern crate derive_new;

mod dtype;
mod fidelity;
mod grid;
mod parse;
mod placement;
mod program;
mod shape;

pub use dtype::*;
pub use fidelity::*;
pub use grid::*;
pub use parse::*;
pub use placement::*;
pub use program::*;
pub use shape::*;
