mod error;
mod plan;
mod problem;
mod strategy;
mod subblock;

pub use error::*;
pub use plan::*;
pub use problem::*;
pub use strategy::*;
pub use subblock::*;
