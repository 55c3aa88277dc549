mod case;
mod runner;

pub use case::*;
pub use runner::*;
