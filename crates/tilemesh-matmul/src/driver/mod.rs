mod base;
mod context;
mod error;
mod trace;

pub use base::*;
pub use context::*;
pub use error::*;
pub use trace::*;
