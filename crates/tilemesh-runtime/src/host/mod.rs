mod kernel;
mod server;
mod storage;

pub use server::*;
