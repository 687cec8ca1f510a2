//! Signal module
//!
//! Model outputs consumed by the risk engine

mod types;

pub use types::{Signal, SignalInput};
