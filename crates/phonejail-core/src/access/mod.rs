//! Access-control gate: the pure lock computation and its async driver.

mod controller;
mod gate;

pub use controller::AccessController;
pub use gate::{AccessGate, AccessSnapshot, GateState};
