//! Shared types for the LC-3.2 simulator.
//!
//! Bit utilities, the simulator-wide error type, the `Observable`
//! introspection trait, and a small hand-rolled leveled logger. Everything
//! else in the workspace depends on this crate and nothing else.

pub mod bits;
pub mod error;
pub mod log;
pub mod observable;
pub mod rng;

pub use error::{SimError, SimResult};
pub use log::{LogLevel, Logger};
pub use observable::{Observable, Value};
pub use rng::Lcg;
