//! Storage independent domain of the sensor gateway.

mod aggregate;
pub mod error;
mod messaging;
pub mod query;
mod sensor;

pub use aggregate::*;
pub use messaging::*;
pub use sensor::*;

pub static CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
