//! Domain models.

mod billing;
mod catalog;
mod claims;
mod lab;
mod patient;
mod pharmacy;

pub use billing::*;
pub use catalog::*;
pub use claims::*;
pub use lab::*;
pub use patient::*;
pub use pharmacy::*;
