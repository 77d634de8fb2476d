//! Domain models for the prescribing workflow.

mod doctor;
mod formulary;
mod interaction;
mod patient;
mod prescription;

pub use doctor::*;
pub use formulary::*;
pub use interaction::*;
pub use patient::*;
pub use prescription::*;
