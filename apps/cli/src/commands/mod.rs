//! Command implementations for the Titanic CLI.

pub mod models;
pub mod pipeline;
pub mod predict;
pub mod steps;
pub mod types;

pub use types::{ModelsCommand, StepCommand, TrainArgs};
