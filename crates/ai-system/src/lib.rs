//! Integration layer that owns every GOAP entity of a simulation.
//!
//! [`AiSystem`] keeps the prototype table, creates and destroys per-entity state, drives the
//! executor at a fixed cadence through [`TickScheduler`], and exposes the queries and commands
//! authored code and debug tools use.

#![forbid(unsafe_code)]

pub mod config;
pub mod scheduler;
pub mod system;

pub use config::{load_definition_data, AiConfig};
pub use scheduler::TickScheduler;
pub use system::AiSystem;
