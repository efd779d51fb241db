//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate analysis to `services/*`.
//! - Keep behavior and output schema stable.

pub mod inspect;

pub use inspect::handle_commands;
