//! Service layer containing the analysis logic and its I/O helpers.
//!
//! ## Service map
//! - `analyzer.rs` — depth-bounded leaf descriptor walk.
//! - `loader.rs` — safetensors / JSON checkpoint loading and fingerprinting.
//! - `report.rs` — per-key breakdown, size accounting, cross-file comparison.
//! - `settings.rs` — TOML config file + CLI overrides.
//! - `format.rs` — human-readable sizes and previews.
//! - `output.rs` — JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - File access lives in `loader.rs` and `settings.rs` only.
//! - Keep command handlers thin; delegate to services.

pub mod analyzer;
pub mod format;
pub mod loader;
pub mod output;
pub mod report;
pub mod settings;
