//! Shared data model layer.
//!
//! ## Files
//! - `node.rs` — the in-memory checkpoint tree (mapping/tensor/leaf).
//! - `models.rs` — descriptor and report structs.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem side effects.
//!
//! ## Compatibility note
//! Changes in `models.rs` affect `--json` outputs.
//! Keep them synchronized with `docs/contracts/*`.

pub mod models;
pub mod node;
