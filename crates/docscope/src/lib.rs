//! Public facade crate for `docscope`.
//!
//! This crate contains no IO or format-specific logic.
//! It re-exports the backend-agnostic types/traits from `docscope-core`.

pub use docscope_core::*;
