//! Shared primitives and utilities for the Tethys chemical-structure index.
//!
//! `tethys-core` provides the foundation the other Tethys crates build on:
//!
//! - **Error types** — [`TethysError`] and [`Result`] for structured error handling
//! - **Traits** — [`ContentAddressable`], [`Annotated`], [`Summarizable`]
//! - **Hashing** — SHA-256 content addressing and FNV-1a feature hashing

pub mod error;
pub mod hash;
pub mod traits;

pub use error::{Result, TethysError};
pub use traits::*;
