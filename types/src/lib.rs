//! Shared type definitions for driftless
//!
//! This crate provides the vocabulary used across the driftless crates:
//!
//! - [`Dialect`] - SQL back end a schema targets
//! - [`ColumnType`] - declared column types parsed into a structured form
//!
//! # Features
//!
//! - `serde` - Enable serde serialization/deserialization

mod column_type;
mod dialect;

pub use column_type::{ColumnType, IntWidth, TypeParseError};
pub use dialect::{Dialect, DialectParseError};
