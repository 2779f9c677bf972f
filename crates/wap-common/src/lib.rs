//! Shared utilities for WAP crates.
//!
//! This crate provides the helpers every pipeline stage leans on:
//! Polars `AnyValue` conversions for row-wise relation access, and the
//! content-hash [`DeterministicKey`] used for primary and surrogate keys.

pub mod key;
pub mod polars;

pub use key::DeterministicKey;
pub use polars::{
    any_to_f64, any_to_i64, any_to_string, any_to_text, column_texts, format_numeric, parse_f64,
    parse_i64,
};
