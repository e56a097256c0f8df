//! # Wasil Support
//!
//! Shared utilities for the Wasil crates.
//!
//! This crate provides:
//! - Text rendering for diagnostics (dependency chains, lifetime paths)
//! - Short type names and "did you mean?" suggestions
//! - Type-name matching used when parameters reference a type by name

pub mod rendering;
