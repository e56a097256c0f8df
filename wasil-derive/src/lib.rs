//! Derive macros for Wasil.
//!
//! Re-exported by the `wasil` crate; depend on that instead.

pub use wasil_macros::Injectable;
