//! Common utilities and types shared across cloudstore modules.
//!
//! This module provides the error taxonomy every store adapter translates
//! provider failures into, and the provider-agnostic path type.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::StorePath;
