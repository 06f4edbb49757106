//! Core framework components
//!
//! - Structured error types shared by every pipeline stage

pub mod error;

pub use error::{AudioOperation, Result, VcError};
