//! # forge-core
//!
//! Core crate for Spine Forge. Contains the configuration schemas and the
//! unified error system shared by the converter and the command-line binary.
//!
//! This crate has **no** internal dependencies on other Spine Forge crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
