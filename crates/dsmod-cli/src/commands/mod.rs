//! CLI command implementations.

pub mod check;
pub mod config;
pub mod profiles;
pub mod signatures;
