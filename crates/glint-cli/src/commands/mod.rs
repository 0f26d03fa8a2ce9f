//! CLI command implementations.

pub mod child;
pub mod common;
pub mod effects;
pub mod run;
pub mod validate;
