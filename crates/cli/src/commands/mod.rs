//! CLI command implementations

pub mod data;
pub mod models;
