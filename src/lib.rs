//! Campus Market client core.
//!
//! Session upkeep for JWT-authenticated access, retrying reads against the
//! marketplace backend, and filter-aware listing pagination.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
