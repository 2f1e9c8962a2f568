//! CLI command implementations

pub mod genres;
pub mod import;
pub mod recompute;
pub mod search;
pub mod similar;
