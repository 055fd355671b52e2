//! Flash partition layouts
//!
//! This module holds the logical layout model and everything that
//! produces or consumes it:
//!
//! - [`catalog`] - the fixed system partition set
//! - [`plan`] - the allocation planner for application slots
//! - [`table`] - the binary on-device table format (serialize/import)
//!
//! Data flows catalog -> planner -> [`Layout::validate`] ->
//! serializer, and back through the importer for incremental re-plans.

pub mod catalog;
pub mod plan;
pub mod table;
mod types;

pub use types::*;
