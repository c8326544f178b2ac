//! Heuristics module for tour planning.
//!
//! This module exports all construction, improvement and population-based
//! heuristics.

pub mod construction;
pub mod local_search;
pub mod genetic;
pub mod aco;
pub mod ant_lion;

pub use construction::*;
pub use local_search::*;
pub use genetic::*;
pub use aco::*;
pub use ant_lion::*;
