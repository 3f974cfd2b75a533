//! Spendboard: terminal client for an advertising spend analytics backend.
//!
//! Loads filter options, turns the user's filter selection into statistics
//! queries and renders the aggregated results as metric cards and charts.

pub mod api;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod filter;
pub mod pipeline;
pub mod render;
pub mod session;
