//! why-is-this-slow - measure what a command really costs and explain it
//!
//! This library runs an external command one or more times, records wall
//! time, CPU time and peak memory from the operating system, aggregates
//! repeated runs into medians and percentiles, and classifies the workload
//! with an ordered table of explainable rules.

pub mod analysis;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod executor;
pub mod json_output;
pub mod model;
pub mod platform;
pub mod rusage;
pub mod stats;
pub mod store;
pub mod tail;
pub mod text_output;
