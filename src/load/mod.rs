//! Load testing module

pub mod runner;

pub use runner::{LatencySummary, LoadRunner, LoadStats, LoadTarget};
