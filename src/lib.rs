//! # VOC Logger Library
//!
//! Capture line-delimited sensor telemetry from a serial device into CSV.
//!
//! The logger opens the port, runs a short preflight check to make sure the
//! board is printing readings it can parse, then records every valid line
//! until interrupted.

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod parser;
pub mod preflight;
pub mod serial;
pub mod shutdown;
pub mod sink;
