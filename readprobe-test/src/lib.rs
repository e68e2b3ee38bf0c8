//! Test utilities for readprobe.
//!
//! This crate provides utilities to facilitate testing the read benchmark without a real object
//! store. See the modules for all available utilities.

pub mod store;
pub mod tracing;
