//! Measurement core of the readprobe object store benchmark.
//!
//! A [`ReadOperation`] draws keys uniformly at random from a [`KeySpace`], reads each object to
//! the end and records how long every read took. Keys are loaded once up front by a
//! [`KeySpaceProvider`], either by listing the store or from a local key file. The recorded
//! samples are returned in an [`OperationResult`].
//!
//! Conditions that do not abort a run, such as failed reads or objects whose size does not match
//! their declared size, are reported through an injected [`Telemetry`] handle.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod key_space;
pub mod observability;
pub mod operation;
pub mod provider;
pub mod result;
pub mod stats;
pub mod telemetry;

pub use key_space::{EmptyKeySpace, KeySpace, ObjectKey};
pub use operation::{ReadOperation, RunError};
pub use provider::{FileProvider, KeySpaceProvider, ListingProvider, ProviderError};
pub use result::OperationResult;
pub use stats::StatsAccumulator;
pub use telemetry::{Telemetry, TracingTelemetry};
