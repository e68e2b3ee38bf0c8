//! Reporting of non-fatal conditions and progress during a run.
//!
//! Per-read conditions are reported through a [`Telemetry`] handle injected into the
//! [`ReadOperation`](crate::operation::ReadOperation). [`TracingTelemetry`] is the default.

use std::fmt::Debug;

use readprobe_store::StoreError;

use crate::key_space::ObjectKey;

/// Receives warnings and progress notifications from a run.
pub trait Telemetry: Debug + Send + Sync {
    /// The declared size of an object differs from the number of bytes read.
    fn integrity_mismatch(&self, key: &ObjectKey, declared: u64, actual: u64);

    /// A read failed and no sample was recorded for it.
    fn read_failed(&self, key: &ObjectKey, error: &StoreError);

    /// `current` of `total` iterations have been started.
    fn progress(&self, current: u64, total: u64);
}

/// Forwards all reports to [`tracing`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn integrity_mismatch(&self, key: &ObjectKey, declared: u64, actual: u64) {
        tracing::warn!(
            %key,
            declared,
            actual,
            "Declared/read size mismatch"
        );
    }

    fn read_failed(&self, key: &ObjectKey, error: &StoreError) {
        tracing::warn!(
            %key,
            error = error as &dyn std::error::Error,
            "Failed to read object"
        );
    }

    fn progress(&self, current: u64, total: u64) {
        tracing::info!("Progress: {current} of {total}");
    }
}
