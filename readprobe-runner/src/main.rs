//! Latency benchmark for object store reads.
//!
//! Reads uniformly random objects from a bucket, one at a time, and reports the latency
//! distribution of all completed reads. See [`readprobe_runner::config`] for configuration.

fn main() -> anyhow::Result<()> {
    readprobe_runner::cli::execute()
}
