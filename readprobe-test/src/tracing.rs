//! Log capture for tests.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Crates whose events are captured at `TRACE` unless `RUST_LOG` says otherwise.
const CAPTURED_CRATES: [&str; 2] = ["readprobe_runner", "readprobe_store"];

/// Installs a subscriber writing to the output captured by the test runner.
///
/// Without `RUST_LOG`, the readprobe crates log at `TRACE` and everything else at `ERROR`.
/// Calling this more than once is a no-op.
///
/// # Example
///
/// ```
/// readprobe_test::tracing::init();
/// readprobe_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        CAPTURED_CRATES
            .iter()
            .filter_map(|name| format!("{name}=TRACE").parse::<Directive>().ok())
            .fold(EnvFilter::new("ERROR"), EnvFilter::add_directive)
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .without_time()
        .compact()
        .try_init()
        .ok();
}
