//! Command line interface of the `readprobe` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use readprobe_store::{LocalFs, S3Compatible, SharedStore};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{Config, Storage};
use crate::observability;
use crate::operation::ReadOperation;
use crate::stats::StatsAccumulator;

/// Latency benchmark for object store reads.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    RandomRead(RandomReadCommand),
    Version(VersionCommand),
}

/// read uniformly random objects and report their latency
#[derive(Debug, Default, FromArgs)]
#[argh(subcommand, name = "random-read")]
struct RandomReadCommand {
    /// number of reads to perform
    #[argh(option, short = 'n')]
    iterations: Option<u64>,

    /// file with one object key per line, used instead of listing the bucket
    #[argh(option)]
    key_file: Option<PathBuf>,

    /// seed for key selection, for reproducible runs
    #[argh(option)]
    seed: Option<u64>,
}

impl RandomReadCommand {
    /// Applies command line overrides on top of the loaded configuration.
    fn apply(self, config: &mut Config) {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(key_file) = self.key_file {
            config.key_file = Some(key_file);
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
    }
}

/// print the readprobe version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let command = match args.command {
        Command::Version(_) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::RandomRead(command) => command,
    };

    let mut config = Config::load(args.config.as_deref())?;
    command.apply(&mut config);

    // Reads are issued one at a time, a single thread is all the loop needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .thread_name("main-rt")
        .enable_all()
        .build()?;

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(random_read(config))
}

/// Creates the store client described by the configuration.
pub fn create_store(storage: &Storage) -> Result<SharedStore> {
    let store: SharedStore = match storage {
        Storage::FileSystem { path } => Arc::new(LocalFs::new(path)),
        Storage::S3Compatible {
            endpoint,
            request_timeout,
            token,
        } => {
            let mut store = S3Compatible::new(endpoint, *request_timeout)
                .context("failed to create S3-compatible client")?;
            if let Some(token) = token {
                let token = SecretString::from(token.expose_secret().as_str().to_owned());
                store = store.with_token(token);
            }
            Arc::new(store)
        }
    };

    Ok(store)
}

async fn random_read(config: Config) -> Result<()> {
    let store = create_store(&config.storage)?;
    let buffer_size =
        usize::try_from(config.buffer_size.as_u64()).context("buffer size out of range")?;

    let mut operation = ReadOperation::new(
        store,
        config.bucket,
        config.prefix,
        config.iterations,
        config.key_file,
    )
    .buffer_size(buffer_size);
    if let Some(seed) = config.seed {
        operation = operation.seed(seed);
    }

    let result = operation.run().await.context("random read failed")?;
    log_summary(result.stats(), config.iterations);

    Ok(())
}

fn log_summary(stats: &StatsAccumulator, iterations: u64) {
    let (Some(mean), Some(p50), Some(p90), Some(p99), Some(max)) = (
        stats.mean(),
        stats.percentile(0.5),
        stats.percentile(0.9),
        stats.percentile(0.99),
        stats.max(),
    ) else {
        tracing::warn!(iterations, "No read completed successfully");
        return;
    };

    tracing::info!(
        count = stats.count(),
        iterations,
        "Read latency avg: {mean:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}; max: {max:.2?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_random_read_overrides() {
        let args = Args::from_args(
            &["readprobe"],
            &[
                "-c",
                "config.yml",
                "random-read",
                "-n",
                "250",
                "--key-file",
                "keys.txt",
                "--seed",
                "9",
            ],
        )
        .unwrap();

        assert_eq!(args.config.as_deref(), Some(std::path::Path::new("config.yml")));
        let Command::RandomRead(command) = args.command else {
            panic!("expected random-read");
        };

        let mut config = Config::default();
        command.apply(&mut config);
        assert_eq!(config.iterations, 250);
        assert_eq!(config.key_file, Some(PathBuf::from("keys.txt")));
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn missing_overrides_keep_config() {
        let mut config = Config::default();
        RandomReadCommand::default().apply(&mut config);

        assert_eq!(config.iterations, 1000);
        assert_eq!(config.key_file, None);
    }

    #[test]
    fn creates_configured_stores() {
        let store = create_store(&Storage::FileSystem {
            path: PathBuf::from("data"),
        })
        .unwrap();
        assert_eq!(store.name(), "local-fs");

        let store = create_store(&Storage::S3Compatible {
            endpoint: "http://localhost:8333".into(),
            request_timeout: None,
            token: None,
        })
        .unwrap();
        assert_eq!(store.name(), "s3-compatible");

        let result = create_store(&Storage::S3Compatible {
            endpoint: "not a url".into(),
            request_timeout: None,
            token: None,
        });
        assert!(result.is_err());
    }
}
