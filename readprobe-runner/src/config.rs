//! Configuration for the readprobe benchmark.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `READPROBE__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Command line flags of the `random-read` subcommand are applied on top of the loaded
//! configuration.
//!
//! # Environment Variables
//!
//! Environment variables use `READPROBE__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `READPROBE__BUCKET=benchmark` sets the bucket to read from
//! - `READPROBE__STORAGE__TYPE=s3compatible` sets the storage type
//! - `READPROBE__STORAGE__ENDPOINT=http://localhost:8333` sets the endpoint
//!
//! Values that look like numbers are accepted for string fields, so `READPROBE__BUCKET=2024`
//! selects the bucket named `2024`.
//!
//! # YAML Configuration File
//!
//! ```yaml
//! bucket: benchmark
//! prefix: objects/
//! iterations: 10000
//!
//! storage:
//!   type: s3compatible
//!   endpoint: http://localhost:8333
//!   request_timeout: 30s
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::level_filters::LevelFilter;

use crate::operation::DEFAULT_BUFFER_SIZE;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "READPROBE__";

/// Newtype around `String` for secret configuration values. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl std::ops::Deref for ConfigSecret {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl<'de> Deserialize<'de> for ConfigSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string::deserialize(deserializer).map(ConfigSecret)
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Object store to read from.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// Local filesystem store (type `"filesystem"`).
    ///
    /// Every subdirectory of `path` is a bucket, and keys are file paths relative to it.
    ///
    /// ```yaml
    /// storage:
    ///   type: filesystem
    ///   path: /data
    /// ```
    FileSystem {
        /// Root directory containing the buckets.
        path: PathBuf,
    },

    /// S3-compatible store (type `"s3compatible"`).
    ///
    /// Objects are addressed path-style. Requests are not signed; an optional bearer `token` is
    /// sent with each request.
    ///
    /// ```yaml
    /// storage:
    ///   type: s3compatible
    ///   endpoint: http://localhost:8333
    ///   request_timeout: 30s
    /// ```
    S3Compatible {
        /// Base URL of the service.
        endpoint: String,

        /// Timeout for each request, including the body transfer.
        #[serde(default, with = "humantime_serde")]
        request_timeout: Option<Duration>,

        /// Bearer token sent with each request.
        ///
        /// # Environment Variable
        ///
        /// `READPROBE__STORAGE__TOKEN`
        #[serde(default)]
        token: Option<SecretBox<ConfigSecret>>,
    },
}

/// Accepts scalars of any type as strings.
///
/// Environment values are parsed by type, so `READPROBE__BUCKET=2024` arrives as an integer.
mod lenient_string {
    use std::fmt;

    use serde::Deserializer;
    use serde::de::{Error, Visitor};

    struct LenientVisitor;

    impl Visitor<'_> for LenientVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_str<E: Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_owned())
        }

        fn visit_string<E: Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_bool<E: Error>(self, value: bool) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i128<E: Error>(self, value: i128) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u128<E: Error>(self, value: u128) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: Error>(self, value: f64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_char<E: Error>(self, value: char) -> Result<String, E> {
            Ok(value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(LenientVisitor)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Lenient(#[serde(deserialize_with = "self::deserialize")] String);

        let value: Option<Lenient> = serde::Deserialize::deserialize(deserializer)?;
        Ok(value.map(|Lenient(value)| value))
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty output when writing to a terminal, simplified output otherwise.
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Compact plain text output.
    Simplified,

    /// JSON lines.
    Json,
}

/// Logging configuration.
///
/// Logs are always written to stderr.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence if set.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `READPROBE__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `auto`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for a benchmark run.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The object store to read from.
    ///
    /// # Default
    ///
    /// Filesystem storage in the `data` directory.
    pub storage: Storage,

    /// Bucket containing the objects.
    ///
    /// # Environment Variable
    ///
    /// `READPROBE__BUCKET`
    #[serde(deserialize_with = "lenient_string::deserialize")]
    pub bucket: String,

    /// Only list keys starting with this prefix. Ignored when `key_file` is set.
    #[serde(default, deserialize_with = "lenient_string::deserialize_option")]
    pub prefix: Option<String>,

    /// Number of reads to perform.
    ///
    /// # Default
    ///
    /// `1000`
    pub iterations: u64,

    /// Local file with one object key per line, used instead of listing the bucket.
    pub key_file: Option<PathBuf>,

    /// Seed for key selection. A random seed is used if unset.
    pub seed: Option<u64>,

    /// Size of the buffer object bodies are drained into.
    ///
    /// # Default
    ///
    /// `4 KiB`
    pub buffer_size: ByteSize,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: Storage::FileSystem {
                path: PathBuf::from("data"),
            },
            bucket: "readprobe".to_owned(),
            prefix: None,
            iterations: 1000,
            key_file: None,
            seed: None,
            buffer_size: ByteSize::b(DEFAULT_BUFFER_SIZE as u64),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if environment variables
    /// contain invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
