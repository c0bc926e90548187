use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use config::{Config, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

/// Prefix of the environment variables that override configuration keys,
/// e.g. `DEMO__PRODUCER__INTERVAL_MS=50`.
pub const ENV_PREFIX: &str = "DEMO";

pub const DEFAULT_TOPIC: &str = "demo-events";
pub const DEFAULT_GROUP_ID: &str = "cli";

/// Upper bound of `producer.timestamp_jitter_secs`, 100 years.
pub const MAX_TIMESTAMP_JITTER_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(thiserror::Error, Debug)]
pub enum DemoConfigError {
    #[error("failed to load config")]
    InvalidConfigError(#[from] config::ConfigError),
    #[error("could not find config file {0}")]
    ConfigFileNotFound(PathBuf),
    #[error("failed to read config file")]
    ReadError(#[from] std::io::Error),
    #[error("unsupported config file format for {0}")]
    UnsupportedFormat(PathBuf),
    #[error("environment variable expansion error")]
    EnvExpansionError(#[from] ExpandError),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ExpandError {
    #[error("Missing environment variable '{var_name}' for placeholder '{placeholder}'")]
    MissingVariable {
        var_name: String,
        placeholder: String,
    },
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::-(.*?))?\}").expect("placeholder pattern is valid")
});

/// Loads environment variables from a .env file if it exists.
/// This function should be called early in the application startup,
/// before any configuration loading.
///
/// Looks for `.env` in the current directory, then in the parent directory.
/// A missing file is not an error, the variables may be set by the system.
pub fn load_dotenv() {
    for path in [".env", "../.env"] {
        if Path::new(path).exists() {
            match dotenvy::from_path(path) {
                Ok(_) => info!("Loaded environment variables from {} file", path),
                Err(e) => warn!("Found {} file but failed to load it: {}", path, e),
            }
            return;
        }
    }
    debug!("No .env file found, using system environment variables only");
}

/// Expands environment variable placeholders in a string.
/// Supports both ${VAR_NAME} and ${VAR_NAME:-default_value} syntax.
///
/// Examples:
/// - "${KAFKA_CA_LOCATION}" -> reads from KAFKA_CA_LOCATION env var
/// - "${DEMO_INTERVAL:-10}" -> reads from DEMO_INTERVAL, falls back to "10"
pub fn expand_env_vars(input: &str) -> Result<String, ExpandError> {
    let mut result = input.to_string();
    let mut replacements: HashMap<String, String> = HashMap::new();

    for capture in PLACEHOLDER.captures_iter(input) {
        let full_match = &capture[0];
        if replacements.contains_key(full_match) {
            continue;
        }
        let var_name = &capture[1];
        let default_value = capture.get(2).map(|m| m.as_str());

        let env_value = match env::var(var_name) {
            Ok(value) => {
                debug!("Expanded environment variable: {} = [REDACTED]", var_name);
                value
            }
            Err(_) => match default_value {
                Some(default) => {
                    warn!(
                        "Environment variable {} not found, using default value",
                        var_name
                    );
                    default.to_string()
                }
                None => {
                    return Err(ExpandError::MissingVariable {
                        var_name: var_name.to_string(),
                        placeholder: full_match.to_string(),
                    });
                }
            },
        };

        result = result.replace(full_match, &env_value);
        replacements.insert(full_match.to_string(), env_value);
    }

    Ok(result)
}

fn file_format(path: &Path) -> Result<FileFormat, DemoConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
        Some("toml") => Ok(FileFormat::Toml),
        Some("json") => Ok(FileFormat::Json),
        _ => Err(DemoConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Security protocol used for every broker connection.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum SecurityProtocol {
    #[default]
    #[serde(rename = "SASL_SSL", alias = "sasl_ssl")]
    SaslSsl,
    #[serde(rename = "SASL_PLAINTEXT", alias = "sasl_plaintext")]
    SaslPlaintext,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::SaslSsl => "SASL_SSL",
            SecurityProtocol::SaslPlaintext => "SASL_PLAINTEXT",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub security_protocol: SecurityProtocol,
    pub sasl_mechanism: String,
    /// CA bundle used to verify the broker certificate. The system store is
    /// used when unset.
    pub ssl_ca_location: Option<String>,
    /// Timeout for establishing a broker connection.
    pub dial_timeout_secs: u64,
    /// Timeout for admin operations, delivery reports and the final flush.
    pub operation_timeout_secs: u64,
    /// librdkafka debug contexts, e.g. "broker,topic,msg".
    pub debug: Option<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            security_protocol: SecurityProtocol::default(),
            sasl_mechanism: "SCRAM-SHA-512".to_string(),
            ssl_ca_location: None,
            dial_timeout_secs: 10,
            operation_timeout_secs: 30,
            debug: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub name: String,
    /// Partition count on creation, -1 defers to the broker default.
    pub partitions: i32,
    /// Replication factor on creation, -1 defers to the broker default.
    pub replication_factor: i32,
    pub retention_ms: i64,
    pub retention_bytes: i64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOPIC.to_string(),
            partitions: -1,
            replication_factor: -1,
            retention_ms: 6 * 60 * 60 * 1000,
            retention_bytes: 5 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Pause between two writes.
    pub interval_ms: u64,
    /// Exclusive upper bound of the number of records in a batch.
    pub max_records_per_batch: usize,
    /// Record timestamps are shifted back by up to this many seconds.
    pub timestamp_jitter_secs: i64,
    /// Number of messages to write, 0 runs forever.
    pub message_count: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            max_records_per_batch: 100,
            timestamp_jitter_secs: 3600,
            message_count: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub group_id: String,
    /// How long a single poll of the client blocks before polling again.
    pub poll_timeout_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: DEFAULT_GROUP_ID.to_string(),
            poll_timeout_ms: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kafka: KafkaConfig,
    pub topic: TopicConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
}

impl AppConfig {
    /// Load the configuration from an optional file, overlaid with
    /// `DEMO__*` environment variables. Keys missing from both fall back to
    /// built-in defaults.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, DemoConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(load_config(path)?);
        }
        let config: AppConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DemoConfigError> {
        if self.producer.max_records_per_batch == 0 {
            return Err(DemoConfigError::InvalidValue {
                key: "producer.max_records_per_batch",
                reason: "must be greater than 0".to_string(),
            });
        }
        if !(0..=MAX_TIMESTAMP_JITTER_SECS).contains(&self.producer.timestamp_jitter_secs) {
            return Err(DemoConfigError::InvalidValue {
                key: "producer.timestamp_jitter_secs",
                reason: format!("must be between 0 and {}", MAX_TIMESTAMP_JITTER_SECS),
            });
        }
        if self.topic.name.is_empty() {
            return Err(DemoConfigError::InvalidValue {
                key: "topic.name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Read a config file, expanding environment variable placeholders before
/// parsing.
#[instrument(err)]
pub fn load_config(path: &Path) -> Result<Config, DemoConfigError> {
    if !path.exists() {
        return Err(DemoConfigError::ConfigFileNotFound(path.to_path_buf()));
    }
    let format = file_format(path)?;
    let file_content = std::fs::read_to_string(path)?;
    let expanded_content = expand_env_vars(&file_content)?;

    let conf = Config::builder()
        .add_source(File::from_str(&expanded_content, format))
        .build()?;
    Ok(conf)
}
