use clap::Args;
use reconciler::{Environment, UnknownEnvironment};
use remote_settings::CollectionConfig;
use remote_settings::client::{DEFAULT_BUCKET, DEFAULT_COLLECTION};
use serde::Deserialize;
use signatures::ArchiveConfig;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_ARCHIVE_URL: &str = "https://crash-pings.mozilla.com/crash-ids.tar.gz";
const DEFAULT_PROCESSES: &[&str] = &["gpu", "gmplugin", "rdd", "socket", "utility"];
const DEFAULT_CHANNELS: &[&str] = &["nightly"];

/// Settings read from the environment or the command line.
///
/// Values are kept as raw strings so that every problem is reported by
/// [`Config::load`] rather than by argument parsing.
#[derive(Args, Clone, Debug, Default)]
pub struct Settings {
    /// Credential for the collection server, `Bearer <token>` or `user:password`
    #[arg(long, env = "AUTHORIZATION", hide_env_values = true, global = true)]
    pub authorization: Option<String>,

    /// Base URL of the collection server, e.g. https://remote-settings.example.com/v1
    #[arg(long, env = "SERVER", global = true)]
    pub server: Option<String>,

    /// One of dev, stage, prod. Only dev approves its own changes.
    #[arg(long, env = "ENVIRONMENT", global = true)]
    pub environment: Option<String>,

    /// Set to 1 to log mutations instead of sending them
    #[arg(long, env = "DRY_RUN", global = true)]
    pub dry_run: Option<String>,

    /// Set to 1 to sync even if upstream data looks unchanged
    #[arg(long, env = "FORCE_UPDATE", global = true)]
    pub force_update: Option<String>,

    /// Optional YAML file with collection, source, metrics and logging settings
    #[arg(long, env = "CONFIG_FILE", global = true)]
    pub config_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectionSection {
    pub bucket: String,
    pub name: String,
}

impl Default for CollectionSection {
    fn default() -> Self {
        CollectionSection {
            bucket: DEFAULT_BUCKET.to_string(),
            name: DEFAULT_COLLECTION.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveSection {
    pub url: String,
    pub processes: Vec<String>,
    pub channels: Vec<String>,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        ArchiveSection {
            url: DEFAULT_ARCHIVE_URL.to_string(),
            processes: DEFAULT_PROCESSES.iter().map(|p| p.to_string()).collect(),
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Where the target state comes from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Archive(ArchiveSection),
    Rows { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Archive(ArchiveSection::default())
    }
}

impl SourceConfig {
    fn resolve(self) -> Result<Source, ValidationError> {
        match self {
            SourceConfig::Archive(archive) => {
                let url = Url::parse(&archive.url).map_err(|e| ValidationError::InvalidArchiveUrl {
                    url: archive.url.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Source::Archive(ArchiveConfig {
                    url,
                    processes: archive.processes,
                    channels: archive.channels,
                }))
            }
            SourceConfig::Rows { path } => Ok(Source::Rows(path)),
        }
    }
}

/// Validated target state source.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Archive(ArchiveConfig),
    Rows(PathBuf),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApplyConfig {
    /// Upper bound on overlapping mutation requests within a phase.
    pub max_in_flight: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        ApplyConfig { max_in_flight: 1 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

/// Contents of the optional YAML file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub collection: CollectionSection,
    pub source: SourceConfig,
    pub apply: ApplyConfig,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.collection.bucket.is_empty() || self.collection.name.is_empty() {
            return Err(ValidationError::EmptyCollection);
        }

        if self.apply.max_in_flight == 0 {
            return Err(ValidationError::ZeroMaxInFlight);
        }

        match &self.source {
            SourceConfig::Archive(archive) => {
                if archive.processes.is_empty() {
                    return Err(ValidationError::EmptyProcesses);
                }
                if archive.channels.is_empty() {
                    return Err(ValidationError::EmptyChannels);
                }
            }
            SourceConfig::Rows { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::EmptyRowsPath);
                }
            }
        }

        Ok(())
    }
}

/// Fully resolved configuration for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub collection: CollectionConfig,
    pub source: Source,
    pub environment: Option<Environment>,
    pub force_update: bool,
    pub max_in_flight: usize,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn load(settings: &Settings) -> Result<Self, ConfigError> {
        let file = match &settings.config_file {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        file.validate()?;
        let source = file.source.resolve()?;

        let authorization = settings
            .authorization
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(ValidationError::MissingCredential)?;

        let server = settings
            .server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingServer)?;
        let server = parse_server(server)?;

        let environment = settings
            .environment
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(str::parse::<Environment>)
            .transpose()
            .map_err(ValidationError::from)?;

        let mut collection = CollectionConfig::new(server, authorization);
        collection.bucket = file.collection.bucket;
        collection.collection = file.collection.name;
        collection.dry_run = is_enabled(settings.dry_run.as_deref());

        Ok(Config {
            collection,
            source,
            environment,
            force_update: is_enabled(settings.force_update.as_deref()),
            max_in_flight: file.apply.max_in_flight,
            metrics: file.metrics,
            logging: file.logging,
        })
    }
}

fn parse_server(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidServer {
        server: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidServer {
            server: raw.to_string(),
            reason: "expected an http(s) base URL".to_string(),
        });
    }

    Ok(url)
}

/// Flags follow the `NAME=1` convention; any other value leaves them off.
fn is_enabled(value: Option<&str>) -> bool {
    value.map(str::trim) == Some("1")
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("AUTHORIZATION is not set")]
    MissingCredential,

    #[error("SERVER is not set")]
    MissingServer,

    #[error("SERVER {server:?} is not a valid URL: {reason}")]
    InvalidServer { server: String, reason: String },

    #[error(transparent)]
    UnknownEnvironment(#[from] UnknownEnvironment),

    #[error("Collection bucket and name cannot be empty")]
    EmptyCollection,

    #[error("apply.max_in_flight cannot be 0")]
    ZeroMaxInFlight,

    #[error("Archive URL {url:?} is not valid: {reason}")]
    InvalidArchiveUrl { url: String, reason: String },

    #[error("Archive source needs at least one process type")]
    EmptyProcesses,

    #[error("Archive source needs at least one channel")]
    EmptyChannels,

    #[error("Rows source path cannot be empty")]
    EmptyRowsPath,
}
