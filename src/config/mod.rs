//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{fmt, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use texd_api_types::{ErrorFormat, TexEngine};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{AttachSpec, CliArgs, Command, Overrides, RenderArgs};

use crate::cache::DEFAULT_CHECKSUM_CACHE_CAPACITY;

const LOCAL_CONFIG_BASENAME: &str = "texd";
const ENV_PREFIX: &str = "TEXD";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:2201/";
const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 180;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ERROR_FORMAT: ErrorFormat = ErrorFormat::Full;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub endpoint: Url,
    /// `None` disables the corresponding timeout.
    pub open_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub errors: ErrorFormat,
    pub engine: Option<TexEngine>,
    pub image: Option<String>,
}

impl ClientSettings {
    /// Default timeouts and report format against `endpoint`.
    pub fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            open_timeout: Some(Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS)),
            read_timeout: Some(Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS)),
            write_timeout: Some(Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS)),
            errors: DEFAULT_ERROR_FORMAT,
            engine: None,
            image: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Attachment search paths, in priority order.
    pub lookup_paths: Vec<PathBuf>,
    pub checksum_cache_capacity: NonZeroUsize,
    pub error_handler: ErrorPolicy,
}

/// What to do with a compilation error once the reference retry is settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    #[default]
    Raise,
    Stderr,
    Ignore,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raise => "raise",
            Self::Stderr => "stderr",
            Self::Ignore => "ignore",
        })
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "raise" => Ok(Self::Raise),
            "stderr" => Ok(Self::Stderr),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown error handler `{other}`, expected one of: raise, stderr, ignore"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("lookup_paths"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

/// Flat on purpose: every key maps to exactly one `TEXD_*` variable.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    endpoint: Option<String>,
    open_timeout: Option<u64>,
    read_timeout: Option<u64>,
    write_timeout: Option<u64>,
    errors: Option<String>,
    engine: Option<String>,
    image: Option<String>,
    lookup_paths: Option<Vec<PathBuf>>,
    checksum_cache_capacity: Option<usize>,
    error_handler: Option<String>,
    log_level: Option<String>,
    log_json: Option<bool>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(endpoint) = overrides.endpoint.as_ref() {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(seconds) = overrides.open_timeout {
            self.open_timeout = Some(seconds);
        }
        if let Some(seconds) = overrides.read_timeout {
            self.read_timeout = Some(seconds);
        }
        if let Some(seconds) = overrides.write_timeout {
            self.write_timeout = Some(seconds);
        }
        if let Some(errors) = overrides.errors.as_ref() {
            self.errors = Some(errors.clone());
        }
        if let Some(engine) = overrides.engine.as_ref() {
            self.engine = Some(engine.clone());
        }
        if let Some(image) = overrides.image.as_ref() {
            self.image = Some(image.clone());
        }
        if !overrides.lookup_paths.is_empty() {
            self.lookup_paths = Some(overrides.lookup_paths.clone());
        }
        if let Some(capacity) = overrides.checksum_cache_capacity {
            self.checksum_cache_capacity = Some(capacity);
        }
        if let Some(handler) = overrides.error_handler.as_ref() {
            self.error_handler = Some(handler.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.log_level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.log_json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let client = build_client_settings(&raw)?;
        let render = build_render_settings(&raw)?;
        let logging = build_logging_settings(&raw)?;

        Ok(Self {
            client,
            render,
            logging,
        })
    }
}

fn build_client_settings(raw: &RawSettings) -> Result<ClientSettings, LoadError> {
    let endpoint = parse_endpoint(raw.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;

    let errors = match non_blank(raw.errors.as_deref()) {
        Some(value) => value
            .parse::<ErrorFormat>()
            .map_err(|err| LoadError::invalid("errors", err.to_string()))?,
        None => DEFAULT_ERROR_FORMAT,
    };
    let engine = non_blank(raw.engine.as_deref())
        .map(str::parse::<TexEngine>)
        .transpose()
        .map_err(|err| LoadError::invalid("engine", err.to_string()))?;
    let image = non_blank(raw.image.as_deref()).map(str::to_string);

    Ok(ClientSettings {
        endpoint,
        open_timeout: timeout(raw.open_timeout, DEFAULT_OPEN_TIMEOUT_SECS),
        read_timeout: timeout(raw.read_timeout, DEFAULT_READ_TIMEOUT_SECS),
        write_timeout: timeout(raw.write_timeout, DEFAULT_WRITE_TIMEOUT_SECS),
        errors,
        engine,
        image,
    })
}

fn build_render_settings(raw: &RawSettings) -> Result<RenderSettings, LoadError> {
    let lookup_paths: Vec<PathBuf> = raw
        .lookup_paths
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|path| !path.as_os_str().is_empty())
        .collect();

    let capacity = raw
        .checksum_cache_capacity
        .unwrap_or(DEFAULT_CHECKSUM_CACHE_CAPACITY);
    let checksum_cache_capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
        LoadError::invalid("checksum_cache_capacity", "must be greater than zero")
    })?;

    let error_handler = match non_blank(raw.error_handler.as_deref()) {
        Some(value) => value
            .parse::<ErrorPolicy>()
            .map_err(|reason| LoadError::invalid("error_handler", reason))?,
        None => ErrorPolicy::default(),
    };

    Ok(RenderSettings {
        lookup_paths,
        checksum_cache_capacity,
        error_handler,
    })
}

fn build_logging_settings(raw: &RawSettings) -> Result<LoggingSettings, LoadError> {
    let level = match non_blank(raw.log_level.as_deref()) {
        Some(level) => LevelFilter::from_str(level)
            .map_err(|err| LoadError::invalid("log_level", format!("failed to parse: {err}")))?,
        None => LevelFilter::INFO,
    };

    let format = if raw.log_json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn parse_endpoint(value: &str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid("endpoint", format!("invalid URL `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "endpoint",
            format!(
                "unsupported scheme `{}`, expected http or https",
                url.scheme()
            ),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LoadError::invalid("endpoint", "URL has no host"));
    }
    Ok(url)
}

fn timeout(seconds: Option<u64>, default: u64) -> Option<Duration> {
    match seconds.unwrap_or(default) {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests;
