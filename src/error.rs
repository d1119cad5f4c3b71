//! Error types shared across the planner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// How the retry driver should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service asked us to slow down; wait a fixed cooldown and retry.
    RateLimited,
    /// Network trouble or an unexpected response; retry with back-off.
    Transient,
    /// Retrying cannot help.
    Permanent,
}

/// Maps an attempt error onto a [`FailureKind`].
pub trait Classify {
    fn kind(&self) -> FailureKind;
}

/// Failures reading or writing a cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One failed geocoding attempt.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding service refused the request (HTTP 403)")]
    RateLimited,
    #[error("geocoding service answered HTTP {0}")]
    Status(u16),
    #[error("geocoding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected geocoding response: {0}")]
    Decode(String),
    #[error("no result for address")]
    NoResult,
}

impl Classify for GeocodeError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::RateLimited,
            Self::NoResult => FailureKind::Permanent,
            Self::Status(_) | Self::Transport(_) | Self::Decode(_) => FailureKind::Transient,
        }
    }
}

/// One failed routing attempt.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing service rate limit hit (HTTP 429)")]
    RateLimited,
    #[error("routing service answered HTTP {0}")]
    Status(u16),
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("routing service returned code {code}: {message}")]
    Service { code: String, message: String },
    #[error("routing service returned no routes")]
    NoRoute,
}

impl Classify for RouteError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::RateLimited,
            Self::Status(_) | Self::Transport(_) | Self::Service { .. } | Self::NoRoute => {
                FailureKind::Transient
            }
        }
    }
}

/// Why the retry driver gave up on an item.
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },
    #[error("still rate limited after {waits} cooldowns")]
    RateLimited { waits: u32 },
    #[error("permanent failure: {0}")]
    Permanent(#[source] E),
}

/// Failures loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures handing a plan to a report sink.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report output failed: {0}")]
    Io(#[from] io::Error),
    #[error("report serialisation failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Conditions that abort a planning run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no delivery addresses were supplied")]
    NoAddresses,
    #[error("start address could not be resolved: {0}")]
    StartUnresolved(String),
    #[error("only {resolved} point(s) resolved; need the start and at least one delivery")]
    TooFewPoints { resolved: usize },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Report(#[from] ReportError),
}
