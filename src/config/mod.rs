//! Configuration layer: typed settings with layered precedence (file → env).

use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "veglia";

const DEFAULT_FRESH_WINDOW_SECS: u64 = 240;
const DEFAULT_GRACE_WINDOW_SECS: u64 = 60;
const DEFAULT_LOCK_TTL_SECS: u64 = 2;
const DEFAULT_LOCK_POLL_MS: u64 = 100;
const DEFAULT_LOCK_WAIT_BUDGET_MS: u64 = 3000;
const DEFAULT_MICRO_TTL_SECS: u64 = 30;
const DEFAULT_MICRO_CAPACITY: usize = 1024;
const DEFAULT_HOT_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_TRACKED_PAGES: u32 = 32;
const DEFAULT_PAGE_LIMIT: u32 = 20;
const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_MAX_BACKGROUND_REFRESHES: usize = 32;

const DEFAULT_PROFILE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PROFILE_MAX_CONCURRENCY: usize = 5;
const DEFAULT_PROFILE_RATE_LIMIT_PER_SECOND: u32 = 15;
const DEFAULT_PROFILE_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_PROFILE_RETRY_BASE_MS: u64 = 500;
const DEFAULT_PROFILE_MEMO_TTL_SECS: u64 = 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub kv: KvSettings,
    pub profile_source: ProfileSourceSettings,
    pub cache: CacheSettings,
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

#[derive(Debug, Clone)]
pub struct KvSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileSourceSettings {
    pub base_url: Option<Url>,
    pub request_timeout: Duration,
    pub max_concurrency: NonZeroUsize,
    pub rate_limit_per_second: NonZeroU32,
    pub retry_attempts: NonZeroU32,
    pub retry_base_backoff: Duration,
    pub memo_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub fresh_window: Duration,
    pub grace_window: Duration,
    pub lock_ttl: Duration,
    pub lock_poll_interval: Duration,
    pub lock_wait_budget: Duration,
    pub micro_ttl: Duration,
    pub micro_capacity: NonZeroUsize,
    pub hot_ttl: Duration,
    pub max_tracked_pages: u32,
    pub default_page_limit: NonZeroU32,
    pub max_page_limit: NonZeroU32,
    pub max_background_refreshes: NonZeroUsize,
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

/// Load settings from the default file locations and the environment.
pub fn load() -> Result<Settings, LoadError> {
    load_inner(None)
}

/// Load settings, layering an explicit configuration file on top of the
/// defaults before the environment is applied.
pub fn load_from(path: &Path) -> Result<Settings, LoadError> {
    load_inner(Some(path))
}

fn load_inner(explicit: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VEGLIA").separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            kv: build_kv_settings(raw.kv),
            profile_source: build_profile_source_settings(raw.profile_source)?,
            cache: build_cache_settings(raw.cache)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    kv: RawKvSettings,
    profile_source: RawProfileSourceSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKvSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProfileSourceSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    max_concurrency: Option<usize>,
    rate_limit_per_second: Option<u32>,
    retry_attempts: Option<u32>,
    retry_base_ms: Option<u64>,
    memo_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    fresh_seconds: Option<u64>,
    grace_seconds: Option<u64>,
    lock_ttl_seconds: Option<u64>,
    lock_poll_ms: Option<u64>,
    lock_wait_budget_ms: Option<u64>,
    micro_ttl_seconds: Option<u64>,
    micro_capacity: Option<usize>,
    hot_ttl_seconds: Option<u64>,
    max_tracked_pages: Option<u32>,
    default_page_limit: Option<u32>,
    max_page_limit: Option<u32>,
    max_background_refreshes: Option<usize>,
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_kv_settings(kv: RawKvSettings) -> KvSettings {
    let url = kv.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    KvSettings { url }
}

fn build_profile_source_settings(
    profile: RawProfileSourceSettings,
) -> Result<ProfileSourceSettings, LoadError> {
    let base_url = profile
        .base_url
        .map(|value| {
            Url::parse(value.trim()).map_err(|err| {
                LoadError::invalid("profile_source.base_url", format!("failed to parse: {err}"))
            })
        })
        .transpose()?;

    let timeout_secs = profile
        .timeout_seconds
        .unwrap_or(DEFAULT_PROFILE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "profile_source.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let retry_base_ms = profile.retry_base_ms.unwrap_or(DEFAULT_PROFILE_RETRY_BASE_MS);
    if retry_base_ms == 0 {
        return Err(LoadError::invalid(
            "profile_source.retry_base_ms",
            "must be greater than zero",
        ));
    }

    let memo_ttl_secs = profile
        .memo_ttl_seconds
        .unwrap_or(DEFAULT_PROFILE_MEMO_TTL_SECS);
    if memo_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "profile_source.memo_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ProfileSourceSettings {
        base_url,
        request_timeout: Duration::from_secs(timeout_secs),
        max_concurrency: non_zero_usize(
            profile
                .max_concurrency
                .unwrap_or(DEFAULT_PROFILE_MAX_CONCURRENCY),
            "profile_source.max_concurrency",
        )?,
        rate_limit_per_second: non_zero_u32(
            profile
                .rate_limit_per_second
                .unwrap_or(DEFAULT_PROFILE_RATE_LIMIT_PER_SECOND),
            "profile_source.rate_limit_per_second",
        )?,
        retry_attempts: non_zero_u32(
            profile
                .retry_attempts
                .unwrap_or(DEFAULT_PROFILE_RETRY_ATTEMPTS),
            "profile_source.retry_attempts",
        )?,
        retry_base_backoff: Duration::from_millis(retry_base_ms),
        memo_ttl: Duration::from_secs(memo_ttl_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let fresh_secs = cache.fresh_seconds.unwrap_or(DEFAULT_FRESH_WINDOW_SECS);
    if fresh_secs == 0 {
        return Err(LoadError::invalid(
            "cache.fresh_seconds",
            "must be greater than zero",
        ));
    }

    let grace_secs = cache.grace_seconds.unwrap_or(DEFAULT_GRACE_WINDOW_SECS);
    if grace_secs == 0 {
        return Err(LoadError::invalid(
            "cache.grace_seconds",
            "must be greater than zero",
        ));
    }

    let lock_ttl_secs = cache.lock_ttl_seconds.unwrap_or(DEFAULT_LOCK_TTL_SECS);
    if lock_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.lock_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let lock_poll_ms = cache.lock_poll_ms.unwrap_or(DEFAULT_LOCK_POLL_MS);
    if lock_poll_ms == 0 {
        return Err(LoadError::invalid(
            "cache.lock_poll_ms",
            "must be greater than zero",
        ));
    }

    let lock_wait_budget_ms = cache
        .lock_wait_budget_ms
        .unwrap_or(DEFAULT_LOCK_WAIT_BUDGET_MS);
    if lock_wait_budget_ms < lock_poll_ms {
        return Err(LoadError::invalid(
            "cache.lock_wait_budget_ms",
            "must be at least the poll interval",
        ));
    }

    let hot_ttl_secs = cache.hot_ttl_seconds.unwrap_or(DEFAULT_HOT_TTL_SECS);
    if hot_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.hot_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let max_tracked_pages = cache
        .max_tracked_pages
        .unwrap_or(DEFAULT_MAX_TRACKED_PAGES);
    if max_tracked_pages == 0 {
        return Err(LoadError::invalid(
            "cache.max_tracked_pages",
            "must be greater than zero",
        ));
    }

    let default_page_limit = non_zero_u32(
        cache.default_page_limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        "cache.default_page_limit",
    )?;
    let max_page_limit = non_zero_u32(
        cache.max_page_limit.unwrap_or(DEFAULT_MAX_PAGE_LIMIT),
        "cache.max_page_limit",
    )?;
    if default_page_limit > max_page_limit {
        return Err(LoadError::invalid(
            "cache.default_page_limit",
            "must not exceed cache.max_page_limit",
        ));
    }

    Ok(CacheSettings {
        fresh_window: Duration::from_secs(fresh_secs),
        grace_window: Duration::from_secs(grace_secs),
        lock_ttl: Duration::from_secs(lock_ttl_secs),
        lock_poll_interval: Duration::from_millis(lock_poll_ms),
        lock_wait_budget: Duration::from_millis(lock_wait_budget_ms),
        micro_ttl: Duration::from_secs(cache.micro_ttl_seconds.unwrap_or(DEFAULT_MICRO_TTL_SECS)),
        micro_capacity: non_zero_usize(
            cache.micro_capacity.unwrap_or(DEFAULT_MICRO_CAPACITY),
            "cache.micro_capacity",
        )?,
        hot_ttl: Duration::from_secs(hot_ttl_secs),
        max_tracked_pages,
        default_page_limit,
        max_page_limit,
        max_background_refreshes: non_zero_usize(
            cache
                .max_background_refreshes
                .unwrap_or(DEFAULT_MAX_BACKGROUND_REFRESHES),
            "cache.max_background_refreshes",
        )?,
    })
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
