use std::time::Duration;

use super::*;

#[test]
fn defaults_match_reference_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("defaults are valid");

    assert_eq!(settings.cache.fresh_window, Duration::from_secs(240));
    assert_eq!(settings.cache.grace_window, Duration::from_secs(60));
    assert_eq!(settings.cache.lock_ttl, Duration::from_secs(2));
    assert_eq!(settings.cache.lock_poll_interval, Duration::from_millis(100));
    assert_eq!(settings.cache.lock_wait_budget, Duration::from_millis(3000));
    assert_eq!(settings.cache.micro_ttl, Duration::from_secs(30));
    assert_eq!(settings.cache.hot_ttl, Duration::from_secs(3600));
    assert_eq!(settings.cache.default_page_limit.get(), 20);

    assert_eq!(settings.profile_source.request_timeout, Duration::from_secs(15));
    assert_eq!(settings.profile_source.max_concurrency.get(), 5);
    assert_eq!(settings.profile_source.rate_limit_per_second.get(), 15);
    assert_eq!(settings.profile_source.retry_attempts.get(), 3);
    assert_eq!(
        settings.profile_source.retry_base_backoff,
        Duration::from_millis(500)
    );
    assert_eq!(settings.profile_source.memo_ttl, Duration::from_secs(60));

    assert!(settings.kv.url.is_none());
    assert!(settings.profile_source.base_url.is_none());
}

#[test]
fn logging_defaults_to_compact_info() {
    let settings = Settings::from_raw(RawSettings::default()).expect("defaults are valid");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn logging_parses_level_and_json() {
    let raw = RawSettings {
        logging: RawLoggingSettings {
            level: Some("debug".to_string()),
            json: Some(true),
        },
        ..Default::default()
    };
    let settings = Settings::from_raw(raw).expect("logging settings are valid");
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn invalid_log_level_is_rejected() {
    let raw = RawSettings {
        logging: RawLoggingSettings {
            level: Some("extremely-loud".to_string()),
            json: None,
        },
        ..Default::default()
    };
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "logging.level", .. })
    ));
}

#[test]
fn zero_fresh_window_is_rejected() {
    let raw = RawSettings {
        cache: RawCacheSettings {
            fresh_seconds: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "cache.fresh_seconds", .. })
    ));
}

#[test]
fn zero_grace_window_is_rejected() {
    let raw = RawSettings {
        cache: RawCacheSettings {
            grace_seconds: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "cache.grace_seconds", .. })
    ));
}

#[test]
fn wait_budget_below_poll_interval_is_rejected() {
    let raw = RawSettings {
        cache: RawCacheSettings {
            lock_poll_ms: Some(500),
            lock_wait_budget_ms: Some(100),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "cache.lock_wait_budget_ms", .. })
    ));
}

#[test]
fn default_limit_above_max_is_rejected() {
    let raw = RawSettings {
        cache: RawCacheSettings {
            default_page_limit: Some(200),
            max_page_limit: Some(100),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "cache.default_page_limit", .. })
    ));
}

#[test]
fn custom_cache_windows_are_applied() {
    let raw = RawSettings {
        cache: RawCacheSettings {
            fresh_seconds: Some(10),
            grace_seconds: Some(5),
            ..Default::default()
        },
        ..Default::default()
    };
    let settings = Settings::from_raw(raw).expect("windows are valid");
    assert_eq!(settings.cache.fresh_window, Duration::from_secs(10));
    assert_eq!(settings.cache.grace_window, Duration::from_secs(5));
}

#[test]
fn profile_base_url_is_parsed() {
    let raw = RawSettings {
        profile_source: RawProfileSourceSettings {
            base_url: Some("https://profiles.internal.example/".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let settings = Settings::from_raw(raw).expect("base url is valid");
    let url = settings.profile_source.base_url.expect("base url present");
    assert_eq!(url.host_str(), Some("profiles.internal.example"));
}

#[test]
fn malformed_profile_base_url_is_rejected() {
    let raw = RawSettings {
        profile_source: RawProfileSourceSettings {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key: "profile_source.base_url", .. })
    ));
}

#[test]
fn blank_kv_url_reads_as_unset() {
    let raw = RawSettings {
        kv: RawKvSettings {
            url: Some("   ".to_string()),
        },
        ..Default::default()
    };
    let settings = Settings::from_raw(raw).expect("kv settings are valid");
    assert!(settings.kv.url.is_none());
}

#[test]
fn cache_config_mirrors_settings() {
    let raw = RawSettings {
        cache: RawCacheSettings {
            fresh_seconds: Some(120),
            grace_seconds: Some(30),
            micro_capacity: Some(16),
            ..Default::default()
        },
        ..Default::default()
    };
    let settings = Settings::from_raw(raw).expect("settings are valid");
    let cache_config = crate::cache::CacheConfig::from(&settings.cache);
    assert_eq!(cache_config.fresh_window, Duration::from_secs(120));
    assert_eq!(cache_config.grace_window, Duration::from_secs(30));
    assert_eq!(cache_config.micro_capacity, 16);
    assert_eq!(cache_config.total_ttl(), Duration::from_secs(150));
}
