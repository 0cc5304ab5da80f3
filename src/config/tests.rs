use std::io::Write;

use serial_test::serial;

use super::*;

#[test]
fn defaults_resolve_without_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));

    assert!(!settings.kv.replication_enabled);
    assert_eq!(settings.kv.master.host, "127.0.0.1");
    assert_eq!(settings.kv.master.port, 6379);
    assert!(settings.kv.replica.is_none());
    assert_eq!(settings.kv.retry_attempts.get(), 3);
    assert_eq!(settings.kv.retry_backoff, Duration::from_millis(100));

    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(3600));
    assert!(settings.cache.compression_enabled);
    assert_eq!(settings.cache.compression_threshold, 10 * 1024);
    assert_eq!(settings.cache.stats_ttl, Duration::from_secs(86_400));

    assert!(!settings.edge.enabled);
    assert!(settings.edge.admin_port.is_none());

    assert_eq!(settings.warmup.batch_size.get(), 50);
    assert_eq!(settings.warmup.batch_delay, Duration::from_millis(500));
    assert_eq!(settings.warmup.page_timeout, Duration::from_secs(30));
    assert_eq!(settings.warmup.sitemap_timeout, Duration::from_secs(60));
    assert_eq!(settings.warmup.popular_limit, 20);
    assert_eq!(settings.warmup.popular_window_days, 30);
    assert_eq!(settings.warmup.recent_window, Duration::from_secs(24 * 3600));
    assert_eq!(
        settings.warmup.sitemap_url.as_str(),
        "http://127.0.0.1:3000/sitemap.xml"
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.warmup.batch_size = Some(10);
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        warmup_batch_size: Some(25),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.warmup.batch_size.get(), 25);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_batch_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.warmup.batch_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero batch size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "warmup.batch_size",
            ..
        }
    ));
}

#[test]
fn replication_requires_replica_host() {
    let mut raw = RawSettings::default();
    raw.kv.replication_enabled = Some(true);

    let err = Settings::from_raw(raw).expect_err("missing replica");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "kv.replication_enabled",
            ..
        }
    ));
}

#[test]
fn replica_node_is_built_when_host_present() {
    let mut raw = RawSettings::default();
    raw.kv.replication_enabled = Some(true);
    raw.kv.replica.host = Some("replica.internal".to_string());
    raw.kv.replica.password = Some(String::new());
    raw.kv.replica.db = Some(3);

    let settings = Settings::from_raw(raw).expect("valid settings");
    let replica = settings.kv.replica.expect("replica");
    assert_eq!(replica.host, "replica.internal");
    assert_eq!(replica.port, 6379);
    assert_eq!(replica.password, None);
    assert_eq!(replica.db, 3);
}

#[test]
fn invalid_allowed_ip_is_rejected() {
    let mut raw = RawSettings::default();
    raw.edge.allowed_ips = Some(vec!["10.0.0.0/8".to_string(), "not-an-ip".to_string()]);

    let err = Settings::from_raw(raw).expect_err("bad ip");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "edge.allowed_ips",
            ..
        }
    ));
}

#[test]
fn base_urls_gain_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.content.api_base_url = Some("https://cms.example.com/api/v1".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.content.api_base_url.as_str(),
        "https://cms.example.com/api/v1/"
    );
}

#[test]
fn non_http_base_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.warmup.base_url = Some("ftp://example.com".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn parse_invalidate_arguments() {
    let args = CliArgs::parse_from(["folio-cache", "invalidate", "post:42", "posts", "--warm"]);

    match args.command {
        Command::Invalidate(invalidate) => {
            assert_eq!(invalidate.tags, vec!["post:42", "posts"]);
            assert!(invalidate.warm);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_purge_post_arguments() {
    let args = CliArgs::parse_from(["folio-cache", "purge", "post", "42"]);

    match args.command {
        Command::Purge(PurgeArgs {
            target: PurgeTarget::Post { id },
        }) => assert_eq!(id, "42"),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_ban_requires_pattern_or_tag() {
    assert!(CliArgs::try_parse_from(["folio-cache", "ban"]).is_err());

    let args = CliArgs::parse_from(["folio-cache", "ban", "--tag", "posts", "--tag", "homepage"]);
    match args.command {
        Command::Ban(ban) => {
            assert_eq!(ban.tags, vec!["posts", "homepage"]);
            assert!(ban.pattern.is_none());
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn global_overrides_parse_after_subcommand() {
    let args = CliArgs::parse_from([
        "folio-cache",
        "sitemap",
        "--warmup-batch-size",
        "10",
        "--log-json",
        "true",
    ]);

    assert!(matches!(args.command, Command::Sitemap));
    assert_eq!(args.overrides.warmup_batch_size, Some(10));
    assert_eq!(args.overrides.log_json, Some(true));
}

#[test]
#[serial]
fn daemon_interval_override_applies() {
    let args = CliArgs::parse_from(["folio-cache", "daemon", "--interval-seconds", "60"]);
    let settings = load(&args).expect("settings");
    assert_eq!(settings.warmup.schedule_interval, Duration::from_secs(60));
}

#[test]
#[serial]
fn config_file_layers_under_cli_overrides() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[edge]\nenabled = true\nhost = \"varnish.internal\"\nadmin_port = 6082\n\n[warmup]\nbatch_size = 5"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let args = CliArgs::parse_from([
        "folio-cache",
        "--config-file",
        path.as_str(),
        "--warmup-batch-size",
        "7",
        "warm",
    ]);
    let settings = load(&args).expect("settings");

    assert!(settings.edge.enabled);
    assert_eq!(settings.edge.host, "varnish.internal");
    assert_eq!(settings.edge.admin_port, Some(6082));
    assert_eq!(settings.warmup.batch_size.get(), 7);
}

#[test]
#[serial]
fn environment_lists_are_split() {
    // SAFETY: serialized with every other test that reads the environment.
    unsafe {
        std::env::set_var("FOLIO__EDGE__ALLOWED_IPS", "10.0.0.0/8,192.168.1.1");
    }
    let args = CliArgs::parse_from(["folio-cache", "stats"]);
    let result = load(&args);
    unsafe {
        std::env::remove_var("FOLIO__EDGE__ALLOWED_IPS");
    }

    let settings = result.expect("settings");
    assert_eq!(
        settings.edge.allowed_ips,
        vec!["10.0.0.0/8".to_string(), "192.168.1.1".to_string()]
    );
}
