use std::{process, sync::Arc};

use folio_cache::{
    application::{error::AppError, invalidation::InvalidationService},
    cache::{CacheConfig, PageCache},
    config::{self, Command, PurgeTarget, Settings},
    content::ContentCatalog,
    edge::{EdgePurger, render_purge_acl},
    infra::{error::InfraError, telemetry},
    kv::ReplicatedKv,
    warmup::Warmer,
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const TARGET: &str = "folio::cli";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Warm => {
            let warmer = build_warmer(&settings)?;
            print_json(&warmer.warm_all().await)
        }
        Command::Sitemap => {
            let warmer = build_warmer(&settings)?;
            print_json(&warmer.warm_sitemap().await)
        }
        Command::Recent => {
            let warmer = build_warmer(&settings)?;
            print_json(&warmer.warm_recently_updated().await)
        }
        Command::Invalidate(args) => {
            let cache = build_cache(&settings)?;
            let edge = EdgePurger::from_settings(&settings.edge)?;
            let mut service = InvalidationService::new(cache, edge);
            if args.warm {
                service = service.with_warmer(Arc::new(build_warmer(&settings)?));
            }
            print_json(&service.invalidate_tags(&args.tags, args.warm).await)
        }
        Command::Purge(args) => {
            let edge = enabled_edge(&settings)?;
            let summary = match args.target {
                PurgeTarget::Url { urls } => edge.purge_urls(&urls).await,
                PurgeTarget::Post { id } => edge.purge_post(&id).await,
                PurgeTarget::Category { id } => edge.purge_category(&id).await,
                PurgeTarget::Tag { id } => edge.purge_tag(&id).await,
                PurgeTarget::Page { id } => edge.purge_page(&id).await,
                PurgeTarget::All => edge.purge_all().await,
            };
            print_json(&summary)
        }
        Command::Ban(args) => {
            let edge = enabled_edge(&settings)?;
            let summary = match args.pattern {
                Some(pattern) => edge.ban_pattern(&pattern).await,
                None => edge.ban_tags(&args.tags).await,
            };
            print_json(&summary)
        }
        Command::Stats => {
            let cache = build_cache(&settings)?;
            let stats = cache.stats().await?;
            let nodes = cache.kv().cluster_nodes().await;
            print_json(&serde_json::json!({ "cache": stats, "nodes": nodes }))
        }
        Command::Flush => {
            let cache = build_cache(&settings)?;
            let removed = cache.flush_all().await?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::Promote => {
            let kv = ReplicatedKv::from_settings(&settings.kv)?;
            kv.promote_replica_to_master()?;
            print_json(&kv.cluster_nodes().await)
        }
        Command::Daemon(_) => run_daemon(&settings).await,
        Command::VclAcl => {
            print!("{}", render_purge_acl(&settings.edge));
            Ok(())
        }
    }
}

async fn run_daemon(settings: &Settings) -> Result<(), AppError> {
    let warmer = build_warmer(settings)?;
    let interval = settings.warmup.schedule_interval;

    let passes = warmer
        .run_schedule(interval, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(target: TARGET, error = %err, "failed to listen for shutdown signal");
            }
        })
        .await;

    info!(target: TARGET, passes, "daemon stopped");
    Ok(())
}

fn build_cache(settings: &Settings) -> Result<Arc<PageCache>, AppError> {
    let kv = ReplicatedKv::from_settings(&settings.kv)?;
    Ok(Arc::new(PageCache::new(
        Arc::new(kv),
        CacheConfig::from(&settings.cache),
    )))
}

fn build_warmer(settings: &Settings) -> Result<Warmer, AppError> {
    let catalog = ContentCatalog::from_settings(&settings.content)?;
    Ok(Warmer::from_settings(&settings.warmup, catalog)?)
}

fn enabled_edge(settings: &Settings) -> Result<EdgePurger, AppError> {
    if !settings.edge.enabled {
        return Err(AppError::validation(
            "edge purging is disabled; set edge.enabled or pass --edge-enabled true",
        ));
    }
    Ok(EdgePurger::from_settings(&settings.edge)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(InfraError::from)?;
    println!("{rendered}");
    Ok(())
}
