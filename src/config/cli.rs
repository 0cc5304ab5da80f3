use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the folio-cache operations binary.
#[derive(Debug, Parser)]
#[command(
    name = "folio-cache",
    version,
    about = "Folio page cache, edge purge and warmup operations"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a full warmup pass over every content phase.
    Warm,
    /// Replay every URL listed in the sitemap.
    Sitemap,
    /// Warm content updated within the recent window plus the homepage.
    Recent,
    /// Invalidate page cache entries and edge objects by tag.
    Invalidate(InvalidateArgs),
    /// Send PURGE requests to the edge accelerator.
    Purge(PurgeArgs),
    /// Send a BAN request to the edge accelerator.
    Ban(BanArgs),
    /// Print page cache statistics and node health as JSON.
    Stats,
    /// Delete every page cache entry.
    Flush,
    /// Route master traffic to the replica for this process.
    Promote,
    /// Periodically warm recently updated content until interrupted.
    Daemon(DaemonArgs),
    /// Print the VCL `acl purge` block for the configured allowed IPs.
    #[command(name = "vcl-acl")]
    VclAcl,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    /// Tags to invalidate, e.g. `post:42`, `posts`, `homepage`.
    #[arg(value_name = "TAG", required = true, num_args = 1..)]
    pub tags: Vec<String>,

    /// Re-warm one URL per tag after invalidation.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub warm: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    #[command(subcommand)]
    pub target: PurgeTarget,
}

#[derive(Debug, Subcommand, Clone)]
pub enum PurgeTarget {
    /// Purge exact URLs or paths.
    Url {
        #[arg(value_name = "URL", required = true, num_args = 1..)]
        urls: Vec<String>,
    },
    /// Purge a post, its listings and its tags.
    Post {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Purge a category and its listings.
    Category {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Purge a tag and its listings.
    Tag {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Purge a static page.
    Page {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Ban every object on the edge.
    All,
}

#[derive(Debug, Args, Clone)]
pub struct BanArgs {
    /// Regex matched against object URLs.
    #[arg(long, value_name = "REGEX", conflicts_with = "tags")]
    pub pattern: Option<String>,

    /// Tags matched against the cache-tag header of stored objects.
    #[arg(long = "tag", value_name = "TAG", required_unless_present = "pattern")]
    pub tags: Vec<String>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct DaemonArgs {
    /// Override the interval between warm passes.
    #[arg(long = "interval-seconds", value_name = "SECONDS")]
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the master KV host.
    #[arg(long = "kv-master-host", value_name = "HOST", global = true)]
    pub kv_master_host: Option<String>,

    /// Override the master KV port.
    #[arg(long = "kv-master-port", value_name = "PORT", global = true)]
    pub kv_master_port: Option<u16>,

    /// Override the replica KV host.
    #[arg(long = "kv-replica-host", value_name = "HOST", global = true)]
    pub kv_replica_host: Option<String>,

    /// Override the replica KV port.
    #[arg(long = "kv-replica-port", value_name = "PORT", global = true)]
    pub kv_replica_port: Option<u16>,

    /// Toggle read routing to the replica.
    #[arg(
        long = "kv-replication-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub kv_replication_enabled: Option<bool>,

    /// Toggle edge purging.
    #[arg(
        long = "edge-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub edge_enabled: Option<bool>,

    /// Override the edge accelerator host.
    #[arg(long = "edge-host", value_name = "HOST", global = true)]
    pub edge_host: Option<String>,

    /// Override the origin base URL used for warm requests.
    #[arg(long = "warmup-base-url", value_name = "URL", global = true)]
    pub warmup_base_url: Option<String>,

    /// Override the sitemap batch size.
    #[arg(long = "warmup-batch-size", value_name = "COUNT", global = true)]
    pub warmup_batch_size: Option<u64>,

    /// Override the delay between sitemap batches.
    #[arg(long = "warmup-batch-delay-ms", value_name = "MILLIS", global = true)]
    pub warmup_batch_delay_ms: Option<u64>,

    /// Override the content API base URL.
    #[arg(long = "content-api-base-url", value_name = "URL", global = true)]
    pub content_api_base_url: Option<String>,
}
