use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use mysmap_core::Dispatch;
use mysmap_core::Inbound;
use mysmap_core::MapConfig;
use mysmap_core::MapContext;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

mod host;

pub use host::StdoutSink;
pub use host::parse_line;

#[derive(Debug, Parser)]
#[command(name = "mys-map", version, about = "Genshin Impact map resource lookup")]
pub struct Cli {
    /// TOML config file; every field is optional
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory, overriding the config file
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer messages read from stdin, one per line, and refresh the label
    /// catalog periodically
    Serve(ServeArgs),

    /// Answer a single message
    Query(QueryArgs),

    /// Refresh the label catalog, aliases and icons once
    Bootstrap,
}

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Treat plain-text lines as coming from a privileged sender
    #[arg(long)]
    pub privileged: bool,

    /// Do not run the periodic catalog refresh
    #[arg(long)]
    pub no_schedule: bool,
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Message text
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Sender may install or update the resource package
    #[arg(long)]
    pub privileged: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref(), self.data_dir)?;
        let ctx = Arc::new(MapContext::from_config(config).context("Failed to initialize map context")?);

        match self.command {
            Command::Serve(args) => host::serve(ctx, args).await,
            Command::Query(args) => run_query(&ctx, args).await,
            Command::Bootstrap => run_bootstrap(&ctx).await,
        }
    }
}

/// Config from `path` (defaults when absent) with `data_dir` applied on top.
pub fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<MapConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => MapConfig::default(),
    };
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("Invalid config: {err}"))?;
    Ok(config)
}

async fn run_query(ctx: &MapContext, args: QueryArgs) -> Result<()> {
    let inbound = Inbound {
        text: args.text,
        has_image: false,
        privileged: args.privileged,
    };
    match ctx.dispatch(&inbound, Arc::new(StdoutSink)).await {
        Dispatch::Declined => info!("no handler for {:?}", inbound.text),
        Dispatch::Handled => {}
        // Keep the runtime up until the transfer and its catalog refresh end.
        Dispatch::Transfer(handle) => {
            let report = handle.await.context("Resource package transfer panicked")?;
            if let Err(err) = &report.result {
                warn!("resource package {} failed: {err}", report.kind);
            }
        }
    }
    Ok(())
}

async fn run_bootstrap(ctx: &MapContext) -> Result<()> {
    let stats = ctx
        .catalog
        .bootstrap()
        .await
        .context("Catalog refresh failed")?;
    println!(
        "Refreshed {} labels in {} categories ({} new aliases, {} icons downloaded, {} icon failures)",
        stats.labels, stats.categories, stats.aliases_added, stats.icons_downloaded, stats.icons_failed
    );
    Ok(())
}
