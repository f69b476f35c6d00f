use crate::ServeArgs;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use mysmap_core::Inbound;
use mysmap_core::MapContext;
use mysmap_core::ReplySink;
use mysmap_protocol::Reply;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Writes each reply message to stdout as one JSON array per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl ReplySink for StdoutSink {
    async fn send(&self, message: Vec<Reply>) {
        match serde_json::to_string(&message) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!("failed to encode reply: {err}"),
        }
    }
}

/// One stdin line as a message. Lines starting with `{` are JSON-encoded
/// [`Inbound`] values; anything else is plain text from a sender whose
/// privilege is `privileged`.
pub fn parse_line(line: &str, privileged: bool) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        return match serde_json::from_str(line) {
            Ok(inbound) => Some(inbound),
            Err(err) => {
                warn!("ignoring malformed message: {err}");
                None
            }
        };
    }
    Some(Inbound {
        text: line.to_string(),
        has_image: false,
        privileged,
    })
}

pub(crate) async fn serve(ctx: Arc<MapContext>, args: ServeArgs) -> Result<()> {
    let scheduler = (!args.no_schedule).then(|| spawn_catalog_refresh(ctx.clone()));
    let sink: Arc<dyn ReplySink> = Arc::new(StdoutSink);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("reading map queries from stdin");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let Some(inbound) = parse_line(&line, args.privileged) else {
                    continue;
                };
                if !ctx.handle(&inbound, sink.clone()).await {
                    debug!("no handler for {:?}", inbound.text);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    Ok(())
}

/// Refreshes the label catalog every `refresh_interval`, and right away when
/// the corpus is already installed.
fn spawn_catalog_refresh(ctx: Arc<MapContext>) -> JoinHandle<()> {
    let period = ctx.config.refresh_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        if !ctx.images.is_installed().await.unwrap_or(false) {
            info!("map corpus not installed, skipping startup catalog refresh");
            ticker.tick().await;
        }
        loop {
            match ctx.catalog.bootstrap().await {
                Ok(stats) => debug!("scheduled catalog refresh: {stats:?}"),
                Err(err) => warn!("scheduled catalog refresh failed: {err}"),
            }
            ticker.tick().await;
        }
    })
}
