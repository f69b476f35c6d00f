use crate::alias::ResolvedLabel;
use crate::client::UpstreamClient;
use crate::error::MapError;
use crate::error::Result;
use crate::layout::DataLayout;
use crate::layout::write_atomic;
use crate::maps::MapRef;
use crate::sink::ReplySink;
use mysmap_protocol::MirrorData;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// How the served image relates to the mirror's latest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Downloaded during this request.
    Fresh,
    /// Local copy already matched the mirror.
    Current,
    /// Mirror unreachable; the last-known-good local copy was served.
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageReply {
    pub image: PathBuf,
    pub label_total: u64,
    pub freshness: Freshness,
}

/// Local image + sidecar for one (map, label).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub image: PathBuf,
    pub metadata: MirrorData,
}

pub struct ImageCache {
    layout: DataLayout,
    client: UpstreamClient,
    installed_threshold: usize,
}

impl ImageCache {
    pub fn new(layout: DataLayout, client: UpstreamClient, installed_threshold: usize) -> Self {
        Self {
            layout,
            client,
            installed_threshold,
        }
    }

    pub async fn is_installed(&self) -> Result<bool> {
        Ok(self.layout.primary_entry_count().await? >= self.installed_threshold)
    }

    /// Local record for `(map, label)`, if a readable sidecar exists.
    pub async fn load_record(&self, map: MapRef, label_id: &str) -> Result<Option<CacheRecord>> {
        let sidecar = self.layout.sidecar(map.id, label_id);
        let content = match fs::read(&sidecar).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let metadata: MirrorData = serde_json::from_slice(&content)?;
        Ok(Some(CacheRecord {
            image: self.layout.image(map.id, label_id),
            metadata,
        }))
    }

    /// Serve the image for `label` on `map`, refreshing it from the mirror
    /// when the mirror has a newer version or `force_refresh` is set. `sink`
    /// hears about a download before it starts.
    pub async fn get(
        &self,
        map: MapRef,
        label: &ResolvedLabel,
        force_refresh: bool,
        sink: &dyn ReplySink,
    ) -> Result<ImageReply> {
        if !self.is_installed().await? {
            return Err(MapError::NotInstalled);
        }

        let local = match self.load_record(map, &label.id).await {
            Ok(local) => local,
            Err(err) => {
                warn!("ignoring unreadable sidecar for {}/{}: {err}", map.id, label.id);
                None
            }
        };

        match self.refresh(map, label, local.as_ref(), force_refresh, sink).await {
            Ok(reply) => Ok(reply),
            Err(err) if err.is_transport() => match local {
                Some(record) => {
                    warn!(
                        "mirror unavailable for {}/{}, serving cached image: {err}",
                        map.id, label.id
                    );
                    Ok(ImageReply {
                        image: record.image,
                        label_total: record.metadata.label_total,
                        freshness: Freshness::Degraded,
                    })
                }
                None => {
                    warn!("mirror unavailable for {}/{} and nothing cached: {err}", map.id, label.id);
                    Err(MapError::NotFound {
                        map: map.name.to_string(),
                        label: label.name.clone(),
                    })
                }
            },
            Err(err) => Err(err),
        }
    }

    async fn refresh(
        &self,
        map: MapRef,
        label: &ResolvedLabel,
        local: Option<&CacheRecord>,
        force_refresh: bool,
        sink: &dyn ReplySink,
    ) -> Result<ImageReply> {
        let version = self.layout.corpus_version().await?;
        let response = self.client.mirror_lookup(&label.id, map.id, &version).await?;

        if response.is_version_mismatch() {
            return Err(MapError::VersionMismatch);
        }
        if !response.is_ok() {
            return Err(MapError::Remote(response.message));
        }
        let Some(remote) = response.data else {
            return Err(MapError::Remote(format!("「{}」暂无地图数据", label.name)));
        };

        let local_timestamp = local.map_or(0, |record| record.metadata.timestamp);
        let stale = local.is_none() || remote.timestamp > local_timestamp || force_refresh;
        let image = self.layout.image(map.id, &label.id);

        if !stale {
            debug!(
                "cache current for {}/{} (timestamp {local_timestamp})",
                map.id, label.id
            );
            return Ok(ImageReply {
                image,
                label_total: remote.label_total,
                freshness: Freshness::Current,
            });
        }

        sink.send_text(format!("「{}」资源更新中...", label.name)).await;
        info!(
            "updating {}/{}: local timestamp {local_timestamp}, remote {}",
            map.id, label.id, remote.timestamp
        );
        self.client
            .download(&self.client.mirror_url(&remote.image), &image)
            .await?;
        write_atomic(
            &self.layout.sidecar(map.id, &label.id),
            &serde_json::to_vec_pretty(&remote)?,
        )
        .await?;

        Ok(ImageReply {
            image,
            label_total: remote.label_total,
            freshness: Freshness::Fresh,
        })
    }
}
