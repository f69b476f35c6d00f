use crate::catalog::BootstrapStats;
use crate::catalog::LabelCatalog;
use crate::client::UpstreamClient;
use crate::error::MapError;
use crate::error::Result;
use crate::layout::DataLayout;
use crate::maps::MapRef;
use crate::sink::ReplySink;
use crate::transfer::CorpusTransfer;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Label id used to probe the mirror for corpus changes.
const PROBE_LABEL_ID: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Install,
    Update,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Install => f.write_str("安装"),
            TransferKind::Update => f.write_str("更新"),
        }
    }
}

/// Result of a background transfer, available by awaiting the handle in
/// [`InstallOutcome::Started`].
#[derive(Debug)]
pub struct TransferReport {
    pub kind: TransferKind,
    pub result: Result<()>,
    /// Catalog pass run after a successful install.
    pub bootstrap: Option<BootstrapStats>,
}

#[derive(Debug)]
pub enum InstallOutcome {
    AlreadyInProgress,
    AlreadyInstalled,
    AlreadyLatest,
    NotInstalled,
    Started(JoinHandle<TransferReport>),
}

/// Clears the in-flight flag when dropped, whichever way the owning task ends.
struct InstallGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Clones and updates the image corpus. At most one transfer runs at a time.
pub struct PackageInstaller {
    layout: DataLayout,
    client: UpstreamClient,
    transfer: Arc<dyn CorpusTransfer>,
    catalog: Arc<LabelCatalog>,
    installing: Arc<AtomicBool>,
    corpus_repo: String,
    complete_threshold: usize,
}

impl PackageInstaller {
    pub fn new(
        layout: DataLayout,
        client: UpstreamClient,
        transfer: Arc<dyn CorpusTransfer>,
        catalog: Arc<LabelCatalog>,
        corpus_repo: String,
        complete_threshold: usize,
    ) -> Self {
        Self {
            layout,
            client,
            transfer,
            catalog,
            installing: Arc::new(AtomicBool::new(false)),
            corpus_repo,
            complete_threshold,
        }
    }

    pub fn is_installing(&self) -> bool {
        self.installing.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<InstallGuard> {
        self.installing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InstallGuard {
                flag: self.installing.clone(),
            })
    }

    /// Clone the full corpus in the background. Replies go to `sink`.
    pub async fn install(&self, sink: Arc<dyn ReplySink>) -> Result<InstallOutcome> {
        let Some(guard) = self.try_acquire() else {
            sink.send_text(format!("地图资源包{}中...", TransferKind::Install)).await;
            return Ok(InstallOutcome::AlreadyInProgress);
        };

        if self.layout.primary_entry_count().await? >= self.complete_threshold {
            sink.send_text("地图资源包已安装!".to_string()).await;
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        sink.send_text("开始安装地图资源包，请耐心等待~".to_string()).await;

        let layout = self.layout.clone();
        let transfer = self.transfer.clone();
        let catalog = self.catalog.clone();
        let repo = self.corpus_repo.clone();
        let handle = tokio::spawn(async move {
            let result = clone_into_place(&layout, transfer.as_ref(), &repo).await;
            drop(guard);

            match result {
                Ok(()) => {
                    info!("map corpus installed into {}", layout.images_dir().display());
                    sink.send_text("地图资源包安装成功！".to_string()).await;
                    let bootstrap = match catalog.bootstrap().await {
                        Ok(stats) => Some(stats),
                        Err(err) => {
                            warn!("post-install catalog refresh failed: {err}");
                            None
                        }
                    };
                    TransferReport {
                        kind: TransferKind::Install,
                        result: Ok(()),
                        bootstrap,
                    }
                }
                Err(err) => {
                    error!("map corpus install failed: {err}");
                    sink.send_text(failure_message(TransferKind::Install, &err)).await;
                    TransferReport {
                        kind: TransferKind::Install,
                        result: Err(err),
                        bootstrap: None,
                    }
                }
            }
        });

        Ok(InstallOutcome::Started(handle))
    }

    /// Pull the latest corpus in the background when the mirror reports
    /// the local version as outdated.
    pub async fn update(&self, sink: Arc<dyn ReplySink>) -> Result<InstallOutcome> {
        let Some(guard) = self.try_acquire() else {
            sink.send_text(format!("地图资源包{}中...", TransferKind::Update)).await;
            return Ok(InstallOutcome::AlreadyInProgress);
        };

        if !self.layout.primary_map_exists().await {
            sink.send_text(MapError::NotInstalled.user_message()).await;
            return Ok(InstallOutcome::NotInstalled);
        }

        let version = self.layout.corpus_version().await?;
        let probe = self
            .client
            .mirror_lookup(PROBE_LABEL_ID, MapRef::primary().id, &version)
            .await?;
        if probe.is_ok() {
            sink.send_text("地图资源包已是最新!".to_string()).await;
            return Ok(InstallOutcome::AlreadyLatest);
        }
        info!(
            "mirror reports corpus change (status {}): {}",
            probe.status, probe.message
        );

        sink.send_text("开始更新地图资源包，请耐心等待~".to_string()).await;

        let images = self.layout.images_dir();
        let transfer = self.transfer.clone();
        let handle = tokio::spawn(async move {
            let result = transfer.pull_corpus(&images).await;
            drop(guard);

            match &result {
                Ok(()) => {
                    info!("map corpus updated in {}", images.display());
                    sink.send_text("地图资源包更新成功！".to_string()).await;
                }
                Err(err) => {
                    error!("map corpus update failed: {err}");
                    sink.send_text(failure_message(TransferKind::Update, err)).await;
                }
            }
            TransferReport {
                kind: TransferKind::Update,
                result,
                bootstrap: None,
            }
        });

        Ok(InstallOutcome::Started(handle))
    }
}

/// Clone into the staging directory, then swap it in for `images`. Any
/// staging directory left behind by a failure is removed.
async fn clone_into_place(layout: &DataLayout, transfer: &dyn CorpusTransfer, repo: &str) -> Result<()> {
    let staging = layout.staging_dir();
    remove_dir_if_exists(&staging).await?;

    let result: Result<()> = async {
        transfer.clone_corpus(repo, &staging).await?;
        let images = layout.images_dir();
        remove_dir_if_exists(&images).await?;
        fs::rename(&staging, &images).await?;
        Ok(())
    }
    .await;

    if result.is_err()
        && let Err(err) = remove_dir_if_exists(&staging).await
    {
        warn!("failed to remove partial corpus {}: {err}", staging.display());
    }
    result
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn failure_message(kind: TransferKind, err: &MapError) -> String {
    let (code, message) = match err {
        MapError::Transfer { code, message } => (
            code.map_or_else(|| "none".to_string(), |code| code.to_string()),
            message.clone(),
        ),
        other => ("none".to_string(), other.to_string()),
    };
    format!(
        "地图资源包{kind}失败！\nError code: {code}\n{message}\n 请删除 ‘mysMap/images’ 目录\n并重新【#安装地图资源包】"
    )
}
