use crate::alias::AliasStore;
use crate::client::UpstreamClient;
use crate::error::MapError;
use crate::error::Result;
use crate::layout::DataLayout;
use crate::layout::write_atomic;
use mysmap_protocol::LabelNode;
use mysmap_protocol::LabelTreeData;
use mysmap_protocol::LabelTreeResponse;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Shared, immutable snapshot of the category → label tree.
pub type LabelTree = Arc<Vec<LabelNode>>;

/// Statistics about one bootstrap pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapStats {
    pub categories: usize,
    pub labels: usize,
    pub aliases_added: usize,
    pub icons_downloaded: usize,
    pub icons_failed: usize,
}

/// The label tree fetched from the wiki, plus the pass that keeps the alias
/// file and icon directory in step with it.
pub struct LabelCatalog {
    layout: DataLayout,
    client: UpstreamClient,
    tree: RwLock<Option<LabelTree>>,
}

impl LabelCatalog {
    pub fn new(layout: DataLayout, client: UpstreamClient) -> Self {
        Self {
            layout,
            client,
            tree: RwLock::new(None),
        }
    }

    /// Current tree, loading the on-disk copy on first use.
    pub async fn tree(&self) -> Result<Option<LabelTree>> {
        if let Some(tree) = self.tree.read().await.as_ref() {
            return Ok(Some(tree.clone()));
        }

        let path = self.layout.label_tree_file();
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let response: LabelTreeResponse = serde_json::from_slice(&content)?;
        let Some(tree) = response.into_tree() else {
            return Ok(None);
        };
        let tree = Arc::new(tree);
        *self.tree.write().await = Some(tree.clone());
        Ok(Some(tree))
    }

    /// Fetch the tree, replace the cached copy, seed aliases and prefetch
    /// icons. Nothing is written when upstream fails or sends no tree.
    pub async fn bootstrap(&self) -> Result<BootstrapStats> {
        info!("refreshing label catalog");
        let response = self.client.label_tree().await?;
        let message = response.message.clone();
        let Some(tree) = response.into_tree() else {
            warn!("label tree response carried no tree: {message}");
            return Err(MapError::Remote(format!("label tree unavailable: {message}")));
        };

        let persisted = LabelTreeResponse {
            retcode: 0,
            message,
            data: Some(LabelTreeData {
                tree: Some(tree.clone()),
            }),
        };
        write_atomic(
            &self.layout.label_tree_file(),
            &serde_json::to_vec_pretty(&persisted)?,
        )
        .await?;
        let tree = Arc::new(tree);
        *self.tree.write().await = Some(tree.clone());

        let alias_path = self.layout.alias_file();
        let mut aliases = AliasStore::load(&alias_path).await?;
        let mut stats = BootstrapStats {
            categories: tree.len(),
            ..Default::default()
        };

        for label in tree.iter().flat_map(|category| category.children.iter()) {
            stats.labels += 1;
            if aliases.ensure(&label.id, &label.name) {
                stats.aliases_added += 1;
            }
            match self.prefetch_icon(label).await {
                Ok(true) => stats.icons_downloaded += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!("icon download for label {} failed: {err}", label.id);
                    stats.icons_failed += 1;
                }
            }
        }

        aliases.save(&alias_path).await?;

        info!(
            "label catalog refreshed: {} labels, {} new aliases, {} icons fetched, {} icon failures",
            stats.labels, stats.aliases_added, stats.icons_downloaded, stats.icons_failed
        );
        Ok(stats)
    }

    /// Returns whether an icon was downloaded.
    async fn prefetch_icon(&self, label: &LabelNode) -> Result<bool> {
        let path = self.layout.icon(&label.id);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        if label.icon.is_empty() {
            debug!("label {} has no icon url", label.id);
            return Ok(false);
        }
        self.client.download(&label.icon, &path).await?;
        Ok(true)
    }
}
