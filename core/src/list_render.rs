use crate::catalog::LabelCatalog;
use crate::error::MapError;
use crate::error::Result;
use crate::layout::DataLayout;
use crate::maps::MapRef;
use crate::render::Renderer;
use mysmap_protocol::ImageSource;
use mysmap_protocol::IndexCategory;
use mysmap_protocol::IndexItem;
use mysmap_protocol::IndexPage;
use mysmap_protocol::LabelNode;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Categories that never appear in the index.
pub const EXCLUDED_CATEGORIES: [&str; 2] = ["传送点", "地标"];

/// Categories shown on the first page; everything else goes to the second.
pub const FIRST_PAGE_CATEGORIES: [&str; 6] = [
    "传送点",
    "贵重收集物",
    "露天宝箱",
    "解谜宝箱",
    "区域特产",
    "背包/素材",
];

const MAX_NAME_CHARS: usize = 5;
const INDEX_TITLE: &str = "地图资源列表";

/// Builds and memoizes the two-page resource index.
///
/// The rendered pages are kept for the lifetime of the process; labels cached
/// after the first render only show up after a restart.
pub struct ListRenderer {
    layout: DataLayout,
    renderer: Arc<dyn Renderer>,
    installed_threshold: usize,
    rendered: OnceCell<Vec<ImageSource>>,
}

impl ListRenderer {
    pub fn new(layout: DataLayout, renderer: Arc<dyn Renderer>, installed_threshold: usize) -> Self {
        Self {
            layout,
            renderer,
            installed_threshold,
            rendered: OnceCell::new(),
        }
    }

    /// The rendered pages, rendering them on first use.
    pub async fn images(&self, catalog: &LabelCatalog) -> Result<Vec<ImageSource>> {
        let images = self
            .rendered
            .get_or_try_init(|| self.render_pages(catalog))
            .await?;
        Ok(images.clone())
    }

    async fn render_pages(&self, catalog: &LabelCatalog) -> Result<Vec<ImageSource>> {
        if self.layout.primary_entry_count().await? < self.installed_threshold {
            return Err(MapError::NotInstalled);
        }
        let tree = catalog.tree().await?.ok_or(MapError::CatalogUnavailable)?;
        let cached = cached_label_ids(&self.layout).await?;
        let pages = build_pages(&tree, &cached, &self.layout);

        let template = self.layout.index_template();
        let mut images = Vec::with_capacity(pages.len());
        for page in &pages {
            images.push(self.renderer.render(&template, page).await?);
        }
        info!(
            "rendered resource index: {} + {} categories",
            pages[0].categories.len(),
            pages[1].categories.len()
        );
        Ok(images)
    }
}

/// Ids of every label with a sidecar under any known map.
pub async fn cached_label_ids(layout: &DataLayout) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();
    for map in MapRef::ALL {
        for name in layout.map_file_names(map.id).await? {
            let name = Path::new(&name);
            if name.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = name.file_stem()
            {
                ids.insert(stem.to_string_lossy().into_owned());
            }
        }
    }
    Ok(ids)
}

/// Split the tree into the two index pages, keeping only labels in `cached`.
pub fn build_pages(tree: &[LabelNode], cached: &HashSet<String>, layout: &DataLayout) -> [IndexPage; 2] {
    let mut pages = [
        IndexPage {
            title: format!("{INDEX_TITLE}（一）"),
            categories: Vec::new(),
        },
        IndexPage {
            title: format!("{INDEX_TITLE}（二）"),
            categories: Vec::new(),
        },
    ];

    for category in tree {
        if category.children.is_empty() || EXCLUDED_CATEGORIES.contains(&category.name.as_str()) {
            continue;
        }

        let items: Vec<IndexItem> = category
            .children
            .iter()
            .filter(|label| cached.contains(&label.id))
            .map(|label| IndexItem {
                id: label.id.clone(),
                display_name: truncate_name(&label.name),
                icon_path: layout.icon(&label.id),
            })
            .collect();
        if items.is_empty() {
            continue;
        }

        let page = if FIRST_PAGE_CATEGORIES.contains(&category.name.as_str()) {
            0
        } else {
            1
        };
        pages[page].categories.push(IndexCategory {
            title: category.name.clone(),
            items,
        });
    }

    pages
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_string();
    }
    let mut short: String = name.chars().take(MAX_NAME_CHARS).collect();
    short.push('…');
    short
}
