use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

/// Data handed to the renderer for one page of the resource index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPage {
    pub title: String,
    pub categories: Vec<IndexCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCategory {
    pub title: String,
    pub items: Vec<IndexItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexItem {
    pub id: String,
    pub display_name: String,
    pub icon_path: PathBuf,
}

impl IndexPage {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
