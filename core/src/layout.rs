//! On-disk layout of the data directory.
//!
//! ```text
//! <root>/data/label.json              cached label tree
//! <root>/data/资源别称.yaml            alias mapping (human-editable)
//! <root>/html/label.html              resource index template
//! <root>/html/icon/<label>.png        label icons
//! <root>/images/version               opaque corpus version
//! <root>/images/<map>/<label>.jpg     rendered map image
//! <root>/images/<map>/<label>.json    sidecar for the image above
//! <root>/render/                      renderer output
//! ```

use crate::error::Result;
use crate::maps::MapRef;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tokio::fs;

const ALIAS_FILENAME: &str = "资源别称.yaml";
const LABEL_TREE_FILENAME: &str = "label.json";
const VERSION_FILENAME: &str = "version";
const STAGING_DIRNAME: &str = "images.partial";

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Clone target used by `install` before the corpus is moved into place.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIRNAME)
    }

    pub fn map_dir(&self, map_id: u32) -> PathBuf {
        self.images_dir().join(map_id.to_string())
    }

    pub fn version_file(&self) -> PathBuf {
        self.images_dir().join(VERSION_FILENAME)
    }

    pub fn sidecar(&self, map_id: u32, label_id: &str) -> PathBuf {
        self.map_dir(map_id).join(format!("{label_id}.json"))
    }

    pub fn image(&self, map_id: u32, label_id: &str) -> PathBuf {
        self.map_dir(map_id).join(format!("{label_id}.jpg"))
    }

    pub fn label_tree_file(&self) -> PathBuf {
        self.root.join("data").join(LABEL_TREE_FILENAME)
    }

    pub fn alias_file(&self) -> PathBuf {
        self.root.join("data").join(ALIAS_FILENAME)
    }

    pub fn icon(&self, label_id: &str) -> PathBuf {
        self.root.join("html").join("icon").join(format!("{label_id}.png"))
    }

    pub fn index_template(&self) -> PathBuf {
        self.root.join("html").join("label.html")
    }

    pub fn render_dir(&self) -> PathBuf {
        self.root.join("render")
    }

    /// Number of entries in the primary map's corpus directory, `0` when it
    /// does not exist.
    pub async fn primary_entry_count(&self) -> Result<usize> {
        count_entries(&self.map_dir(MapRef::primary().id)).await
    }

    pub async fn primary_map_exists(&self) -> bool {
        fs::metadata(self.map_dir(MapRef::primary().id))
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Opaque corpus version for the mirror's cache-busting parameter.
    /// A missing file reads as the empty string.
    pub async fn corpus_version(&self) -> Result<String> {
        match fs::read_to_string(self.version_file()).await {
            Ok(version) => Ok(version.trim().to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// File names in a map's corpus directory, empty when it does not exist.
    pub async fn map_file_names(&self, map_id: u32) -> Result<Vec<OsString>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(self.map_dir(map_id)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(names),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name());
        }
        Ok(names)
    }
}

async fn count_entries(dir: &Path) -> Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };
    let mut count = 0;
    while entries.next_entry().await?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Writes `contents` next to `path` and renames it over `path`, so readers
/// never observe a half-written file.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_sibling(path);
    fs::write(&tmp, contents).await?;
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
