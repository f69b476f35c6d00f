use crate::error::Result;
use crate::layout::write_atomic;
use indexmap::IndexMap;
use serde_yaml::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// A label id together with the name it should be shown under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLabel {
    pub id: String,
    pub name: String,
}

/// Label id to display names, first name preferred.
///
/// Insertion order is significant: when several entries list the same alias,
/// resolution returns the one registered first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasStore {
    entries: IndexMap<String, Vec<String>>,
}

impl AliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the alias file. A missing file is an empty store.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        Self::parse(&content)
    }

    /// Like [`AliasStore::load`], but a broken file degrades to an empty store.
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(store) => store,
            Err(err) => {
                warn!("failed to read alias file {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// Parses the YAML mapping. Keys and names may be written as plain
    /// numbers by hand, so every scalar is accepted as text.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: Option<IndexMap<Value, Value>> = serde_yaml::from_str(content)?;
        let mut entries = IndexMap::new();
        for (key, names) in raw.unwrap_or_default() {
            let Some(id) = scalar_text(&key) else {
                warn!("skipping alias entry with non-scalar key: {key:?}");
                continue;
            };
            let names = match names {
                Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
                other => scalar_text(&other).into_iter().collect(),
            };
            entries.insert(id, names);
        }
        Ok(Self { entries })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(&self.entries)?;
        write_atomic(path, content.as_bytes()).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self, id: &str) -> Option<&[String]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    /// Appends an entry at the end, replacing the names of an existing id
    /// in place.
    pub fn insert(&mut self, id: impl Into<String>, names: Vec<String>) {
        self.entries.insert(id.into(), names);
    }

    /// Seeds `id` with `name` unless an entry already exists. Returns whether
    /// an entry was added.
    pub fn ensure(&mut self, id: &str, name: &str) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_string(), vec![name.to_string()]);
        true
    }

    /// Exact id match first, then the earliest entry whose names contain
    /// `query`.
    pub fn resolve(&self, query: &str) -> Option<ResolvedLabel> {
        if let Some(names) = self.entries.get(query) {
            return Some(ResolvedLabel {
                id: query.to_string(),
                name: names.first().cloned().unwrap_or_else(|| query.to_string()),
            });
        }

        self.entries
            .iter()
            .find(|(_, names)| names.iter().any(|name| name == query))
            .map(|(id, names)| ResolvedLabel {
                id: id.clone(),
                name: names.first().cloned().unwrap_or_else(|| query.to_string()),
            })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
