//! Payloads returned by the upstream wiki API and the image mirror.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::collections::BTreeMap;

/// Mirror status for a successful lookup.
pub const MIRROR_STATUS_OK: i64 = 0;

/// Mirror status signalling that the local corpus version is no longer
/// compatible with the mirror.
pub const MIRROR_STATUS_VERSION_MISMATCH: i64 = -4;

/// One node of the label tree. Top-level nodes are categories, their
/// children are labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelNode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub children: Vec<LabelNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelTreeResponse {
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<LabelTreeData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelTreeData {
    #[serde(default)]
    pub tree: Option<Vec<LabelNode>>,
}

impl LabelTreeResponse {
    /// Consumes the response, yielding the tree when upstream sent one.
    pub fn into_tree(self) -> Option<Vec<LabelNode>> {
        self.data.and_then(|data| data.tree)
    }
}

/// Response of the mirror's map-image endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorResponse {
    pub status: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<MirrorData>,
}

impl MirrorResponse {
    pub fn is_ok(&self) -> bool {
        self.status == MIRROR_STATUS_OK
    }

    pub fn is_version_mismatch(&self) -> bool {
        self.status == MIRROR_STATUS_VERSION_MISMATCH
    }
}

/// Per-label payload. This is also what gets persisted as the sidecar next
/// to a cached image, so fields the mirror adds later survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorData {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub label_total: u64,
    /// Image path relative to the mirror base URL.
    #[serde(default)]
    pub image: String,
    /// Point key (two characters) to upstream point id.
    #[serde(default)]
    pub info: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MirrorData {
    /// Upstream point id for a two-character key, whether the mirror sent
    /// it as a number or a string.
    pub fn point_id(&self, key: &str) -> Option<String> {
        match self.info.get(key)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointInfoResponse {
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub data: Option<PointInfoData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointInfoData {
    #[serde(default)]
    pub info: Option<PointInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointInfo {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
}

impl PointInfoResponse {
    pub fn into_info(self) -> Option<PointInfo> {
        self.data.and_then(|data| data.info)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
