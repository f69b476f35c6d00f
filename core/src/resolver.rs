use crate::alias::AliasStore;
use crate::alias::ResolvedLabel;
use crate::error::Result;
use crate::layout::DataLayout;
use crate::maps::MapRef;
use crate::maps::compile;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::fs;

/// Trigger words, map names, question particles and punctuation removed from
/// a query before alias lookup.
static FILLER: Lazy<Regex> = Lazy::new(|| {
    compile(r"＃|#|更新|提瓦特|渊下宫|层岩巨渊|地下矿区|旧(日之)?海|在|哪|里|有|位置|点位|？|\?")
});

/// Label part of a resolution. `id` is `None` when nothing matched, in which
/// case `name` is the residual text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelQuery {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub map: MapRef,
    pub label: LabelQuery,
    pub residual: String,
}

impl Resolution {
    pub fn resolved(&self) -> Option<ResolvedLabel> {
        self.label.id.as_ref().map(|id| ResolvedLabel {
            id: id.clone(),
            name: self.label.name.clone(),
        })
    }
}

/// A label plus the two-character key of one of its points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointQuery {
    pub map: MapRef,
    pub label: ResolvedLabel,
    pub key: String,
}

pub struct Resolver {
    layout: DataLayout,
    installed_threshold: usize,
}

impl Resolver {
    pub fn new(layout: DataLayout, installed_threshold: usize) -> Self {
        Self {
            layout,
            installed_threshold,
        }
    }

    /// Resolve against the alias file as it is on disk right now.
    pub async fn resolve(&self, text: &str) -> Resolution {
        let aliases = AliasStore::load_or_default(&self.layout.alias_file()).await;
        resolve_with(&aliases, text)
    }

    /// Resolve `<name><key>` queries. `None` means the text is not a point
    /// query this layer can answer and should be left to other handlers.
    pub async fn resolve_point(&self, text: &str) -> Result<Option<PointQuery>> {
        let Some((map, remainder, key)) = split_point_key(text) else {
            return Ok(None);
        };
        if remainder.is_empty() || is_numeric(&remainder) {
            return Ok(None);
        }

        let aliases = AliasStore::load_or_default(&self.layout.alias_file()).await;
        let Some(label) = aliases.resolve(&remainder) else {
            return Ok(None);
        };

        if self.layout.primary_entry_count().await? < self.installed_threshold {
            return Ok(None);
        }
        if !fs::try_exists(self.layout.sidecar(map.id, &label.id)).await? {
            return Ok(None);
        }

        Ok(Some(PointQuery { map, label, key }))
    }
}

/// Strip filler from `text`, detect the map from the original text, and look
/// the remainder up in `aliases`.
pub fn resolve_with(aliases: &AliasStore, text: &str) -> Resolution {
    let residual = strip_filler(text);
    let map = MapRef::detect(text);
    let label = match aliases.resolve(&residual) {
        Some(found) => LabelQuery {
            id: Some(found.id),
            name: found.name,
        },
        None => LabelQuery {
            id: None,
            name: residual.clone(),
        },
    };
    Resolution {
        map,
        label,
        residual,
    }
}

pub fn strip_filler(text: &str) -> String {
    FILLER.replace_all(text, "").into_owned()
}

/// Splits filler-stripped `text` into `(map, remainder, key)` when it ends in
/// two ASCII letters or digits.
pub fn split_point_key(text: &str) -> Option<(MapRef, String, String)> {
    let stripped = strip_filler(text);
    let mut tail = stripped.char_indices().rev().take(2);
    let (_, last) = tail.next()?;
    let (start, second) = tail.next()?;
    if !last.is_ascii_alphanumeric() || !second.is_ascii_alphanumeric() {
        return None;
    }
    let key = stripped[start..].to_string();
    let remainder = stripped[..start].trim().to_string();
    Some((MapRef::detect(text), remainder, key))
}

fn is_numeric(text: &str) -> bool {
    text.chars().any(|ch| ch.is_ascii_digit())
        && text.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
}
