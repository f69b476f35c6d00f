use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::fmt;

/// One of the fixed game maps the mirror renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapRef {
    pub id: u32,
    pub name: &'static str,
}

impl MapRef {
    pub const TEYVAT: MapRef = MapRef { id: 2, name: "提瓦特" };
    pub const ENKANOMIYA: MapRef = MapRef { id: 7, name: "渊下宫" };
    pub const CHASM: MapRef = MapRef { id: 9, name: "层岩巨渊" };
    pub const SEA_OF_BYGONE_ERAS: MapRef = MapRef { id: 34, name: "旧日之海" };

    /// Every map whose corpus directory may hold cached labels.
    pub const ALL: [MapRef; 4] = [
        MapRef::TEYVAT,
        MapRef::ENKANOMIYA,
        MapRef::CHASM,
        MapRef::SEA_OF_BYGONE_ERAS,
    ];

    /// The map used when a query names none.
    pub const fn primary() -> MapRef {
        MapRef::TEYVAT
    }

    /// Picks the map named in `text`. Secondary maps are checked before the
    /// default and the first hit wins.
    pub fn detect(text: &str) -> MapRef {
        if text.contains("渊下") {
            MapRef::ENKANOMIYA
        } else if CHASM_PATTERN.is_match(text) {
            MapRef::CHASM
        } else if SEA_PATTERN.is_match(text) {
            MapRef::SEA_OF_BYGONE_ERAS
        } else {
            MapRef::primary()
        }
    }
}

impl fmt::Display for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

static CHASM_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"层岩|矿区"));
static SEA_PATTERN: Lazy<Regex> = Lazy::new(|| compile(r"旧(日之)?海"));

#[allow(clippy::expect_used)]
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Valid regex")
}
