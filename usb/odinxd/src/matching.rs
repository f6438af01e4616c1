use lazy_static::lazy_static;
use log::error;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct MatchEntry {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
}

#[derive(Debug, Default, Deserialize)]
struct MatchTable {
    #[serde(rename = "match", default)]
    entries: Vec<MatchEntry>,
}

lazy_static! {
    static ref MATCH_TABLE: MatchTable = {
        const TOML: &str = include_str!("../config/match.toml");

        toml::from_str::<MatchTable>(TOML).unwrap_or_else(|err| {
            error!("failed to parse embedded match table: {}", err);
            MatchTable::default()
        })
    };
}

/// Every device this driver binds to.
pub fn entries() -> &'static [MatchEntry] {
    &MATCH_TABLE.entries
}

pub fn lookup(vendor: u16, product: u16) -> Option<&'static MatchEntry> {
    entries()
        .iter()
        .find(|entry| entry.vendor == vendor && entry.product == product)
}

pub fn matches(vendor: u16, product: u16) -> bool {
    lookup(vendor, product).is_some()
}
