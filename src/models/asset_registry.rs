use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use super::AssetType;

/// How a registry row got its symbol.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display, EnumString, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    ExternalLookup,
    Manual,
    Heuristic,
}

/// One resolution per ISIN, shared by every account.
#[derive(Clone, Debug, Eq, PartialEq, Getters, Serialize, new)]
pub struct RegistryEntry {
    isin: String,
    symbol: Option<String>,
    exchange: Option<String>,
    mic: Option<String>,
    quote_suffix: Option<String>,
    name: Option<String>,
    asset_type: AssetType,
    currency: String,
    market_code: Option<String>,
    source: Option<EnrichmentSource>,
    usage_count: i64,
    enriched_at: Option<NaiveDateTime>,
}

impl RegistryEntry {
    pub fn is_enriched(&self) -> bool {
        self.symbol.is_some()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.symbol.as_ref().map(|symbol| Resolution {
            symbol: symbol.clone(),
            exchange: self.exchange.clone(),
            mic: self.mic.clone(),
            quote_suffix: self.quote_suffix.clone(),
            name: self.name.clone(),
            asset_type: self.asset_type,
            source: self.source.unwrap_or(EnrichmentSource::ExternalLookup),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Resolution {
    pub symbol: String,
    pub exchange: Option<String>,
    pub mic: Option<String>,
    pub quote_suffix: Option<String>,
    pub name: Option<String>,
    pub asset_type: AssetType,
    pub source: EnrichmentSource,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolveOutcome {
    Resolved(Resolution),
    Unresolved,
}

impl ResolveOutcome {
    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            ResolveOutcome::Resolved(resolution) => Some(resolution),
            ResolveOutcome::Unresolved => None,
        }
    }
}
