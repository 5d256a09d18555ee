use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::market_codes::{
    currency_variant, quote_suffix, suffix_for_figi_exchange, unified_exchange,
};
use crate::{
    api::{FigiCandidate, IdentityLookup, MappingJob},
    cache::TtlCache,
    db::{read, write},
    errors::ResolveError,
    models::{
        AssetType, EnrichmentSource, InstrumentRef, RegistryEntry, Resolution, ResolveOutcome,
    },
};

pub const CRYPTO_PREFIX: &str = "CRYPTO:";

/// What the importer knows about an instrument when asking for its
/// identity.
#[derive(Clone, Debug)]
pub struct ResolveRequest<'a> {
    pub isin: &'a str,
    pub market_code: Option<&'a str>,
    pub mic: Option<&'a str>,
    pub currency: &'a str,
    pub name: Option<&'a str>,
    /// Ticker supplied by the broker itself, if any.
    pub symbol: Option<&'a str>,
    pub asset_type: AssetType,
}

impl<'a> ResolveRequest<'a> {
    pub fn from_instrument(instrument: &'a InstrumentRef) -> Option<Self> {
        Some(Self {
            isin: instrument.isin.as_deref()?,
            market_code: instrument.market_code.as_deref(),
            mic: instrument.mic.as_deref(),
            currency: &instrument.currency,
            name: Some(instrument.name.as_str()).filter(|name| !name.is_empty()),
            symbol: instrument.symbol.as_deref(),
            asset_type: instrument.asset_type,
        })
    }

    fn from_entry(entry: &'a RegistryEntry) -> Self {
        Self {
            isin: entry.isin(),
            market_code: entry.market_code().as_deref(),
            mic: entry.mic().as_deref(),
            currency: entry.currency(),
            name: entry.name().as_deref(),
            symbol: None,
            asset_type: *entry.asset_type(),
        }
    }
}

/// Operator-supplied identity for one ISIN.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ManualMapping {
    pub isin: String,
    pub symbol: String,
    pub exchange: Option<String>,
    pub mic: Option<String>,
    pub quote_suffix: Option<String>,
    pub currency: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EnrichReport {
    pub attempted: usize,
    pub enriched: Vec<String>,
    pub still_pending: Vec<String>,
}

/// Maps ISINs to tradeable tickers. The registry table is the long-lived
/// cache shared by every account; `failed_lookups` only stops the same
/// process from asking the lookup service about an ISIN it already failed.
pub struct AssetResolver {
    pool: SqlitePool,
    lookup: Option<Arc<dyn IdentityLookup>>,
    failed_lookups: Arc<TtlCache<String, ()>>,
}

impl AssetResolver {
    pub fn new(
        pool: SqlitePool,
        lookup: Option<Arc<dyn IdentityLookup>>,
        failed_lookups: Arc<TtlCache<String, ()>>,
    ) -> Self {
        Self {
            pool,
            lookup,
            failed_lookups,
        }
    }

    pub fn failed_lookups(&self) -> &TtlCache<String, ()> {
        &self.failed_lookups
    }

    /// Registry hit, broker/crypto heuristics, then the external lookup
    /// chain. Lookup failures never surface as errors; the ISIN is stored
    /// unenriched instead.
    pub async fn resolve(&self, request: &ResolveRequest<'_>) -> Result<ResolveOutcome> {
        let isin = request.isin.trim();
        let mut conn = self.pool.acquire().await?;

        let cached = read::get_registry_entry(&mut conn, isin).await?;
        if let Some(resolution) = cached.as_ref().and_then(RegistryEntry::resolution) {
            write::increment_registry_usage(&mut conn, isin).await?;
            debug!(isin, symbol = %resolution.symbol, "Registry hit");
            return Ok(ResolveOutcome::Resolved(resolution));
        }

        if let Some(resolution) = heuristic_resolution(request) {
            let entry = registry_entry(request, Some(&resolution));
            write::upsert_registry_entry(&mut conn, &entry).await?;
            debug!(isin, symbol = %resolution.symbol, "Resolved from broker data");
            return Ok(ResolveOutcome::Resolved(resolution));
        }
        drop(conn);

        let key = isin.to_string();
        let resolution = match &self.lookup {
            Some(_) if self.failed_lookups.contains(&key) => {
                debug!(isin, "Skipping lookup, failed recently");
                None
            }
            Some(lookup) => self.lookup_chain(lookup.as_ref(), request).await,
            None => None,
        };

        let mut conn = self.pool.acquire().await?;
        match resolution {
            Some(resolution) => {
                write::upsert_registry_entry(&mut conn, &registry_entry(request, Some(&resolution)))
                    .await?;
                info!(isin, symbol = %resolution.symbol, "Resolved via lookup");
                Ok(ResolveOutcome::Resolved(resolution))
            }
            None => {
                write::insert_unenriched_registry(&mut conn, &registry_entry(request, None)).await?;
                if self.lookup.is_some() {
                    self.failed_lookups.insert(key, ());
                }
                warn!(isin, "Unresolved; stored for manual enrichment");
                Ok(ResolveOutcome::Unresolved)
            }
        }
    }

    /// Registry rows still without a symbol.
    pub async fn pending(&self) -> Result<Vec<RegistryEntry>> {
        let mut conn = self.pool.acquire().await?;
        read::list_unenriched_registry(&mut conn).await
    }

    /// Retries the lookup chain for every unenriched registry row, ignoring
    /// the in-process failure cache.
    pub async fn enrich_pending(&self) -> Result<EnrichReport> {
        let pending = self.pending().await?;
        let mut report = EnrichReport {
            attempted: pending.len(),
            ..EnrichReport::default()
        };

        let Some(lookup) = &self.lookup else {
            warn!("Enrichment is disabled; nothing retried");
            report.still_pending = pending.iter().map(|entry| entry.isin().clone()).collect();
            return Ok(report);
        };

        for entry in &pending {
            self.failed_lookups.remove(entry.isin());
            let request = ResolveRequest::from_entry(entry);

            match self.lookup_chain(lookup.as_ref(), &request).await {
                Some(resolution) => {
                    let mut tx = self.pool.begin().await?;
                    write::upsert_registry_entry(&mut tx, &registry_entry(&request, Some(&resolution)))
                        .await?;
                    write::sync_assets_with_resolution(&mut tx, entry.isin(), &resolution).await?;
                    tx.commit().await?;
                    report.enriched.push(entry.isin().clone());
                }
                None => {
                    self.failed_lookups.insert(entry.isin().clone(), ());
                    report.still_pending.push(entry.isin().clone());
                }
            }
        }

        info!(
            attempted = report.attempted,
            enriched = report.enriched.len(),
            "Enrichment pass finished"
        );
        Ok(report)
    }

    /// Overwrites the registry row for `mapping.isin` and every catalog
    /// asset carrying that ISIN.
    pub async fn set_manual(&self, mapping: &ManualMapping) -> Result<RegistryEntry> {
        let isin = mapping.isin.trim();
        let mut tx = self.pool.begin().await?;
        let existing = read::get_registry_entry(&mut tx, isin).await?;

        let currency = mapping
            .currency
            .clone()
            .or_else(|| existing.as_ref().map(|entry| entry.currency().clone()))
            .with_context(|| format!("No currency known for {}; pass one explicitly", isin))?;
        let market_code = existing
            .as_ref()
            .and_then(|entry| entry.market_code().clone());
        let quote_suffix = mapping.quote_suffix.clone().or_else(|| {
            quote_suffix(
                mapping.mic.as_deref(),
                mapping.exchange.as_deref().or(market_code.as_deref()),
                None,
            )
            .map(str::to_string)
        });

        let entry = RegistryEntry::new(
            isin.to_string(),
            Some(mapping.symbol.trim().to_string()),
            mapping.exchange.clone(),
            mapping.mic.clone(),
            quote_suffix,
            existing.as_ref().and_then(|entry| entry.name().clone()),
            existing
                .as_ref()
                .map(|entry| *entry.asset_type())
                .unwrap_or(AssetType::Stock),
            currency,
            market_code,
            Some(EnrichmentSource::Manual),
            existing.as_ref().map(|entry| *entry.usage_count()).unwrap_or(1),
            Some(Utc::now().naive_utc()),
        );

        write::upsert_registry_entry(&mut tx, &entry).await?;
        if let Some(resolution) = entry.resolution() {
            let synced = write::sync_assets_with_resolution(&mut tx, isin, &resolution).await?;
            debug!(isin, synced, "Catalog assets updated from manual mapping");
        }
        tx.commit().await?;

        self.failed_lookups.remove(&isin.to_string());
        info!(isin, symbol = %mapping.symbol, "Manual mapping stored");
        Ok(entry)
    }

    async fn lookup_chain(
        &self,
        lookup: &dyn IdentityLookup,
        request: &ResolveRequest<'_>,
    ) -> Option<Resolution> {
        let isin = request.isin.trim();
        let mut jobs = vec![
            MappingJob::isin(isin, Some(request.currency)),
            MappingJob::isin(isin, None),
        ];
        if let Some(variant) = currency_variant(request.currency) {
            jobs.push(MappingJob::isin(isin, Some(variant)));
        }

        for job in &jobs {
            match lookup.lookup(job).await {
                Ok(candidates) => {
                    if let Some(candidate) = select_candidate(&candidates, request) {
                        return Some(resolution_from_candidate(candidate, request));
                    }
                    debug!(isin, currency = ?job.currency(), "No candidates");
                }
                Err(error @ (ResolveError::RateLimited(_) | ResolveError::Transport(_))) => {
                    warn!(isin, "Lookup unavailable: {}", error);
                    return None;
                }
                Err(error) => {
                    warn!(isin, currency = ?job.currency(), "Lookup failed: {}", error);
                }
            }
        }

        None
    }
}

/// Prefers a candidate listed on the broker's venue; otherwise takes the
/// first one.
pub fn select_candidate<'c>(
    candidates: &'c [FigiCandidate],
    request: &ResolveRequest<'_>,
) -> Option<&'c FigiCandidate> {
    let usable: Vec<&FigiCandidate> = candidates.iter().filter(|c| c.has_ticker()).collect();
    let first = *usable.first()?;

    let wanted_codes: Vec<String> = [
        request.market_code,
        request.market_code.and_then(unified_exchange),
        request.mic,
    ]
    .into_iter()
    .flatten()
    .map(|code| code.trim().to_uppercase())
    .collect();
    if wanted_codes.is_empty() {
        return Some(first);
    }
    let wanted_suffix = quote_suffix(request.mic, request.market_code, None);

    let exact = usable.iter().copied().find(|candidate| {
        let code_match = [candidate.exch_code(), candidate.mic_code()]
            .into_iter()
            .flatten()
            .any(|code| wanted_codes.contains(&code.trim().to_uppercase()));
        let suffix_match = wanted_suffix.is_some()
            && candidate
                .exch_code()
                .as_deref()
                .and_then(suffix_for_figi_exchange)
                == wanted_suffix;
        code_match || suffix_match
    });

    match exact {
        Some(candidate) => Some(candidate),
        None => {
            warn!(
                isin = request.isin,
                market = ?request.market_code,
                mic = ?request.mic,
                ticker = ?first.ticker(),
                "No listing on the broker's venue, using first candidate"
            );
            Some(first)
        }
    }
}

fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().replace(['/', ' '], "-")
}

fn resolution_from_candidate(candidate: &FigiCandidate, request: &ResolveRequest<'_>) -> Resolution {
    let mic = candidate
        .mic_code()
        .clone()
        .filter(|mic| !mic.trim().is_empty())
        .or_else(|| request.mic.map(str::to_string));
    let suffix = quote_suffix(candidate.mic_code().as_deref(), None, candidate.exch_code().as_deref())
        .or_else(|| quote_suffix(request.mic, request.market_code, None));
    let asset_type = match request.asset_type {
        AssetType::Crypto | AssetType::Commodity => request.asset_type,
        _ => candidate
            .security_type()
            .as_deref()
            .map(AssetType::from_security_type)
            .unwrap_or(request.asset_type),
    };

    Resolution {
        symbol: normalize_ticker(candidate.ticker().as_deref().unwrap_or_default()),
        exchange: request
            .market_code
            .and_then(unified_exchange)
            .map(str::to_string)
            .or_else(|| candidate.exch_code().clone()),
        mic,
        quote_suffix: suffix.map(str::to_string),
        name: candidate
            .name()
            .clone()
            .or_else(|| request.name.map(str::to_string)),
        asset_type,
        source: EnrichmentSource::ExternalLookup,
    }
}

/// Identity that needs no lookup: crypto pseudo-ISINs and tickers the
/// broker already provides.
fn heuristic_resolution(request: &ResolveRequest<'_>) -> Option<Resolution> {
    if let Some(symbol) = request.isin.strip_prefix(CRYPTO_PREFIX) {
        let symbol = request.symbol.unwrap_or(symbol).trim().to_uppercase();
        return Some(Resolution {
            quote_suffix: Some(format!("-{}", request.currency.trim().to_uppercase())),
            symbol,
            exchange: None,
            mic: None,
            name: request.name.map(str::to_string),
            asset_type: AssetType::Crypto,
            source: EnrichmentSource::Heuristic,
        });
    }

    let symbol = request.symbol.map(str::trim).filter(|s| !s.is_empty())?;
    Some(Resolution {
        symbol: normalize_ticker(symbol),
        exchange: request
            .market_code
            .map(|code| unified_exchange(code).unwrap_or(code).to_string()),
        mic: request.mic.map(str::to_string),
        quote_suffix: quote_suffix(request.mic, request.market_code, None).map(str::to_string),
        name: request.name.map(str::to_string),
        asset_type: request.asset_type,
        source: EnrichmentSource::Heuristic,
    })
}

fn registry_entry(request: &ResolveRequest<'_>, resolution: Option<&Resolution>) -> RegistryEntry {
    RegistryEntry::new(
        request.isin.trim().to_string(),
        resolution.map(|r| r.symbol.clone()),
        resolution.and_then(|r| r.exchange.clone()),
        resolution
            .and_then(|r| r.mic.clone())
            .or_else(|| request.mic.map(str::to_string)),
        resolution.and_then(|r| r.quote_suffix.clone()),
        resolution
            .and_then(|r| r.name.clone())
            .or_else(|| request.name.map(str::to_string)),
        resolution.map(|r| r.asset_type).unwrap_or(request.asset_type),
        request.currency.to_string(),
        request.market_code.map(str::to_string),
        resolution.map(|r| r.source),
        1,
        resolution.map(|_| Utc::now().naive_utc()),
    )
}
