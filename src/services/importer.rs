use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::asset_resolver::{AssetResolver, ResolveRequest};
use crate::{
    db::{read, write},
    errors::ImportError,
    models::{
        Asset, CanonicalRecord, FormatTag, InstrumentRef, ResolveOutcome, Transaction,
        TransactionType,
    },
    parsers::ParsedStatement,
};

#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    pub account_id: i64,
    pub format: Option<FormatTag>,
    pub created: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
    pub unresolved: Vec<String>,
    pub warnings: Vec<String>,
}

/// Persists one parsed statement into one account. Assets are resolved
/// first, outside any write transaction, so a slow lookup never holds the
/// database lock.
pub struct Importer {
    pool: SqlitePool,
    resolver: Arc<AssetResolver>,
}

impl Importer {
    pub fn new(pool: SqlitePool, resolver: Arc<AssetResolver>) -> Self {
        Self { pool, resolver }
    }

    pub async fn import(
        &self,
        account_id: i64,
        statement: &ParsedStatement,
    ) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport {
            account_id,
            format: Some(statement.format),
            warnings: statement.warnings.iter().map(|w| w.to_string()).collect(),
            ..ImportReport::default()
        };

        {
            let mut conn = self.pool.acquire().await?;
            if read::get_account(&mut conn, account_id).await?.is_none() {
                return Err(ImportError::UnknownAccount(account_id));
            }
        }

        let assets = self.catalog_assets(&statement.records, &mut report).await?;

        let mut conn = self.pool.acquire().await?;
        let stored = read::fingerprint_counts(&mut conn, account_id).await?;
        let mut seen: HashMap<String, usize> = HashMap::new();
        let source = statement.format.source_tag();

        let mut tx = conn.begin().await?;
        for record in &statement.records {
            let asset_id = match &record.instrument {
                Some(instrument) => match assets.get(&instrument.key()) {
                    Some(asset_id) => Some(*asset_id),
                    None => {
                        report.failed += 1;
                        continue;
                    }
                },
                None => None,
            };

            let fingerprint = fingerprint(
                account_id,
                asset_id,
                record.transaction_type,
                &record.date,
                record.quantity.unwrap_or(record.amount),
                record.price,
            );

            let occurrence = seen.entry(fingerprint.clone()).or_insert(0);
            *occurrence += 1;
            if *occurrence <= stored.get(&fingerprint).copied().unwrap_or(0) {
                report.skipped_duplicates += 1;
                continue;
            }

            let transaction = to_transaction(account_id, asset_id, record, source, fingerprint);
            match insert_isolated(&mut tx, &transaction).await {
                Ok(id) => {
                    debug!(id, line = record.line, "Transaction stored");
                    report.created += 1;
                }
                Err(e) => {
                    warn!(line = record.line, "Failed to store transaction: {:#}", e);
                    report.failed += 1;
                    report
                        .warnings
                        .push(format!("line {}: not stored: {}", record.line, e));
                }
            }
        }
        tx.commit().await?;

        info!(
            account_id,
            created = report.created,
            skipped = report.skipped_duplicates,
            failed = report.failed,
            "Import finished"
        );
        Ok(report)
    }

    /// Resolves and catalogs every distinct instrument of the statement.
    /// Instruments that cannot be cataloged are left out of the map.
    async fn catalog_assets(
        &self,
        records: &[CanonicalRecord],
        report: &mut ImportReport,
    ) -> Result<HashMap<String, i64>, ImportError> {
        let mut assets: HashMap<String, i64> = HashMap::new();

        for instrument in records.iter().filter_map(|record| record.instrument.as_ref()) {
            let key = instrument.key();
            if assets.contains_key(&key) {
                continue;
            }
            if instrument.isin.is_none() && instrument.symbol.is_none() {
                if !report.warnings.iter().any(|w| w.contains(&key)) {
                    report
                        .warnings
                        .push(format!("{}: no ISIN or symbol, rows not imported", key));
                }
                continue;
            }

            let asset_id = self.ensure_asset(instrument, report).await?;
            assets.insert(key, asset_id);
        }

        Ok(assets)
    }

    async fn ensure_asset(
        &self,
        instrument: &InstrumentRef,
        report: &mut ImportReport,
    ) -> Result<i64, ImportError> {
        let resolution = match ResolveRequest::from_instrument(instrument) {
            Some(request) => match self.resolver.resolve(&request).await? {
                ResolveOutcome::Resolved(resolution) => Some(resolution),
                ResolveOutcome::Unresolved => {
                    report.unresolved.push(request.isin.to_string());
                    None
                }
            },
            None => None,
        };

        let mut conn = self.pool.acquire().await?;
        let existing = match (&instrument.isin, &instrument.symbol) {
            (Some(isin), _) => read::find_asset_by_isin(&mut conn, isin).await?,
            (None, Some(symbol)) => {
                read::find_asset_by_symbol(&mut conn, symbol, &instrument.currency).await?
            }
            (None, None) => None,
        };

        if let Some(asset) = existing {
            if let Some(resolution) = &resolution {
                write::fill_asset_identity(&mut conn, *asset.id(), resolution).await?;
            }
            return Ok(*asset.id());
        }

        let symbol = resolution
            .as_ref()
            .map(|resolution| resolution.symbol.clone())
            .or_else(|| match instrument.isin {
                None => instrument.symbol.clone(),
                Some(_) => None,
            });
        let name = Some(instrument.name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| resolution.as_ref().and_then(|r| r.name.clone()))
            .unwrap_or_else(|| instrument.key());

        let asset = Asset::new(
            0,
            instrument.isin.clone(),
            symbol,
            name,
            resolution
                .as_ref()
                .map(|resolution| resolution.asset_type)
                .unwrap_or(instrument.asset_type),
            instrument.currency.clone(),
            resolution
                .as_ref()
                .and_then(|resolution| resolution.exchange.clone()),
            resolution
                .as_ref()
                .and_then(|resolution| resolution.mic.clone())
                .or_else(|| instrument.mic.clone()),
            resolution
                .as_ref()
                .and_then(|resolution| resolution.quote_suffix.clone()),
            None,
            None,
        );
        let asset_id = write::insert_asset(&mut conn, &asset).await?;
        debug!(asset_id, key = %instrument.key(), "Asset cataloged");

        Ok(asset_id)
    }
}

/// Stable identity of a ledger row within one account. Decimals are
/// normalized so `10`, `10.0` and `10.00` hash alike.
pub fn fingerprint(
    account_id: i64,
    asset_id: Option<i64>,
    transaction_type: TransactionType,
    date: &NaiveDateTime,
    quantity: Decimal,
    price: Option<Decimal>,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(account_id.to_string().as_bytes());
    hasher.update(b"|");
    if let Some(asset_id) = asset_id {
        hasher.update(asset_id.to_string().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(transaction_type.to_str().as_bytes());
    hasher.update(b"|");
    hasher.update(date.format("%Y-%m-%dT%H:%M:%S").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(quantity.normalize().to_string().as_bytes());
    hasher.update(b"|");
    if let Some(price) = price {
        hasher.update(price.normalize().to_string().as_bytes());
    }

    hex::encode(hasher.finalize())
}

fn to_transaction(
    account_id: i64,
    asset_id: Option<i64>,
    record: &CanonicalRecord,
    source: &str,
    fingerprint: String,
) -> Transaction {
    Transaction::new(
        0,
        account_id,
        asset_id,
        record.transaction_type,
        record.date,
        record.quantity,
        record.price,
        record.amount,
        record.currency.clone(),
        record.commission,
        record.fees,
        record.tax,
        source.to_string(),
        record.external_id.clone(),
        record.description.clone(),
        fingerprint,
    )
}

/// Inserts inside a savepoint so a failing row leaves the surrounding
/// transaction usable.
async fn insert_isolated(conn: &mut SqliteConnection, transaction: &Transaction) -> Result<i64> {
    let mut savepoint = conn.begin().await?;
    match write::insert_transaction(&mut savepoint, transaction).await {
        Ok(id) => {
            savepoint.commit().await?;
            Ok(id)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}
