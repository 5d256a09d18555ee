use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::{
    api::{IdentityLookup, OpenFigiApi},
    cache::TtlCache,
    config::Config,
    db::{self, read, write},
    errors::ImportError,
    models::{
        BrokerAccount, HintBasis, InstrumentRef, PortfolioHolding, TransactionType,
        account::SYNTHETIC_ACCOUNT_NAME,
    },
    parsers::{self, ParsedStatement},
    services::{AssetResolver, ImportReport, Importer, RebuildReport, Reconciler},
};

/// Outcome of one file in a batch. `error` is set when the file was
/// rejected as a whole.
#[derive(Clone, Debug, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub account_id: i64,
    pub report: Option<ImportReport>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    pub rebuilds: Vec<RebuildReport>,
    pub errors: Vec<String>,
}

/// Net position change of one instrument across the files of a check.
struct FileTotal {
    instrument: InstrumentRef,
    quantity: Option<Decimal>,
    rows: usize,
    last_file: usize,
}

/// Entry point of the pipeline: detect, parse, resolve, persist, rebuild.
pub struct Portfolio {
    pool: SqlitePool,
    resolver: Arc<AssetResolver>,
    importer: Importer,
    reconciler: Reconciler,
}

impl Portfolio {
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::init::connect(&config.database_url).await?;
        Self::new(pool, config)
    }

    pub fn new(pool: SqlitePool, config: &Config) -> Result<Self> {
        let lookup: Option<Arc<dyn IdentityLookup>> = if config.enable_enrichment {
            Some(Arc::new(
                OpenFigiApi::new(config).context("Failed to build the OpenFIGI client")?,
            ))
        } else {
            None
        };
        Ok(Self::with_lookup(pool, lookup, config))
    }

    pub fn with_lookup(
        pool: SqlitePool,
        lookup: Option<Arc<dyn IdentityLookup>>,
        config: &Config,
    ) -> Self {
        let failed_lookups = Arc::new(TtlCache::with_system_clock(config.negative_ttl));
        let resolver = Arc::new(AssetResolver::new(pool.clone(), lookup, failed_lookups));

        Self {
            importer: Importer::new(pool.clone(), resolver.clone()),
            reconciler: Reconciler::new(pool.clone(), config.oversell_policy),
            resolver,
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub async fn create_account(
        &self,
        user_id: i64,
        broker: &str,
        name: &str,
    ) -> Result<BrokerAccount> {
        let mut conn = self.pool.acquire().await?;
        let id = write::insert_account(&mut conn, user_id, broker.trim(), name.trim())
            .await
            .with_context(|| format!("Failed to create account {}/{}", broker, name))?;
        info!(id, user_id, broker, name, "Account created");

        Ok(BrokerAccount::new(
            id,
            user_id,
            broker.trim().to_string(),
            name.trim().to_string(),
        ))
    }

    /// The per-user account that holds manually tracked asset classes.
    pub async fn ensure_synthetic_account(&self, user_id: i64) -> Result<BrokerAccount> {
        {
            let mut conn = self.pool.acquire().await?;
            if let Some(account) = read::find_account(
                &mut conn,
                user_id,
                SYNTHETIC_ACCOUNT_NAME,
                SYNTHETIC_ACCOUNT_NAME,
            )
            .await?
            {
                return Ok(account);
            }
        }
        self.create_account(user_id, SYNTHETIC_ACCOUNT_NAME, SYNTHETIC_ACCOUNT_NAME)
            .await
    }

    /// Imports one export and rebuilds the account.
    pub async fn import_bytes(
        &self,
        account_id: i64,
        bytes: &[u8],
    ) -> Result<(ImportReport, RebuildReport), ImportError> {
        let (mut report, statement) = self.ingest(account_id, bytes).await?;
        let rebuild = self.reconciler.rebuild(account_id).await?;
        let warnings = self
            .cross_check(account_id, &[&statement], &rebuild.holdings)
            .await?;
        report
            .warnings
            .extend(warnings.into_iter().map(|(_, warning)| warning));

        Ok((report, rebuild))
    }

    pub async fn import_file(
        &self,
        account_id: i64,
        path: &Path,
    ) -> Result<(ImportReport, RebuildReport), ImportError> {
        let bytes = read_file(path).await?;
        self.import_bytes(account_id, &bytes).await
    }

    /// Imports several files. A file that cannot be read or parsed is
    /// reported and skipped; every touched account is rebuilt once at the
    /// end.
    pub async fn import_batch(&self, files: &[(i64, PathBuf)]) -> BatchReport {
        let mut batch = BatchReport::default();
        let mut touched: BTreeSet<i64> = BTreeSet::new();
        let mut imported: Vec<(i64, usize, ParsedStatement)> = Vec::new();

        for (account_id, path) in files {
            let shown = path.display().to_string();
            let result = match read_file(path).await {
                Ok(bytes) => self.ingest(*account_id, &bytes).await,
                Err(e) => Err(e),
            };

            match result {
                Ok((report, statement)) => {
                    touched.insert(*account_id);
                    imported.push((*account_id, batch.files.len(), statement));
                    batch.files.push(FileOutcome {
                        path: shown.clone(),
                        account_id: *account_id,
                        report: Some(report),
                        error: None,
                    });
                }
                Err(e) => {
                    error!(path = %shown, "Import failed: {}", e);
                    batch.files.push(FileOutcome {
                        path: shown,
                        account_id: *account_id,
                        report: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        for account_id in touched {
            match self.reconciler.rebuild(account_id).await {
                Ok(rebuild) => {
                    let (indexes, statements): (Vec<usize>, Vec<&ParsedStatement>) = imported
                        .iter()
                        .filter(|(owner, _, _)| *owner == account_id)
                        .map(|(_, index, statement)| (*index, statement))
                        .unzip();
                    match self
                        .cross_check(account_id, &statements, &rebuild.holdings)
                        .await
                    {
                        Ok(warnings) => {
                            for (position, warning) in warnings {
                                if let Some(report) = batch.files[indexes[position]].report.as_mut() {
                                    report.warnings.push(warning);
                                }
                            }
                        }
                        Err(e) => batch.errors.push(format!("account {}: {:#}", account_id, e)),
                    }
                    batch.rebuilds.push(rebuild);
                }
                Err(e) => {
                    error!(account_id, "Rebuild failed: {}", e);
                    batch.errors.push(format!("account {}: {}", account_id, e));
                }
            }
        }

        batch
    }

    pub async fn rebuild(&self, account_id: i64) -> Result<RebuildReport, ImportError> {
        {
            let mut conn = self.pool.acquire().await?;
            if read::get_account(&mut conn, account_id).await?.is_none() {
                return Err(ImportError::UnknownAccount(account_id));
            }
        }
        Ok(self.reconciler.rebuild(account_id).await?)
    }

    pub async fn holdings(&self, account_id: i64) -> Result<Vec<PortfolioHolding>> {
        let mut conn = self.pool.acquire().await?;
        read::list_holdings(&mut conn, account_id).await
    }

    /// Records a quote supplied by the price collaborator.
    pub async fn update_asset_price(
        &self,
        asset_id: i64,
        price: Decimal,
        at: NaiveDateTime,
    ) -> Result<()> {
        if price < Decimal::ZERO {
            bail!("Price {} for asset {} is negative", price, asset_id);
        }
        let mut conn = self.pool.acquire().await?;
        if !write::update_asset_price(&mut conn, asset_id, &price, &at).await? {
            bail!("Asset {} does not exist", asset_id);
        }
        Ok(())
    }

    async fn ingest(
        &self,
        account_id: i64,
        bytes: &[u8],
    ) -> Result<(ImportReport, ParsedStatement), ImportError> {
        let statement = parsers::parse_bytes(bytes)?;
        let report = self.importer.import(account_id, &statement).await?;
        Ok((report, statement))
    }

    /// Compares what one account's statements say about its positions with
    /// the rebuilt holdings. Warnings come back with the index of the
    /// statement they concern.
    ///
    /// Broker-reported positions are a whole-account view, so only the most
    /// recent statement carrying them is checked. Files without them are
    /// netted together per instrument, and an instrument is checked only when
    /// those files cover every stored row it has.
    async fn cross_check(
        &self,
        account_id: i64,
        statements: &[&ParsedStatement],
        holdings: &[PortfolioHolding],
    ) -> Result<Vec<(usize, String)>> {
        let mut warnings = Vec::new();
        let mut conn = self.pool.acquire().await?;

        let snapshot = statements
            .iter()
            .enumerate()
            .filter(|(_, statement)| has_broker_positions(statement))
            .max_by_key(|(_, statement)| statement.records.iter().map(|record| record.date).max());

        if let Some((index, statement)) = snapshot {
            let reported = statement
                .holdings_hint
                .iter()
                .filter(|hint| hint.basis == HintBasis::BrokerReported);
            for hint in reported {
                let key = hint.instrument.key();
                let Some(asset_id) = find_asset_id(&mut conn, &hint.instrument).await? else {
                    warnings.push((
                        index,
                        format!(
                            "{}: broker reports {} units but the asset is not cataloged",
                            key,
                            hint.quantity.normalize()
                        ),
                    ));
                    continue;
                };

                let held = held_quantity(holdings, asset_id);
                if !same_quantity(held, hint.quantity) {
                    warn!(asset_id, %held, reported = %hint.quantity, "Holding mismatch");
                    warnings.push((
                        index,
                        format!(
                            "{}: broker reports {} units, ledger holds {}",
                            key,
                            hint.quantity.normalize(),
                            held.normalize()
                        ),
                    ));
                }
            }
        }

        let mut totals: BTreeMap<String, FileTotal> = BTreeMap::new();
        for (index, statement) in statements.iter().enumerate() {
            if has_broker_positions(statement) {
                continue;
            }
            for record in &statement.records {
                let (Some(instrument), Some(quantity)) = (&record.instrument, record.quantity) else {
                    continue;
                };
                if !record.transaction_type.is_position_change() {
                    continue;
                }
                let signed = match record.transaction_type {
                    TransactionType::Sell => -quantity.abs(),
                    _ => quantity.abs(),
                };

                let total = totals.entry(instrument.key()).or_insert_with(|| FileTotal {
                    instrument: instrument.clone(),
                    quantity: Some(Decimal::ZERO),
                    rows: 0,
                    last_file: index,
                });
                total.quantity = total.quantity.and_then(|sum| sum.checked_add(signed));
                total.rows += 1;
                total.last_file = index;
            }
        }
        if totals.is_empty() {
            return Ok(warnings);
        }

        let stored = read::position_row_counts(&mut conn, account_id).await?;
        for (key, total) in &totals {
            let Some(quantity) = total.quantity else {
                continue;
            };
            // Rows that failed to import already show up as failures
            let Some(asset_id) = find_asset_id(&mut conn, &total.instrument).await? else {
                continue;
            };
            let stored_rows = stored.get(&asset_id).copied().unwrap_or(0);
            if stored_rows > total.rows {
                debug!(asset_id, stored_rows, rows = total.rows, "Files cover part of the history");
                continue;
            }

            // Oversells are capped and reported by the rebuild
            let expected = quantity.max(Decimal::ZERO);
            let held = held_quantity(holdings, asset_id);
            if !same_quantity(held, expected) {
                warn!(asset_id, %held, expected = %expected, "Holding mismatch");
                warnings.push((
                    total.last_file,
                    format!(
                        "{}: imported rows add up to {} units, ledger holds {}",
                        key,
                        expected.normalize(),
                        held.normalize()
                    ),
                ));
            }
        }

        Ok(warnings)
    }
}

fn has_broker_positions(statement: &ParsedStatement) -> bool {
    statement
        .holdings_hint
        .iter()
        .any(|hint| hint.basis == HintBasis::BrokerReported)
}

fn held_quantity(holdings: &[PortfolioHolding], asset_id: i64) -> Decimal {
    holdings
        .iter()
        .find(|holding| *holding.asset_id() == asset_id)
        .map(|holding| *holding.quantity())
        .unwrap_or(Decimal::ZERO)
}

fn same_quantity(a: Decimal, b: Decimal) -> bool {
    a.round_dp(8) == b.round_dp(8)
}

async fn find_asset_id(
    conn: &mut sqlx::SqliteConnection,
    instrument: &InstrumentRef,
) -> Result<Option<i64>> {
    let asset = match (&instrument.isin, &instrument.symbol) {
        (Some(isin), _) => read::find_asset_by_isin(conn, isin).await?,
        (None, Some(symbol)) => read::find_asset_by_symbol(conn, symbol, &instrument.currency).await?,
        (None, None) => None,
    };
    Ok(asset.map(|asset| *asset.id()))
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ImportError> {
    tokio::fs::read(path).await.map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })
}
