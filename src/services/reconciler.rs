use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Connection, SqlitePool};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    app::FifoCalculator,
    config::OversellPolicy,
    db::{read::TRANSACTION_COLUMNS, utils::parse_transaction_from_row, write},
    errors::{FifoError, ReconcileError},
    models::{PortfolioHolding, Transaction, TransactionType},
};

/// A sale that found fewer units than it asked for.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Inconsistency {
    pub asset_id: i64,
    pub shortfall: Decimal,
    pub first_seen: NaiveDateTime,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RebuildReport {
    pub account_id: i64,
    pub holdings: Vec<PortfolioHolding>,
    /// Realized P&L per asset, closed positions included.
    pub realized_pnl: BTreeMap<i64, Decimal>,
    pub inconsistencies: Vec<Inconsistency>,
}

/// One exclusive lock per account, created on first use.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    pub fn for_account(&self, account_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(account_id).or_default().clone()
    }
}

#[derive(Default)]
struct AssetLedger {
    fifo: FifoCalculator,
    realized_pnl: Decimal,
    shortfall: Decimal,
    first_oversell: Option<NaiveDateTime>,
}

impl AssetLedger {
    fn apply(&mut self, transaction: &Transaction) -> Result<(), ReconcileError> {
        let quantity = transaction.quantity().unwrap_or(Decimal::ZERO).abs();
        let date = *transaction.date();
        let lot_error = |source| ReconcileError::Lot {
            transaction_id: *transaction.id(),
            source,
        };
        let overflow = || lot_error(FifoError::Overflow);

        match transaction.transaction_type() {
            TransactionType::Buy => self
                .fifo
                .add_buy(
                    date,
                    quantity,
                    transaction.price().unwrap_or(Decimal::ZERO),
                    transaction.buy_cost().ok_or_else(overflow)?,
                )
                .map_err(lot_error)?,
            TransactionType::StakingReward => {
                self.fifo.add_reward(date, quantity).map_err(lot_error)?
            }
            TransactionType::Sell => {
                let outcome = self.fifo.add_sell(quantity, date);
                // Proceeds of units that were never held are not income
                let proceeds = if quantity.is_zero() {
                    Decimal::ZERO
                } else {
                    let net = transaction.sell_proceeds().ok_or_else(overflow)?;
                    if *outcome.consumed() == quantity {
                        net
                    } else {
                        net.checked_mul(*outcome.consumed())
                            .and_then(|held| held.checked_div(quantity))
                            .ok_or_else(overflow)?
                    }
                };
                self.realized_pnl = proceeds
                    .checked_sub(*outcome.cost_basis())
                    .and_then(|gain| self.realized_pnl.checked_add(gain))
                    .ok_or_else(overflow)?;

                if outcome.is_oversell() {
                    self.shortfall = self
                        .shortfall
                        .checked_add(*outcome.shortfall())
                        .ok_or_else(overflow)?;
                    self.first_oversell.get_or_insert(date);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Rebuilds an account's holdings from its full transaction history.
pub struct Reconciler {
    pool: SqlitePool,
    policy: OversellPolicy,
    locks: AccountLocks,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, policy: OversellPolicy) -> Self {
        Self {
            pool,
            policy,
            locks: AccountLocks::default(),
        }
    }

    pub fn policy(&self) -> OversellPolicy {
        self.policy
    }

    /// Deletes and regenerates every holding of `account_id` in a single
    /// database transaction. Under [`OversellPolicy::Reject`] an oversold
    /// asset aborts the rebuild and the previous holdings stay in place.
    pub async fn rebuild(&self, account_id: i64) -> Result<RebuildReport, ReconcileError> {
        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let deleted = write::delete_holdings(&mut tx, account_id).await?;
        debug!(account_id, deleted, "Cleared holdings");

        let mut ledgers: BTreeMap<i64, AssetLedger> = BTreeMap::new();
        let query = format!(
            r#"
            SELECT {} FROM transactions
            WHERE account_id = ?
              AND asset_id IS NOT NULL
              AND transaction_type IN ('BUY', 'SELL', 'STAKING_REWARD')
            ORDER BY transaction_date, id
            "#,
            TRANSACTION_COLUMNS
        );
        {
            let mut rows = sqlx::query(&query).bind(account_id).fetch(&mut *tx);
            while let Some(row) = rows.next().await {
                let transaction = parse_transaction_from_row(&row?)?;
                let Some(asset_id) = *transaction.asset_id() else {
                    continue;
                };
                ledgers.entry(asset_id).or_default().apply(&transaction)?;
            }
        }

        let mut report = RebuildReport {
            account_id,
            ..RebuildReport::default()
        };

        for (asset_id, ledger) in &ledgers {
            report.realized_pnl.insert(*asset_id, ledger.realized_pnl);
            if let Some(first_seen) = ledger.first_oversell {
                if self.policy == OversellPolicy::Reject {
                    tx.rollback().await?;
                    return Err(ReconcileError::Oversell {
                        asset_id: *asset_id,
                        shortfall: ledger.shortfall,
                        date: first_seen,
                    });
                }
                warn!(
                    account_id,
                    asset_id,
                    shortfall = %ledger.shortfall,
                    "Sold more than held; position capped at zero"
                );
                report.inconsistencies.push(Inconsistency {
                    asset_id: *asset_id,
                    shortfall: ledger.shortfall,
                    first_seen,
                });
            }

            let position = ledger.fifo.get_current_position();
            if *position.quantity() <= Decimal::ZERO {
                continue;
            }

            let holding = PortfolioHolding::new(
                account_id,
                *asset_id,
                *position.quantity(),
                *position.average_buy_price(),
                *position.total_cost(),
                ledger.realized_pnl,
                *position.first_purchase_date(),
                *position.last_transaction_date(),
                ledger.first_oversell.is_some(),
                ledger.shortfall,
            );
            write::insert_holding(&mut tx, &holding).await?;
            report.holdings.push(holding);
        }

        tx.commit().await?;

        info!(
            account_id,
            holdings = report.holdings.len(),
            inconsistencies = report.inconsistencies.len(),
            "Holdings rebuilt"
        );
        Ok(report)
    }
}
