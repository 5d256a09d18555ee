use std::collections::HashMap;

use anyhow::Result;
use sqlx::{Row, SqliteConnection};

use super::utils::{
    parse_account_from_row, parse_asset_from_row, parse_holding_from_row,
    parse_registry_entry_from_row, parse_transaction_from_row,
};
use crate::models::{Asset, BrokerAccount, PortfolioHolding, RegistryEntry, Transaction};

pub const TRANSACTION_COLUMNS: &str = r#"
    id, account_id, asset_id, transaction_type, transaction_date, quantity, price,
    amount, currency, commission, fees, tax, source, external_id, description, fingerprint
"#;

pub async fn get_account(conn: &mut SqliteConnection, account_id: i64) -> Result<Option<BrokerAccount>> {
    sqlx::query("SELECT id, user_id, broker, name FROM broker_accounts WHERE id = ?")
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| parse_account_from_row(&row))
        .transpose()
}

pub async fn find_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    broker: &str,
    name: &str,
) -> Result<Option<BrokerAccount>> {
    sqlx::query(
        r#"
        SELECT id, user_id, broker, name FROM broker_accounts
        WHERE user_id = ? AND broker = ? AND name = ?
        "#,
    )
    .bind(user_id)
    .bind(broker)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| parse_account_from_row(&row))
    .transpose()
}

pub async fn get_registry_entry(conn: &mut SqliteConnection, isin: &str) -> Result<Option<RegistryEntry>> {
    sqlx::query("SELECT * FROM asset_registry WHERE isin = ?")
        .bind(isin)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| parse_registry_entry_from_row(&row))
        .transpose()
}

pub async fn list_unenriched_registry(conn: &mut SqliteConnection) -> Result<Vec<RegistryEntry>> {
    sqlx::query("SELECT * FROM asset_registry WHERE symbol IS NULL ORDER BY usage_count DESC, isin")
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(parse_registry_entry_from_row)
        .collect()
}

pub async fn get_asset(conn: &mut SqliteConnection, asset_id: i64) -> Result<Option<Asset>> {
    sqlx::query("SELECT * FROM assets WHERE id = ?")
        .bind(asset_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| parse_asset_from_row(&row))
        .transpose()
}

pub async fn find_asset_by_isin(conn: &mut SqliteConnection, isin: &str) -> Result<Option<Asset>> {
    sqlx::query("SELECT * FROM assets WHERE isin = ?")
        .bind(isin)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| parse_asset_from_row(&row))
        .transpose()
}

pub async fn find_asset_by_symbol(
    conn: &mut SqliteConnection,
    symbol: &str,
    currency: &str,
) -> Result<Option<Asset>> {
    sqlx::query("SELECT * FROM assets WHERE symbol = ? AND currency = ? ORDER BY id LIMIT 1")
        .bind(symbol)
        .bind(currency)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| parse_asset_from_row(&row))
        .transpose()
}

/// Number of stored rows per fingerprint for one account.
pub async fn fingerprint_counts(conn: &mut SqliteConnection, account_id: i64) -> Result<HashMap<String, usize>> {
    let rows = sqlx::query(
        r#"
        SELECT fingerprint, COUNT(*) AS occurrences FROM transactions
        WHERE account_id = ?
        GROUP BY fingerprint
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<(String, usize)> {
            let fingerprint: String = row.try_get("fingerprint")?;
            let occurrences: i64 = row.try_get("occurrences")?;
            Ok((fingerprint, occurrences.max(0) as usize))
        })
        .collect()
}

/// Number of stored BUY, SELL and STAKING_REWARD rows per asset for one account.
pub async fn position_row_counts(conn: &mut SqliteConnection, account_id: i64) -> Result<HashMap<i64, usize>> {
    let rows = sqlx::query(
        r#"
        SELECT asset_id, COUNT(*) AS occurrences FROM transactions
        WHERE account_id = ? AND asset_id IS NOT NULL
          AND transaction_type IN ('BUY', 'SELL', 'STAKING_REWARD')
        GROUP BY asset_id
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<(i64, usize)> {
            let asset_id: i64 = row.try_get("asset_id")?;
            let occurrences: i64 = row.try_get("occurrences")?;
            Ok((asset_id, occurrences.max(0) as usize))
        })
        .collect()
}

pub async fn list_transactions(conn: &mut SqliteConnection, account_id: i64) -> Result<Vec<Transaction>> {
    let query = format!(
        "SELECT {} FROM transactions WHERE account_id = ? ORDER BY transaction_date, id",
        TRANSACTION_COLUMNS
    );
    sqlx::query(&query)
        .bind(account_id)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(parse_transaction_from_row)
        .collect()
}

pub async fn list_holdings(conn: &mut SqliteConnection, account_id: i64) -> Result<Vec<PortfolioHolding>> {
    sqlx::query("SELECT * FROM portfolio_holdings WHERE account_id = ? ORDER BY asset_id")
        .bind(account_id)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(parse_holding_from_row)
        .collect()
}
