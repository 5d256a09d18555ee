use anyhow::Result;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use super::utils::{decimal_to_db, optional_decimal_to_db};
use crate::models::{Asset, PortfolioHolding, RegistryEntry, Resolution, Transaction};

pub async fn insert_account(
    conn: &mut SqliteConnection,
    user_id: i64,
    broker: &str,
    name: &str,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO broker_accounts (user_id, broker, name)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(broker)
    .bind(name)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn insert_asset(conn: &mut SqliteConnection, asset: &Asset) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO assets
        (isin, symbol, name, asset_type, currency, exchange, mic, quote_suffix)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(asset.isin())
    .bind(asset.symbol())
    .bind(asset.name())
    .bind(asset.asset_type().to_str())
    .bind(asset.currency())
    .bind(asset.exchange())
    .bind(asset.mic())
    .bind(asset.quote_suffix())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Fills identity fields the catalog row does not have yet.
pub async fn fill_asset_identity(
    conn: &mut SqliteConnection,
    asset_id: i64,
    resolution: &Resolution,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE assets SET
            symbol = COALESCE(symbol, ?),
            exchange = COALESCE(exchange, ?),
            mic = COALESCE(mic, ?),
            quote_suffix = COALESCE(quote_suffix, ?),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&resolution.symbol)
    .bind(&resolution.exchange)
    .bind(&resolution.mic)
    .bind(&resolution.quote_suffix)
    .bind(asset_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrites the identity of every catalog row for `isin`.
pub async fn sync_assets_with_resolution(
    conn: &mut SqliteConnection,
    isin: &str,
    resolution: &Resolution,
) -> Result<u64> {
    let updated = sqlx::query(
        r#"
        UPDATE assets SET
            symbol = ?,
            exchange = ?,
            mic = ?,
            quote_suffix = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE isin = ?
        "#,
    )
    .bind(&resolution.symbol)
    .bind(&resolution.exchange)
    .bind(&resolution.mic)
    .bind(&resolution.quote_suffix)
    .bind(isin)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(updated)
}

pub async fn update_asset_price(
    conn: &mut SqliteConnection,
    asset_id: i64,
    price: &Decimal,
    at: &NaiveDateTime,
) -> Result<bool> {
    let updated = sqlx::query(
        r#"
        UPDATE assets SET
            last_price = ?,
            last_price_updated_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(decimal_to_db(price))
    .bind(at)
    .bind(asset_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

/// Stores a successful resolution. A concurrent writer for the same ISIN
/// is simply overwritten.
pub async fn upsert_registry_entry(conn: &mut SqliteConnection, entry: &RegistryEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO asset_registry
        (isin, symbol, exchange, mic, quote_suffix, name, asset_type, currency,
         market_code, source, usage_count, enriched_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (isin) DO UPDATE SET
            symbol = excluded.symbol,
            exchange = excluded.exchange,
            mic = excluded.mic,
            quote_suffix = excluded.quote_suffix,
            name = COALESCE(excluded.name, asset_registry.name),
            asset_type = excluded.asset_type,
            market_code = COALESCE(excluded.market_code, asset_registry.market_code),
            source = excluded.source,
            enriched_at = excluded.enriched_at,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(entry.isin())
    .bind(entry.symbol())
    .bind(entry.exchange())
    .bind(entry.mic())
    .bind(entry.quote_suffix())
    .bind(entry.name())
    .bind(entry.asset_type().to_str())
    .bind(entry.currency())
    .bind(entry.market_code())
    .bind(entry.source().map(|source| source.to_string()))
    .bind(entry.usage_count())
    .bind(entry.enriched_at())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Records an ISIN that could not be resolved. An existing row, enriched
/// or not, keeps its identity.
pub async fn insert_unenriched_registry(conn: &mut SqliteConnection, entry: &RegistryEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO asset_registry
        (isin, name, asset_type, currency, market_code, mic, usage_count)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        ON CONFLICT (isin) DO UPDATE SET
            usage_count = asset_registry.usage_count + 1,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(entry.isin())
    .bind(entry.name())
    .bind(entry.asset_type().to_str())
    .bind(entry.currency())
    .bind(entry.market_code())
    .bind(entry.mic())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn increment_registry_usage(conn: &mut SqliteConnection, isin: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE asset_registry
        SET usage_count = usage_count + 1, updated_at = CURRENT_TIMESTAMP
        WHERE isin = ?
        "#,
    )
    .bind(isin)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_transaction(conn: &mut SqliteConnection, transaction: &Transaction) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO transactions
        (
            account_id,
            asset_id,
            transaction_type,
            transaction_date,
            quantity,
            price,
            amount,
            currency,
            commission,
            fees,
            tax,
            source,
            external_id,
            description,
            fingerprint
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(transaction.account_id())
    .bind(transaction.asset_id())
    .bind(transaction.transaction_type().to_str())
    .bind(transaction.date())
    .bind(optional_decimal_to_db(transaction.quantity()))
    .bind(optional_decimal_to_db(transaction.price()))
    .bind(decimal_to_db(transaction.amount()))
    .bind(transaction.currency())
    .bind(decimal_to_db(transaction.commission()))
    .bind(decimal_to_db(transaction.fees()))
    .bind(decimal_to_db(transaction.tax()))
    .bind(transaction.source())
    .bind(transaction.external_id())
    .bind(transaction.description())
    .bind(transaction.fingerprint())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn delete_holdings(conn: &mut SqliteConnection, account_id: i64) -> Result<u64> {
    let deleted = sqlx::query("DELETE FROM portfolio_holdings WHERE account_id = ?")
        .bind(account_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(deleted)
}

pub async fn insert_holding(conn: &mut SqliteConnection, holding: &PortfolioHolding) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO portfolio_holdings
        (
            account_id,
            asset_id,
            quantity,
            average_buy_price,
            total_cost,
            realized_pnl,
            first_purchase_date,
            last_transaction_date,
            is_inconsistent,
            shortfall
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(holding.account_id())
    .bind(holding.asset_id())
    .bind(decimal_to_db(holding.quantity()))
    .bind(decimal_to_db(holding.average_buy_price()))
    .bind(decimal_to_db(holding.total_cost()))
    .bind(decimal_to_db(holding.realized_pnl()))
    .bind(holding.first_purchase_date())
    .bind(holding.last_transaction_date())
    .bind(holding.is_inconsistent())
    .bind(decimal_to_db(holding.shortfall()))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}
