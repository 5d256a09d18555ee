use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{Row, sqlite::SqliteRow};
use std::str::FromStr;

use crate::models::{
    Asset, AssetType, BrokerAccount, EnrichmentSource, PortfolioHolding, RegistryEntry,
    Transaction, TransactionType,
};

/// Canonical text form used for every stored decimal.
pub fn decimal_to_db(value: &Decimal) -> String {
    value.normalize().to_string()
}

pub fn optional_decimal_to_db(value: &Option<Decimal>) -> Option<String> {
    value.as_ref().map(decimal_to_db)
}

pub fn parse_decimal_from_row(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let text: String = row
        .try_get(column)
        .with_context(|| format!("Failed to read column '{}'", column))?;
    Decimal::from_str(&text).with_context(|| format!("Failed to parse {} '{}'", column, text))
}

pub fn parse_optional_decimal_from_row(row: &SqliteRow, column: &str) -> Result<Option<Decimal>> {
    let text: Option<String> = row
        .try_get(column)
        .with_context(|| format!("Failed to read column '{}'", column))?;
    text.map(|text| {
        Decimal::from_str(&text).with_context(|| format!("Failed to parse {} '{}'", column, text))
    })
    .transpose()
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .with_context(|| format!("Failed to read column '{}'", column))
}

pub fn parse_account_from_row(row: &SqliteRow) -> Result<BrokerAccount> {
    Ok(BrokerAccount::new(
        get(row, "id")?,
        get(row, "user_id")?,
        get(row, "broker")?,
        get(row, "name")?,
    ))
}

pub fn parse_asset_from_row(row: &SqliteRow) -> Result<Asset> {
    let asset_type: String = get(row, "asset_type")?;
    Ok(Asset::new(
        get(row, "id")?,
        get(row, "isin")?,
        get(row, "symbol")?,
        get(row, "name")?,
        AssetType::from_str(&asset_type)?,
        get(row, "currency")?,
        get(row, "exchange")?,
        get(row, "mic")?,
        get(row, "quote_suffix")?,
        parse_optional_decimal_from_row(row, "last_price")?,
        get::<Option<NaiveDateTime>>(row, "last_price_updated_at")?,
    ))
}

pub fn parse_registry_entry_from_row(row: &SqliteRow) -> Result<RegistryEntry> {
    let asset_type: String = get(row, "asset_type")?;
    let source: Option<String> = get(row, "source")?;
    let source = source
        .map(|source| {
            EnrichmentSource::from_str(&source)
                .with_context(|| format!("Unknown enrichment source '{}'", source))
        })
        .transpose()?;

    Ok(RegistryEntry::new(
        get(row, "isin")?,
        get(row, "symbol")?,
        get(row, "exchange")?,
        get(row, "mic")?,
        get(row, "quote_suffix")?,
        get(row, "name")?,
        AssetType::from_str(&asset_type)?,
        get(row, "currency")?,
        get(row, "market_code")?,
        source,
        get(row, "usage_count")?,
        get::<Option<NaiveDateTime>>(row, "enriched_at")?,
    ))
}

pub fn parse_transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    let transaction_type: String = get(row, "transaction_type")?;
    Ok(Transaction::new(
        get(row, "id")?,
        get(row, "account_id")?,
        get(row, "asset_id")?,
        TransactionType::parse_str(&transaction_type)?,
        get(row, "transaction_date")?,
        parse_optional_decimal_from_row(row, "quantity")?,
        parse_optional_decimal_from_row(row, "price")?,
        parse_decimal_from_row(row, "amount")?,
        get(row, "currency")?,
        parse_decimal_from_row(row, "commission")?,
        parse_decimal_from_row(row, "fees")?,
        parse_decimal_from_row(row, "tax")?,
        get(row, "source")?,
        get(row, "external_id")?,
        get(row, "description")?,
        get(row, "fingerprint")?,
    ))
}

pub fn parse_holding_from_row(row: &SqliteRow) -> Result<PortfolioHolding> {
    Ok(PortfolioHolding::new(
        get(row, "account_id")?,
        get(row, "asset_id")?,
        parse_decimal_from_row(row, "quantity")?,
        parse_decimal_from_row(row, "average_buy_price")?,
        parse_decimal_from_row(row, "total_cost")?,
        parse_decimal_from_row(row, "realized_pnl")?,
        get(row, "first_purchase_date")?,
        get(row, "last_transaction_date")?,
        get(row, "is_inconsistent")?,
        parse_decimal_from_row(row, "shortfall")?,
    ))
}
