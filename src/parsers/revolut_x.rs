use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ParsedStatement, StatementParser, aggregate_hints, csv_reader, line_of};
use crate::{
    app::utils::{
        crypto_pseudo_isin, currency_from_symbol, gross_value, non_empty, parse_datetime,
        parse_decimal, parse_decimal_or_zero,
    },
    errors::{ParseError, RowError},
    models::{AssetType, CanonicalRecord, FormatTag, InstrumentRef, TransactionType},
};

const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Debug, Deserialize)]
struct RevolutXRow {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Type")]
    txn_type: String,
    #[serde(rename = "Quantity")]
    quantity: String,
    #[serde(rename = "Price", default)]
    price: String,
    #[serde(rename = "Value", default)]
    value: String,
    #[serde(rename = "Fees", default)]
    fees: String,
    #[serde(rename = "Date")]
    date: String,
}

/// Revolut X crypto exchange statement. Instruments get a `CRYPTO:<SYMBOL>`
/// identifier since they have no ISIN.
#[derive(Clone, Copy, Debug, Default)]
pub struct RevolutXParser;

impl StatementParser for RevolutXParser {
    fn format(&self) -> FormatTag {
        FormatTag::RevolutX
    }

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError> {
        let mut reader = csv_reader(text.trim_start_matches('\u{feff}'), true);
        let headers = reader.headers()?.clone();
        let mut statement = ParsedStatement::new(FormatTag::RevolutX);

        for record in reader.records() {
            let record = record?;
            let line = line_of(&record);
            let row: RevolutXRow = match record.deserialize(Some(&headers)) {
                Ok(row) => row,
                Err(error) => {
                    statement.note(line, format!("unreadable row: {}", error));
                    continue;
                }
            };

            match to_record(&row, line) {
                Ok(record) => statement.records.push(record),
                Err(error) => statement.skip(line, error),
            }
        }

        statement.holdings_hint = aggregate_hints(&statement.records);
        Ok(statement)
    }
}

fn to_record(row: &RevolutXRow, line: usize) -> Result<CanonicalRecord, RowError> {
    let symbol = non_empty(&row.symbol)
        .map(|symbol| symbol.to_uppercase())
        .ok_or(RowError::MissingField("Symbol"))?;
    let kind = row.txn_type.trim().to_lowercase();

    let mut transaction_type = match kind.as_str() {
        "buy" | "receive" => TransactionType::Buy,
        "sell" => TransactionType::Sell,
        other if other.contains("staking") || other.contains("reward") => {
            TransactionType::StakingReward
        }
        _ => return Err(RowError::UnsupportedType(row.txn_type.clone())),
    };

    let quantity = parse_decimal(&row.quantity, "quantity")?.abs();
    if quantity.is_zero() {
        return Err(RowError::NonPositiveQuantity(quantity));
    }
    let date = parse_datetime(&row.date)?;
    let price = parse_decimal_or_zero(&row.price, "price")?.abs();
    let value = parse_decimal_or_zero(&row.value, "value")?.abs();
    let fees = parse_decimal_or_zero(&row.fees, "fees")?.abs();

    if transaction_type == TransactionType::Buy && price.is_zero() && value.is_zero() {
        transaction_type = TransactionType::StakingReward;
    }

    let currency = [&row.price, &row.value, &row.fees]
        .iter()
        .find_map(|cell| currency_from_symbol(cell))
        .unwrap_or(DEFAULT_CURRENCY)
        .to_string();

    let gross = if value.is_zero() { gross_value(price, quantity)? } else { value };
    let (price, amount, commission) = match transaction_type {
        TransactionType::StakingReward => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        TransactionType::Sell => (effective_price(price, gross, quantity)?, gross, fees),
        _ => (effective_price(price, gross, quantity)?, -gross, fees),
    };

    let verb = match transaction_type {
        TransactionType::Buy => "Compra",
        TransactionType::Sell => "Venta",
        _ => "Staking reward",
    };

    Ok(CanonicalRecord {
        line,
        transaction_type,
        instrument: Some(InstrumentRef {
            isin: Some(crypto_pseudo_isin(&symbol)),
            symbol: Some(symbol.clone()),
            name: format!("{} (Crypto)", symbol),
            market_code: None,
            mic: None,
            currency: currency.clone(),
            asset_type: AssetType::Crypto,
        }),
        date,
        quantity: Some(quantity),
        price: Some(price),
        amount,
        currency,
        commission,
        fees: Decimal::ZERO,
        tax: Decimal::ZERO,
        external_id: None,
        description: format!("{} {} {}", verb, quantity, symbol),
    })
}

fn effective_price(price: Decimal, gross: Decimal, quantity: Decimal) -> Result<Decimal, RowError> {
    if price.is_zero() && !quantity.is_zero() {
        gross.checked_div(quantity).ok_or_else(|| RowError::InvalidNumber {
            field: "price",
            value: format!("{} / {}", gross, quantity),
        })
    } else {
        Ok(price)
    }
}
