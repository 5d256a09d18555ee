use std::collections::HashMap;

use chrono::NaiveDateTime;
use csv::StringRecord;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{ParsedStatement, StatementParser, csv_reader, line_of};
use crate::{
    app::utils::{gross_value, non_empty, parse_datetime},
    errors::{ParseError, RowError},
    models::{
        AssetType, CanonicalRecord, FormatTag, HintBasis, HoldingHint, InstrumentRef, TransactionType,
    },
};

/// Section names, English first.
const TRADES: [&str; 2] = ["Trades", "Operaciones"];
const OPEN_POSITIONS: [&str; 2] = ["Open Positions", "Posiciones abiertas"];
const DIVIDENDS: [&str; 2] = ["Dividends", "Dividendos"];
const WITHHOLDING: [&str; 2] = ["Withholding Tax", "Retención de impuestos"];
const CASH_TRANSFERS: [&str; 2] = ["Deposits & Withdrawals", "Depósitos y retiradas"];
const FEES: [&str; 2] = ["Fees", "Tarifas"];
const INSTRUMENTS: [&str; 2] = [
    "Financial Instrument Information",
    "Información de instrumento financiero",
];

/// Column names, English first.
const ASSET_CATEGORY: [&str; 2] = ["Asset Category", "Categoría de activo"];
const CURRENCY: [&str; 2] = ["Currency", "Divisa"];
const SYMBOL: [&str; 2] = ["Symbol", "Símbolo"];
const DATE_TIME: [&str; 2] = ["Date/Time", "Fecha/Hora"];
const DATE: [&str; 4] = ["Date", "Fecha", "Settle Date", "Fecha de liquidación"];
const QUANTITY: [&str; 2] = ["Quantity", "Cantidad"];
const TRADE_PRICE: [&str; 2] = ["T. Price", "Precio trans."];
const PROCEEDS: [&str; 2] = ["Proceeds", "Productos"];
const COMMISSION: [&str; 2] = ["Comm/Fee", "Tarifa/com."];
const DESCRIPTION: [&str; 2] = ["Description", "Descripción"];
const AMOUNT: [&str; 2] = ["Amount", "Cantidad"];
const COST_BASIS: [&str; 2] = ["Cost Basis", "Base de coste"];
const DISCRIMINATOR: [&str; 1] = ["DataDiscriminator"];
const SECURITY_ID: [&str; 2] = ["Security ID", "ID de seguridad"];
const LISTING_EXCHANGE: [&str; 2] = ["Listing Exch", "Merc. de cotización"];
const INSTRUMENT_TYPE: [&str; 2] = ["Type", "Tipo"];

/// Interactive Brokers activity statement: every line is
/// `section, Header|Data|Total|SubTotal, fields...`, and a section's
/// header may be repeated with different columns.
#[derive(Clone, Copy, Debug, Default)]
pub struct IbkrParser;

#[derive(Clone, Debug, Default)]
struct Listing {
    isin: Option<String>,
    exchange: Option<String>,
    asset_type: Option<AssetType>,
    name: Option<String>,
}

struct Row<'a> {
    headers: &'a [String],
    record: &'a StringRecord,
    line: usize,
}

impl<'a> Row<'a> {
    fn get(&self, names: &[&str]) -> &'a str {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|header| header == name))
            .and_then(|index| self.record.get(index + 2))
            .map(str::trim)
            .unwrap_or("")
    }

    fn number(&self, names: &[&str], label: &'static str) -> Result<Decimal, RowError> {
        parse_number(self.get(names), label)
    }
}

impl StatementParser for IbkrParser {
    fn format(&self) -> FormatTag {
        FormatTag::Ibkr
    }

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError> {
        let mut reader = csv_reader(text.trim_start_matches('\u{feff}'), false);
        let mut sections: Vec<(String, Vec<String>, StringRecord)> = Vec::new();
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();

        for record in reader.records() {
            let record = record?;
            if record.len() < 2 {
                continue;
            }
            let section = record[0].trim().to_string();
            match record[1].trim() {
                "Header" => {
                    headers.insert(
                        section,
                        record.iter().skip(2).map(|cell| cell.trim().to_string()).collect(),
                    );
                }
                "Data" => {
                    let Some(current) = headers.get(&section) else {
                        continue;
                    };
                    sections.push((section, current.clone(), record));
                }
                _ => {}
            }
        }

        if sections.is_empty() && headers.is_empty() {
            return Err(ParseError::Structure {
                format: FormatTag::Ibkr,
                reason: String::from("no statement sections found"),
            });
        }

        let listings = collect_listings(&sections);
        let dividend_isin = isin_pattern();
        let mut statement = ParsedStatement::new(FormatTag::Ibkr);
        let mut forex_rows = 0usize;

        for (section, headers, record) in &sections {
            let row = Row {
                headers,
                record,
                line: line_of(record),
            };
            let section = section.as_str();

            let result = if TRADES.contains(&section) {
                if is_forex(row.get(&ASSET_CATEGORY)) {
                    forex_rows += 1;
                    continue;
                }
                if !matches!(row.get(&DISCRIMINATOR), "" | "Order") {
                    continue;
                }
                parse_trade(&row, &listings).map(Some)
            } else if DIVIDENDS.contains(&section) || WITHHOLDING.contains(&section) {
                if row.get(&CURRENCY).starts_with("Total") {
                    continue;
                }
                parse_dividend(&row, &listings, &dividend_isin, WITHHOLDING.contains(&section))
                    .map(Some)
            } else if CASH_TRANSFERS.contains(&section) {
                if row.get(&CURRENCY).starts_with("Total") {
                    continue;
                }
                parse_transfer(&row).map(Some)
            } else if FEES.contains(&section) {
                if row.get(&CURRENCY).starts_with("Total") || row.get(&DATE).is_empty() {
                    continue;
                }
                parse_fee(&row).map(Some)
            } else if OPEN_POSITIONS.contains(&section) {
                if !matches!(row.get(&DISCRIMINATOR), "" | "Summary") {
                    continue;
                }
                match parse_position(&row, &listings) {
                    Ok(Some(hint)) => statement.holdings_hint.push(hint),
                    Ok(None) => {}
                    Err(error) => statement.skip(row.line, error),
                }
                Ok(None)
            } else {
                Ok(None)
            };

            match result {
                Ok(Some(record)) => statement.records.push(record),
                Ok(None) => {}
                Err(error) => statement.skip(row.line, error),
            }
        }

        if forex_rows > 0 {
            statement.note(0, format!("{} forex trade(s) ignored", forex_rows));
        }

        Ok(statement)
    }
}

/// IBKR writes `1,234.56`: commas are always thousands separators.
fn parse_number(field: &str, label: &'static str) -> Result<Decimal, RowError> {
    let cleaned: String = field.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() || cleaned == "--" {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| RowError::InvalidNumber {
            field: label,
            value: field.to_string(),
        })
}

fn isin_pattern() -> Option<Regex> {
    Regex::new(r"\(([A-Z]{2}[A-Z0-9]{9}[0-9])\)").ok()
}

fn is_forex(category: &str) -> bool {
    let lower = category.to_lowercase();
    lower == "forex" || lower == "fórex" || lower == "divisas"
}

fn asset_type_of(category: &str) -> AssetType {
    let lower = category.to_lowercase();
    if lower.contains("etf") {
        AssetType::ETF
    } else if lower.contains("bond") || lower.contains("bono") {
        AssetType::Bond
    } else if lower.contains("crypto") || lower.contains("cripto") {
        AssetType::Crypto
    } else {
        AssetType::Stock
    }
}

fn collect_listings(sections: &[(String, Vec<String>, StringRecord)]) -> HashMap<String, Listing> {
    sections
        .iter()
        .filter(|(section, _, _)| INSTRUMENTS.contains(&section.as_str()))
        .filter_map(|(_, headers, record)| {
            let row = Row {
                headers,
                record,
                line: 0,
            };
            let symbol = non_empty(row.get(&SYMBOL))?;
            let instrument_type = row.get(&INSTRUMENT_TYPE);
            Some((
                symbol,
                Listing {
                    isin: non_empty(row.get(&SECURITY_ID)),
                    exchange: non_empty(row.get(&LISTING_EXCHANGE)),
                    asset_type: (!instrument_type.is_empty()).then(|| asset_type_of(instrument_type)),
                    name: non_empty(row.get(&DESCRIPTION)),
                },
            ))
        })
        .collect()
}

fn instrument(
    symbol: &str,
    currency: &str,
    listings: &HashMap<String, Listing>,
    asset_type: AssetType,
) -> InstrumentRef {
    let listing = listings.get(symbol).cloned().unwrap_or_default();
    InstrumentRef {
        isin: listing.isin,
        symbol: Some(symbol.to_string()),
        name: listing.name.unwrap_or_else(|| symbol.to_string()),
        market_code: listing.exchange,
        mic: None,
        currency: currency.to_string(),
        asset_type: listing.asset_type.unwrap_or(asset_type),
    }
}

fn required_date(row: &Row, names: &[&str]) -> Result<NaiveDateTime, RowError> {
    let raw = row.get(names);
    if raw.is_empty() {
        return Err(RowError::MissingField("date"));
    }
    parse_datetime(raw)
}

fn parse_trade(row: &Row, listings: &HashMap<String, Listing>) -> Result<CanonicalRecord, RowError> {
    let symbol = non_empty(row.get(&SYMBOL)).ok_or(RowError::MissingField("symbol"))?;
    let currency = non_empty(row.get(&CURRENCY)).ok_or(RowError::MissingField("currency"))?;
    let date = required_date(row, &DATE_TIME)?;
    let quantity = row.number(&QUANTITY, "quantity")?;
    let price = row.number(&TRADE_PRICE, "price")?;
    let proceeds = row.number(&PROCEEDS, "proceeds")?;
    let commission = row.number(&COMMISSION, "commission")?.abs();

    if quantity.is_zero() {
        return Err(RowError::NonPositiveQuantity(quantity));
    }

    let gross = if proceeds.is_zero() {
        gross_value(price, quantity)?
    } else {
        proceeds.abs()
    };
    let (transaction_type, amount) = if quantity < Decimal::ZERO {
        (TransactionType::Sell, gross)
    } else if price.is_zero() {
        (TransactionType::StakingReward, Decimal::ZERO)
    } else {
        (TransactionType::Buy, -gross)
    };

    let category = asset_type_of(row.get(&ASSET_CATEGORY));
    Ok(CanonicalRecord {
        line: row.line,
        transaction_type,
        instrument: Some(instrument(&symbol, &currency, listings, category)),
        date,
        quantity: Some(quantity.abs()),
        price: Some(price),
        amount,
        currency: currency.clone(),
        commission,
        fees: Decimal::ZERO,
        tax: Decimal::ZERO,
        external_id: None,
        description: format!("{} {} {}", transaction_type, quantity.abs(), symbol),
    })
}

/// Dividend descriptions look like `9997 (KYG5215A1004) Cash Dividend ...`.
fn parse_dividend(
    row: &Row,
    listings: &HashMap<String, Listing>,
    isin_pattern: &Option<Regex>,
    withholding: bool,
) -> Result<CanonicalRecord, RowError> {
    let currency = non_empty(row.get(&CURRENCY)).ok_or(RowError::MissingField("currency"))?;
    let date = required_date(row, &DATE)?;
    let description = row.get(&DESCRIPTION);
    let amount = row.number(&AMOUNT, "amount")?;

    let symbol = description
        .split('(')
        .next()
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
        .ok_or(RowError::MissingField("description"))?;
    let mut instrument = instrument(symbol, &currency, listings, AssetType::Stock);
    if instrument.isin.is_none() {
        instrument.isin = isin_pattern
            .as_ref()
            .and_then(|pattern| pattern.captures(description))
            .map(|captures| captures[1].to_string());
    }

    // Dividend reversals keep their negative sign
    let (amount, tax) = if withholding {
        (-amount.abs(), amount.abs())
    } else {
        (amount, Decimal::ZERO)
    };

    let mut record = CanonicalRecord::cash(
        row.line,
        TransactionType::Dividend,
        date,
        amount,
        &currency,
        description,
    );
    record.instrument = Some(instrument);
    record.tax = tax;
    Ok(record)
}

fn parse_transfer(row: &Row) -> Result<CanonicalRecord, RowError> {
    let currency = non_empty(row.get(&CURRENCY)).ok_or(RowError::MissingField("currency"))?;
    let date = required_date(row, &DATE)?;
    let amount = row.number(&AMOUNT, "amount")?;
    let transaction_type = if amount < Decimal::ZERO {
        TransactionType::Withdrawal
    } else {
        TransactionType::Deposit
    };
    Ok(CanonicalRecord::cash(
        row.line,
        transaction_type,
        date,
        amount,
        &currency,
        row.get(&DESCRIPTION),
    ))
}

fn parse_fee(row: &Row) -> Result<CanonicalRecord, RowError> {
    let currency = non_empty(row.get(&CURRENCY)).ok_or(RowError::MissingField("currency"))?;
    let date = required_date(row, &DATE)?;
    let amount = row.number(&AMOUNT, "amount")?;
    Ok(CanonicalRecord::cash(
        row.line,
        TransactionType::Fee,
        date,
        -amount.abs(),
        &currency,
        row.get(&DESCRIPTION),
    ))
}

fn parse_position(
    row: &Row,
    listings: &HashMap<String, Listing>,
) -> Result<Option<HoldingHint>, RowError> {
    if is_forex(row.get(&ASSET_CATEGORY)) {
        return Ok(None);
    }
    let Some(symbol) = non_empty(row.get(&SYMBOL)) else {
        return Ok(None);
    };
    let currency = non_empty(row.get(&CURRENCY)).ok_or(RowError::MissingField("currency"))?;
    let quantity = row.number(&QUANTITY, "quantity")?;
    if quantity <= Decimal::ZERO {
        return Ok(None);
    }
    let cost_basis = non_empty(row.get(&COST_BASIS))
        .map(|value| parse_number(&value, "cost basis"))
        .transpose()?;

    Ok(Some(HoldingHint {
        instrument: instrument(&symbol, &currency, listings, asset_type_of(row.get(&ASSET_CATEGORY))),
        quantity,
        total_cost: cost_basis.map(|cost| cost.abs()),
        basis: HintBasis::BrokerReported,
    }))
}
