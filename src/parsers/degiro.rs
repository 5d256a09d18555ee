use csv::StringRecord;
use rust_decimal::Decimal;

use super::{ParsedStatement, StatementParser, aggregate_hints, csv_reader, field, line_of};
use crate::{
    app::utils::{combine_date_time, gross_value, non_empty, parse_decimal, parse_decimal_or_zero},
    errors::{ParseError, RowError},
    models::{AssetType, CanonicalRecord, FormatTag, InstrumentRef, TransactionType},
};

mod transactions {
    pub const DATE: usize = 0;
    pub const TIME: usize = 1;
    pub const PRODUCT: usize = 2;
    pub const ISIN: usize = 3;
    pub const EXCHANGE: usize = 4;
    pub const VENUE: usize = 5;
    pub const QUANTITY: usize = 6;
    pub const PRICE: usize = 7;
    pub const PRICE_CURRENCY: usize = 8;
    pub const LOCAL_VALUE: usize = 9;
    pub const COSTS: usize = 14;
    pub const ORDER_ID: usize = 18;
    pub const MIN_COLUMNS: usize = 9;
}

mod statement {
    pub const DATE: usize = 0;
    pub const TIME: usize = 1;
    pub const PRODUCT: usize = 3;
    pub const ISIN: usize = 4;
    pub const DESCRIPTION: usize = 5;
    pub const CURRENCY: usize = 7;
    pub const AMOUNT: usize = 8;
    pub const ORDER_ID: usize = 11;
    pub const MIN_COLUMNS: usize = 9;
}

/// DeGiro exports. Two layouts share the tag: the "Transacciones" trade
/// report and the "Estado de cuenta" cash statement. The statement is told
/// apart by its description column.
#[derive(Clone, Copy, Debug, Default)]
pub struct DegiroParser;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Layout {
    Transactions,
    Statement,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum StatementLine {
    Dividend,
    Withholding,
    Fee,
    Deposit,
    Withdrawal,
    Interest,
    Trade,
    TradeCost,
    Currency,
    Unsupported,
}

impl StatementParser for DegiroParser {
    fn format(&self) -> FormatTag {
        FormatTag::Degiro
    }

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError> {
        let mut reader = csv_reader(text.trim_start_matches('\u{feff}'), false);
        let mut rows = reader.records();

        let header = match rows.next() {
            Some(header) => header?,
            None => return Err(structure("empty file")),
        };
        let layout = layout_of(&header)?;

        let mut statement = ParsedStatement::new(FormatTag::Degiro);
        let mut ignored_trades = 0usize;

        for row in rows {
            let row = row?;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let line = line_of(&row);

            let result = match layout {
                Layout::Transactions => parse_trade(&row, line).map(Some),
                Layout::Statement => parse_cash_line(&row, line, &mut ignored_trades),
            };

            match result {
                Ok(Some(record)) => statement.records.push(record),
                Ok(None) => {}
                Err(error) => statement.skip(line, error),
            }
        }

        if ignored_trades > 0 {
            statement.note(
                0,
                format!(
                    "{} trade line(s) in the account statement were ignored; import the Transactions report for trades",
                    ignored_trades
                ),
            );
        }

        if layout == Layout::Transactions {
            statement.holdings_hint = aggregate_hints(&statement.records);
        }

        Ok(statement)
    }
}

fn structure(reason: &str) -> ParseError {
    ParseError::Structure {
        format: FormatTag::Degiro,
        reason: reason.to_string(),
    }
}

fn layout_of(header: &StringRecord) -> Result<Layout, ParseError> {
    let columns: Vec<String> = header.iter().map(|cell| cell.to_lowercase()).collect();

    if columns.len() < statement::MIN_COLUMNS {
        return Err(structure(&format!(
            "expected comma separated columns, found {}",
            columns.len()
        )));
    }

    let is_statement = columns
        .iter()
        .any(|column| column.starts_with("descripci") || column == "description");
    Ok(if is_statement {
        Layout::Statement
    } else {
        Layout::Transactions
    })
}

fn parse_trade(row: &StringRecord, line: usize) -> Result<CanonicalRecord, RowError> {
    use transactions::*;

    if row.len() < MIN_COLUMNS {
        return Err(RowError::MissingField("price currency"));
    }

    let quantity = parse_decimal(field(row, QUANTITY), "quantity")?;
    if quantity.is_zero() {
        return Err(RowError::NonPositiveQuantity(quantity));
    }
    let date = combine_date_time(field(row, DATE), field(row, TIME))?;
    let price = parse_decimal(field(row, PRICE), "price")?;
    let currency = non_empty(field(row, PRICE_CURRENCY)).unwrap_or_else(|| String::from("EUR"));
    let local_value = parse_decimal_or_zero(field(row, LOCAL_VALUE), "local value")?;
    let commission = parse_decimal_or_zero(field(row, COSTS), "costs")?.abs();
    let name = field(row, PRODUCT).to_string();

    let gross = if local_value.is_zero() {
        gross_value(price, quantity)?
    } else {
        local_value.abs()
    };

    let (transaction_type, amount, description) = if quantity < Decimal::ZERO {
        (
            TransactionType::Sell,
            gross,
            format!("Venta {} {}", quantity.abs(), name),
        )
    } else if price.is_zero() {
        (
            TransactionType::StakingReward,
            Decimal::ZERO,
            format!("Reward {} {}", quantity, name),
        )
    } else {
        (
            TransactionType::Buy,
            -gross,
            format!("Compra {} {}", quantity, name),
        )
    };

    Ok(CanonicalRecord {
        line,
        transaction_type,
        instrument: Some(InstrumentRef {
            isin: non_empty(field(row, ISIN)),
            symbol: None,
            name,
            market_code: non_empty(field(row, EXCHANGE)),
            mic: non_empty(field(row, VENUE)),
            currency: currency.clone(),
            asset_type: AssetType::Stock,
        }),
        date,
        quantity: Some(quantity.abs()),
        price: Some(price),
        amount,
        currency,
        commission,
        fees: Decimal::ZERO,
        tax: Decimal::ZERO,
        external_id: non_empty(field(row, ORDER_ID)),
        description,
    })
}

fn classify(description: &str, has_product: bool) -> StatementLine {
    let lower = description.to_lowercase();

    if lower.contains("cambio de divisa") || lower.starts_with("fx ") || lower.contains("cash sweep")
    {
        StatementLine::Currency
    } else if lower.contains("retención del dividendo")
        || lower.contains("retencion del dividendo")
        || lower.contains("dividend tax")
    {
        StatementLine::Withholding
    } else if lower == "dividendo" || lower == "dividend" {
        StatementLine::Dividend
    } else if lower.starts_with("compra ") || lower.starts_with("venta ") || lower.starts_with("buy ")
        || lower.starts_with("sell ")
    {
        StatementLine::Trade
    } else if lower.contains("costes de transacción") || lower.contains("transaction and/or third") {
        if has_product {
            StatementLine::TradeCost
        } else {
            StatementLine::Fee
        }
    } else if lower.contains("comisión") || lower.contains("comision") || lower.contains("fee") {
        StatementLine::Fee
    } else if lower.contains("interés") || lower.contains("interest") {
        StatementLine::Interest
    } else if lower.contains("processed") {
        StatementLine::Currency
    } else if lower.contains("ingreso") || lower.contains("depósito") || lower.contains("deposit") {
        StatementLine::Deposit
    } else if lower.contains("retirada") || lower.contains("withdrawal") {
        StatementLine::Withdrawal
    } else {
        StatementLine::Unsupported
    }
}

fn parse_cash_line(
    row: &StringRecord,
    line: usize,
    ignored_trades: &mut usize,
) -> Result<Option<CanonicalRecord>, RowError> {
    use statement::*;

    let description = field(row, DESCRIPTION);
    let product = field(row, PRODUCT);
    let kind = classify(description, !product.is_empty());

    match kind {
        StatementLine::Trade | StatementLine::TradeCost => {
            *ignored_trades += 1;
            return Ok(None);
        }
        StatementLine::Currency => return Ok(None),
        StatementLine::Unsupported => {
            return Err(RowError::UnsupportedType(description.to_string()));
        }
        _ => {}
    }

    let date = combine_date_time(field(row, DATE), field(row, TIME))?;
    let currency = non_empty(field(row, CURRENCY)).unwrap_or_else(|| String::from("EUR"));
    let amount = parse_decimal(field(row, AMOUNT), "amount")?;

    let (transaction_type, amount, tax) = match kind {
        StatementLine::Dividend => {
            if amount <= Decimal::ZERO {
                return Err(RowError::InvalidNumber {
                    field: "dividend amount",
                    value: field(row, AMOUNT).to_string(),
                });
            }
            (TransactionType::Dividend, amount, Decimal::ZERO)
        }
        StatementLine::Withholding => {
            (TransactionType::Dividend, -amount.abs(), amount.abs())
        }
        StatementLine::Fee => (TransactionType::Fee, -amount.abs(), Decimal::ZERO),
        StatementLine::Deposit => (TransactionType::Deposit, amount.abs(), Decimal::ZERO),
        StatementLine::Withdrawal => (TransactionType::Withdrawal, -amount.abs(), Decimal::ZERO),
        StatementLine::Interest if amount < Decimal::ZERO => {
            (TransactionType::Fee, amount, Decimal::ZERO)
        }
        _ => (TransactionType::Dividend, amount, Decimal::ZERO),
    };

    let instrument = match kind {
        StatementLine::Dividend | StatementLine::Withholding => Some(InstrumentRef {
            isin: non_empty(field(row, ISIN)),
            symbol: None,
            name: product.to_string(),
            market_code: None,
            mic: None,
            currency: currency.clone(),
            asset_type: AssetType::Stock,
        }),
        _ => None,
    }
    .filter(|instrument| instrument.isin.is_some() || !instrument.name.is_empty());

    let mut record =
        CanonicalRecord::cash(line, transaction_type, date, amount, &currency, description);
    record.instrument = instrument;
    record.tax = tax;
    record.external_id = non_empty(field(row, ORDER_ID));

    Ok(Some(record))
}
