use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ParsedStatement, StatementParser, csv_reader, line_of};
use crate::{
    app::utils::{non_empty, parse_datetime, parse_decimal, parse_decimal_or_zero},
    errors::{ParseError, RowError},
    models::{CanonicalRecord, FormatTag, TransactionType},
};

#[derive(Debug, Deserialize)]
struct RevolutRow {
    #[serde(rename = "Type")]
    txn_type: String,
    #[serde(rename = "Product", default)]
    product: String,
    #[serde(rename = "Started Date", default)]
    started_date: String,
    #[serde(rename = "Completed Date", default)]
    completed_date: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Fee", default)]
    fee: String,
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "State")]
    state: String,
}

/// Revolut current-account statement. Only cash flows that matter to a
/// portfolio ledger are kept; spending is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct RevolutParser;

impl StatementParser for RevolutParser {
    fn format(&self) -> FormatTag {
        FormatTag::RevolutFiat
    }

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError> {
        let mut reader = csv_reader(text.trim_start_matches('\u{feff}'), true);
        let headers = reader.headers()?.clone();
        let mut statement = ParsedStatement::new(FormatTag::RevolutFiat);
        let mut ignored = 0usize;

        for record in reader.records() {
            let record = record?;
            let line = line_of(&record);
            let row: RevolutRow = match record.deserialize(Some(&headers)) {
                Ok(row) => row,
                Err(error) => {
                    statement.note(line, format!("unreadable row: {}", error));
                    continue;
                }
            };

            if !row.state.trim().eq_ignore_ascii_case("COMPLETED") {
                continue;
            }

            match to_record(&row, line) {
                Ok(Some(record)) => statement.records.push(record),
                Ok(None) => ignored += 1,
                Err(error) => statement.skip(line, error),
            }
        }

        if ignored > 0 {
            statement.note(
                0,
                format!("{} card payment, refund or exchange row(s) ignored", ignored),
            );
        }

        Ok(statement)
    }
}

fn to_record(row: &RevolutRow, line: usize) -> Result<Option<CanonicalRecord>, RowError> {
    let amount = parse_decimal(&row.amount, "amount")?;
    let fee = parse_decimal_or_zero(&row.fee, "fee")?.abs();
    let kind = row.txn_type.trim().to_lowercase().replace('_', " ");

    let transaction_type = match kind.as_str() {
        "topup" | "deposit" => TransactionType::Deposit,
        "transfer" if amount >= Decimal::ZERO => TransactionType::Deposit,
        "transfer" | "withdrawal" | "atm" => TransactionType::Withdrawal,
        "fee" | "charge" => TransactionType::Fee,
        "interest" | "cashback" | "reward" => TransactionType::Dividend,
        "card payment" | "card refund" | "refund" | "exchange" => return Ok(None),
        _ => return Err(RowError::UnsupportedType(row.txn_type.clone())),
    };

    let raw_date = non_empty(&row.completed_date)
        .or_else(|| non_empty(&row.started_date))
        .ok_or(RowError::MissingField("Completed Date"))?;
    let date = parse_datetime(&raw_date)?;

    let amount = match transaction_type {
        TransactionType::Deposit | TransactionType::Dividend => amount.abs(),
        _ => -amount.abs(),
    };
    let description = if row.description.trim().is_empty() {
        format!("{} ({})", row.txn_type.trim(), row.product.trim())
    } else {
        row.description.trim().to_string()
    };

    let mut record = CanonicalRecord::cash(
        line,
        transaction_type,
        date,
        amount,
        row.currency.trim(),
        &description,
    );
    record.fees = fee;
    Ok(Some(record))
}
