pub mod degiro;
pub mod detector;
pub mod ibkr;
pub mod revolut;
pub mod revolut_x;

use std::{collections::BTreeMap, fmt};

use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{Encoding, WINDOWS_1252};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    errors::{ParseError, RowError},
    models::{CanonicalRecord, FormatTag, HintBasis, HoldingHint, TransactionType},
};

pub use degiro::DegiroParser;
pub use detector::detect_format;
pub use ibkr::IbkrParser;
pub use revolut::RevolutParser;
pub use revolut_x::RevolutXParser;

/// A row that was skipped, with the reason.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

impl ParseWarning {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ParsedStatement {
    pub format: FormatTag,
    pub records: Vec<CanonicalRecord>,
    pub holdings_hint: Vec<HoldingHint>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedStatement {
    pub fn new(format: FormatTag) -> Self {
        Self {
            format,
            records: Vec::new(),
            holdings_hint: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, line: usize, error: RowError) {
        warn!(format = %self.format, line, "Skipping row: {}", error);
        self.warnings.push(ParseWarning::new(line, error.to_string()));
    }

    pub(crate) fn note(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        debug!(format = %self.format, line, "{}", message);
        self.warnings.push(ParseWarning::new(line, message));
    }
}

/// One implementation per broker export format.
pub trait StatementParser: Send + Sync {
    fn format(&self) -> FormatTag;

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError>;
}

const PARSERS: [(FormatTag, &dyn StatementParser); 4] = [
    (FormatTag::Degiro, &DegiroParser),
    (FormatTag::Ibkr, &IbkrParser),
    (FormatTag::RevolutFiat, &RevolutParser),
    (FormatTag::RevolutX, &RevolutXParser),
];

pub fn parser_for(format: FormatTag) -> Option<&'static dyn StatementParser> {
    PARSERS
        .iter()
        .find(|(tag, _)| *tag == format)
        .map(|(_, parser)| *parser)
}

/// Decodes a raw export: UTF-8 (BOM stripped), UTF-16 with BOM, otherwise
/// Windows-1252 as a superset of Latin-1.
pub fn decode(bytes: &[u8]) -> Result<String, ParseError> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        if had_errors {
            return Err(ParseError::Encoding(format!(
                "invalid {} byte sequence",
                encoding.name()
            )));
        }
        return Ok(text.into_owned());
    }

    if bytes.contains(&0) {
        return Err(ParseError::Encoding(String::from(
            "binary content or UTF-16 without byte order mark",
        )));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            debug!("Input is not UTF-8, decoding as Windows-1252");
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Ok(text.into_owned())
        }
    }
}

/// Decode, detect and parse in one go.
pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedStatement, ParseError> {
    let text = decode(bytes)?;
    let format = detect_format(&text);
    let parser = parser_for(format).ok_or_else(|| {
        let preview: String = text.lines().next().unwrap_or("").chars().take(80).collect();
        ParseError::FormatDetection(format!("header '{}'", preview))
    })?;
    parser.parse(&text)
}

pub(crate) fn csv_reader(text: &str, has_headers: bool) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

pub(crate) fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

pub(crate) fn line_of(record: &StringRecord) -> usize {
    record
        .position()
        .map(|position| position.line() as usize)
        .unwrap_or(0)
}

/// Naive running position per instrument, used as a hint for formats that
/// carry no broker-computed positions. An instrument whose running totals
/// leave the `Decimal` range gets no hint.
pub(crate) fn aggregate_hints(records: &[CanonicalRecord]) -> Vec<HoldingHint> {
    let mut positions: BTreeMap<String, Option<HoldingHint>> = BTreeMap::new();

    for record in records {
        let (Some(instrument), Some(quantity)) = (&record.instrument, record.quantity) else {
            continue;
        };
        if !record.transaction_type.is_position_change() {
            continue;
        }

        let entry = positions.entry(instrument.key()).or_insert_with(|| {
            Some(HoldingHint {
                instrument: instrument.clone(),
                quantity: Decimal::ZERO,
                total_cost: Some(Decimal::ZERO),
                basis: HintBasis::FileTotal,
            })
        });
        let Some(hint) = entry.as_mut() else {
            continue;
        };
        if apply_to_hint(hint, record, quantity.abs()).is_none() {
            *entry = None;
        }
    }

    positions
        .into_values()
        .flatten()
        .filter(|hint| hint.quantity > Decimal::ZERO)
        .collect()
}

fn apply_to_hint(hint: &mut HoldingHint, record: &CanonicalRecord, quantity: Decimal) -> Option<()> {
    let held = hint.quantity;
    let cost = hint.total_cost.unwrap_or(Decimal::ZERO);

    match record.transaction_type {
        TransactionType::Sell => {
            let sold = quantity.min(held);
            let remaining_cost = if held.is_zero() || sold == held {
                Decimal::ZERO
            } else {
                cost.checked_sub(cost.checked_div(held)?.checked_mul(sold)?)?
            };
            hint.quantity = held.checked_sub(quantity)?;
            hint.total_cost = Some(remaining_cost);
        }
        TransactionType::StakingReward => {
            hint.quantity = held.checked_add(quantity)?;
        }
        _ => {
            hint.quantity = held.checked_add(quantity)?;
            let spent = record
                .amount
                .abs()
                .checked_add(record.commission)?
                .checked_add(record.fees)?;
            hint.total_cost = Some(cost.checked_add(spent)?);
        }
    }

    Some(())
}
