use std::collections::HashSet;

use csv::ReaderBuilder;

use crate::models::FormatTag;

const DETECTION_LINES: usize = 10;

const IBKR_MARKERS: [&str; 3] = [
    "BrokerName",
    "Account Information",
    "Información sobre la cuenta",
];

const REVOLUT_X_COLUMNS: [&str; 7] = ["symbol", "type", "quantity", "price", "value", "fees", "date"];

const REVOLUT_FIAT_COLUMNS: [&str; 8] = [
    "type",
    "product",
    "started date",
    "completed date",
    "description",
    "amount",
    "currency",
    "state",
];

const DEGIRO_COLUMNS: [[&str; 4]; 2] = [
    ["fecha", "hora", "producto", "isin"],
    ["date", "time", "product", "isin"],
];

/// Identifies the export format from its first lines. Column order does
/// not matter; a leading BOM is ignored. Never guesses: anything that does
/// not match a known signature is `Unknown`.
pub fn detect_format(text: &str) -> FormatTag {
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(DETECTION_LINES)
        .collect();

    let Some(first) = lines.first() else {
        return FormatTag::Unknown;
    };

    if first.starts_with("Statement,")
        || lines
            .iter()
            .any(|line| IBKR_MARKERS.iter().any(|marker| line.contains(marker)))
    {
        return FormatTag::Ibkr;
    }

    let fields = header_fields(first);
    if fields.get(1).map(String::as_str) == Some("header") {
        return FormatTag::Ibkr;
    }

    let columns: HashSet<&str> = fields.iter().map(String::as_str).collect();
    let has_all = |wanted: &[&str]| wanted.iter().all(|column| columns.contains(column));

    if has_all(&REVOLUT_X_COLUMNS) {
        FormatTag::RevolutX
    } else if has_all(&REVOLUT_FIAT_COLUMNS) {
        FormatTag::RevolutFiat
    } else if DEGIRO_COLUMNS.iter().any(|set| has_all(set)) {
        FormatTag::Degiro
    } else {
        FormatTag::Unknown
    }
}

/// Lower-cased header cells, split on whichever common delimiter yields the
/// most columns.
fn header_fields(line: &str) -> Vec<String> {
    [b',', b';', b'\t']
        .iter()
        .map(|delimiter| {
            ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .delimiter(*delimiter)
                .from_reader(line.as_bytes())
                .records()
                .next()
                .and_then(Result::ok)
                .map(|record| {
                    record
                        .iter()
                        .map(|cell| cell.trim().trim_start_matches('\u{feff}').to_lowercase())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
        .max_by_key(Vec::len)
        .unwrap_or_default()
}
