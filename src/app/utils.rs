use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::RowError;

const CURRENCY_SYMBOLS: [(char, &str); 3] = [('€', "EUR"), ('$', "USD"), ('£', "GBP")];

const SPANISH_MONTHS: [(&str, &str); 24] = [
    ("enero", "Jan"),
    ("febrero", "Feb"),
    ("marzo", "Mar"),
    ("abril", "Apr"),
    ("mayo", "May"),
    ("junio", "Jun"),
    ("julio", "Jul"),
    ("agosto", "Aug"),
    ("septiembre", "Sep"),
    ("octubre", "Oct"),
    ("noviembre", "Nov"),
    ("diciembre", "Dec"),
    ("ene", "Jan"),
    ("abr", "Apr"),
    ("ago", "Aug"),
    ("sept", "Sep"),
    ("set", "Sep"),
    ("dic", "Dec"),
    ("feb", "Feb"),
    ("mar", "Mar"),
    ("may", "May"),
    ("jun", "Jun"),
    ("jul", "Jul"),
    ("oct", "Oct"),
];

const DATE_FORMATS: [&str; 6] = [
    "%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d %b %Y", "%b %d %Y",
];

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
];

/// Parses a number written with any of the common European or US
/// conventions: `1.234,56`, `1,234.56`, `-0,5`, `€1,200.00`, `(12.50)`.
pub fn parse_locale_decimal(field: &str) -> Option<Decimal> {
    let mut text: String = field
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\'')
        .filter(|c| !CURRENCY_SYMBOLS.iter().any(|(symbol, _)| symbol == c))
        .collect();

    for (_, code) in CURRENCY_SYMBOLS {
        if let Some(stripped) = text.strip_suffix(code).or_else(|| text.strip_prefix(code)) {
            text = stripped.to_string();
        }
    }

    if text.is_empty() {
        return None;
    }

    let negative_parens = text.starts_with('(') && text.ends_with(')');
    if negative_parens {
        text = text[1..text.len() - 1].to_string();
    }

    let normalized = match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (Some(_), None) => {
            if text.matches(',').count() > 1 {
                text.replace(',', "")
            } else {
                text.replace(',', ".")
            }
        }
        (None, Some(_)) if text.matches('.').count() > 1 => text.replace('.', ""),
        _ => text,
    };

    let value = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()?;
    Some(if negative_parens { -value } else { value })
}

pub fn parse_decimal(field: &str, field_name: &'static str) -> Result<Decimal, RowError> {
    parse_locale_decimal(field).ok_or_else(|| RowError::InvalidNumber {
        field: field_name,
        value: field.to_string(),
    })
}

/// Like [`parse_decimal`], but a blank cell means zero.
pub fn parse_decimal_or_zero(field: &str, field_name: &'static str) -> Result<Decimal, RowError> {
    if field.trim().is_empty() || field.trim() == "-" || field.trim() == "--" {
        return Ok(Decimal::ZERO);
    }
    parse_decimal(field, field_name)
}

/// `price * quantity` for rows that leave their value column blank. A product
/// outside the `Decimal` range is a bad row, not a panic.
pub fn gross_value(price: Decimal, quantity: Decimal) -> Result<Decimal, RowError> {
    price
        .checked_mul(quantity)
        .map(|gross| gross.abs())
        .ok_or_else(|| RowError::InvalidNumber {
            field: "value",
            value: format!("{} x {}", price, quantity),
        })
}

/// Currency code implied by a leading or trailing currency symbol.
pub fn currency_from_symbol(field: &str) -> Option<&'static str> {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| field.contains(*symbol))
        .map(|(_, code)| *code)
}

/// Rewrites Spanish month names to English abbreviations so chrono's `%b`
/// understands them. Trailing dots on abbreviations are dropped.
pub fn translate_spanish_months(field: &str) -> String {
    field
        .split(' ')
        .map(|token| {
            let core = token.trim_end_matches([',', '.']);
            let tail = &token[core.len()..];
            let tail = tail.trim_start_matches('.');
            let lower = core.to_lowercase();
            match SPANISH_MONTHS.iter().find(|(es, _)| *es == lower) {
                Some((_, en)) => format!("{}{}", en, tail),
                None => token.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_date(field: &str) -> Result<NaiveDate, RowError> {
    let text = translate_spanish_months(field.trim());
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
        .ok_or_else(|| RowError::InvalidDate(field.to_string()))
}

pub fn parse_time(field: &str) -> Option<NaiveTime> {
    let text = field.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Parses a combined date-time cell; commas between date and time are
/// accepted (`2024-03-01, 10:15:00`, `5 Ene 2024, 14:02:11`). A bare date
/// becomes midnight.
pub fn parse_datetime(field: &str) -> Result<NaiveDateTime, RowError> {
    let text = translate_spanish_months(field.trim()).replace(", ", " ").replace(',', " ");
    if let Some(datetime) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&text, format).ok())
    {
        return Ok(datetime);
    }
    parse_date(&text)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| RowError::InvalidDate(field.to_string()))
}

/// Date and time from two separate cells. An unreadable time falls back to
/// midnight; an unreadable date is an error.
pub fn combine_date_time(date: &str, time: &str) -> Result<NaiveDateTime, RowError> {
    let date = parse_date(date)?;
    Ok(date.and_time(parse_time(time).unwrap_or(NaiveTime::MIN)))
}

/// `CRYPTO:<SYMBOL>` identifier for instruments that have no ISIN.
pub fn crypto_pseudo_isin(symbol: &str) -> String {
    format!("CRYPTO:{}", symbol.trim().to_uppercase())
}

pub fn non_empty(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
