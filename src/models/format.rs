use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, Display, EnumString, EnumIter, AsRefStr, Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormatTag {
    Degiro,
    Ibkr,
    RevolutFiat,
    RevolutX,
    Unknown,
}

impl FormatTag {
    /// Value stored in `transactions.source` for rows imported from this format.
    pub fn source_tag(&self) -> &'static str {
        match self {
            FormatTag::Degiro => "CSV_DEGIRO",
            FormatTag::Ibkr => "CSV_IBKR",
            FormatTag::RevolutFiat => "CSV_REVOLUT",
            FormatTag::RevolutX => "CSV_REVOLUT_X",
            FormatTag::Unknown => "CSV",
        }
    }
}
