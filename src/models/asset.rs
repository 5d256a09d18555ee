use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Getters, new)]
pub struct Asset {
    id: i64,
    isin: Option<String>,
    symbol: Option<String>,
    name: String,
    asset_type: AssetType,
    currency: String,
    exchange: Option<String>,
    mic: Option<String>,
    quote_suffix: Option<String>,
    last_price: Option<Decimal>,
    last_price_updated_at: Option<NaiveDateTime>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AssetType {
    Stock,
    ETF,
    Bond,
    Crypto,
    Commodity,
    Other,
}

impl Asset {
    /// Ticker as the quote provider expects it, e.g. `SAN.MC` or `BTC-EUR`.
    pub fn quote_ticker(&self) -> Option<String> {
        self.symbol.as_ref().map(|symbol| {
            format!("{}{}", symbol, self.quote_suffix.as_deref().unwrap_or(""))
        })
    }
}

impl AssetType {
    pub fn from_str(s: &str) -> Result<AssetType> {
        match s {
            "Stock" => Ok(AssetType::Stock),
            "ETF" => Ok(AssetType::ETF),
            "Bond" => Ok(AssetType::Bond),
            "Crypto" => Ok(AssetType::Crypto),
            "Commodity" => Ok(AssetType::Commodity),
            "Other" => Ok(AssetType::Other),
            _ => Err(anyhow!("Unknown asset type '{}'", s)),
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            AssetType::Stock => "Stock",
            AssetType::ETF => "ETF",
            AssetType::Bond => "Bond",
            AssetType::Crypto => "Crypto",
            AssetType::Commodity => "Commodity",
            AssetType::Other => "Other",
        }
    }

    /// Maps a lookup `securityType` / `securityType2` label.
    pub fn from_security_type(label: &str) -> AssetType {
        let label = label.to_ascii_lowercase();
        if label.contains("etf") || label.contains("exchange traded") || label.contains("etp") {
            AssetType::ETF
        } else if label.contains("bond") || label.contains("note") {
            AssetType::Bond
        } else if label.contains("crypto") {
            AssetType::Crypto
        } else {
            AssetType::Stock
        }
    }
}
