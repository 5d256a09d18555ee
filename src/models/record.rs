use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{AssetType, TransactionType};

/// What a broker file says about an instrument.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstrumentRef {
    pub isin: Option<String>,
    pub symbol: Option<String>,
    pub name: String,
    /// Broker exchange code, e.g. DeGiro `MAD` or IBKR `BM`.
    pub market_code: Option<String>,
    pub mic: Option<String>,
    pub currency: String,
    pub asset_type: AssetType,
}

impl InstrumentRef {
    /// Catalog key: ISIN when known, otherwise symbol and currency.
    pub fn key(&self) -> String {
        match (&self.isin, &self.symbol) {
            (Some(isin), _) => isin.clone(),
            (None, Some(symbol)) => format!("{}:{}", symbol, self.currency),
            (None, None) => format!("{}:{}", self.name, self.currency),
        }
    }
}

/// A parsed row in broker-neutral form, not yet bound to an account.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub line: usize,
    pub transaction_type: TransactionType,
    pub instrument: Option<InstrumentRef>,
    pub date: NaiveDateTime,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub amount: Decimal,
    pub currency: String,
    pub commission: Decimal,
    pub fees: Decimal,
    pub tax: Decimal,
    pub external_id: Option<String>,
    pub description: String,
}

impl CanonicalRecord {
    pub fn cash(
        line: usize,
        transaction_type: TransactionType,
        date: NaiveDateTime,
        amount: Decimal,
        currency: &str,
        description: &str,
    ) -> Self {
        Self {
            line,
            transaction_type,
            instrument: None,
            date,
            quantity: None,
            price: None,
            amount,
            currency: currency.to_string(),
            commission: Decimal::ZERO,
            fees: Decimal::ZERO,
            tax: Decimal::ZERO,
            external_id: None,
            description: description.to_string(),
        }
    }
}

/// Position implied by a statement, kept only to cross-check a rebuild.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HoldingHint {
    pub instrument: InstrumentRef,
    pub quantity: Decimal,
    pub total_cost: Option<Decimal>,
    pub basis: HintBasis,
}

/// Where a [`HoldingHint`] comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintBasis {
    /// The broker's own end-of-statement position for the whole account.
    BrokerReported,
    /// The net of the rows in one file. Only meaningful when that file holds
    /// the account's full history for the instrument.
    FileTotal,
}
