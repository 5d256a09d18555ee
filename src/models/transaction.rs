use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Clone, Debug, PartialEq, Getters, Serialize, new)]
pub struct Transaction {
    id: i64,
    account_id: i64,
    asset_id: Option<i64>,
    transaction_type: TransactionType,
    date: NaiveDateTime,
    quantity: Option<Decimal>,
    price: Option<Decimal>,
    amount: Decimal,
    currency: String,
    commission: Decimal,
    fees: Decimal,
    tax: Decimal,
    source: String,
    external_id: Option<String>,
    description: String,
    fingerprint: String,
}

impl Transaction {
    /// Quantity with the sign of its effect on the position.
    pub fn signed_quantity(&self) -> Decimal {
        let quantity = self.quantity.unwrap_or(Decimal::ZERO).abs();
        match self.transaction_type {
            TransactionType::Buy | TransactionType::StakingReward => quantity,
            TransactionType::Sell => -quantity,
            _ => Decimal::ZERO,
        }
    }

    /// Acquisition cost of a BUY: gross amount plus every charge. `None`
    /// when the sum leaves the `Decimal` range.
    pub fn buy_cost(&self) -> Option<Decimal> {
        match self.transaction_type {
            TransactionType::StakingReward => Some(Decimal::ZERO),
            _ => self.amount.abs().checked_add(self.charges()?),
        }
    }

    /// Net proceeds of a SELL.
    pub fn sell_proceeds(&self) -> Option<Decimal> {
        self.amount.abs().checked_sub(self.charges()?)
    }

    fn charges(&self) -> Option<Decimal> {
        self.commission
            .abs()
            .checked_add(self.fees.abs())?
            .checked_add(self.tax.abs())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Display, EnumString, AsRefStr, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
    Dividend,
    Fee,
    Commission,
    Deposit,
    Withdrawal,
    StakingReward,
}

impl TransactionType {
    pub fn parse_str(s: &str) -> Result<TransactionType> {
        TransactionType::from_str(s).with_context(|| format!("Unknown transaction type '{}'", s))
    }

    pub fn to_str(&self) -> &str {
        self.as_ref()
    }

    /// Types that move units in or out of a position.
    pub fn is_position_change(&self) -> bool {
        matches!(
            self,
            TransactionType::Buy | TransactionType::Sell | TransactionType::StakingReward
        )
    }
}
