use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use rust_decimal::Decimal;
use serde::Serialize;

/// Derived position of one asset in one account. Only ever written by a
/// full rebuild.
#[derive(Clone, Debug, Eq, PartialEq, Getters, Serialize, new)]
pub struct PortfolioHolding {
    account_id: i64,
    asset_id: i64,
    quantity: Decimal,
    average_buy_price: Decimal,
    total_cost: Decimal,
    realized_pnl: Decimal,
    first_purchase_date: Option<NaiveDateTime>,
    last_transaction_date: Option<NaiveDateTime>,
    is_inconsistent: bool,
    shortfall: Decimal,
}
