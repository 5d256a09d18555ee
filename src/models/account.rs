use derive_getters::Getters;
use derive_new::new;
use serde::Serialize;

/// Name of the account created for manually tracked asset classes.
pub const SYNTHETIC_ACCOUNT_NAME: &str = "Commodities";

#[derive(Clone, Debug, Eq, PartialEq, Getters, Serialize, new)]
pub struct BrokerAccount {
    id: i64,
    user_id: i64,
    broker: String,
    name: String,
}
