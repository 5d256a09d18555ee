use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

pub const ID_TYPE_ISIN: &str = "ID_ISIN";

/// One mapping request. Optional filters are left out of the body when
/// unset.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct MappingJob {
    id_type: String,
    id_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exch_code: Option<String>,
}

impl MappingJob {
    pub fn isin(isin: &str, currency: Option<&str>) -> Self {
        Self::new(
            ID_TYPE_ISIN.to_string(),
            isin.to_string(),
            currency.map(str::to_string),
            None,
        )
    }
}

/// Per-job entry in the mapping response: either `data`, `warning` (no
/// match) or `error`.
#[derive(Debug, Deserialize, Getters)]
pub struct MappingResult {
    data: Option<Vec<FigiCandidate>>,
    warning: Option<String>,
    error: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct FigiCandidate {
    ticker: Option<String>,
    exch_code: Option<String>,
    mic_code: Option<String>,
    name: Option<String>,
    security_type: Option<String>,
}

impl FigiCandidate {
    pub fn has_ticker(&self) -> bool {
        self.ticker
            .as_deref()
            .map(|ticker| !ticker.trim().is_empty())
            .unwrap_or(false)
    }
}
