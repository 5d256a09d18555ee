pub mod account;
pub mod asset;
pub mod asset_registry;
pub mod format;
pub mod holding;
pub mod record;
pub mod transaction;

pub use account::BrokerAccount;
pub use asset::{Asset, AssetType};
pub use asset_registry::{EnrichmentSource, RegistryEntry, Resolution, ResolveOutcome};
pub use format::FormatTag;
pub use holding::PortfolioHolding;
pub use record::{CanonicalRecord, HintBasis, HoldingHint, InstrumentRef};
pub use transaction::{Transaction, TransactionType};
