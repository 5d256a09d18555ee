pub mod asset_resolver;
pub mod importer;
pub mod market_codes;
pub mod reconciler;

pub use asset_resolver::{AssetResolver, EnrichReport, ManualMapping, ResolveRequest};
pub use importer::{ImportReport, Importer};
pub use reconciler::{AccountLocks, Inconsistency, RebuildReport, Reconciler};
