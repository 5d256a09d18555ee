pub mod openfigi;
pub mod openfigi_dto;
pub mod utils;

use async_trait::async_trait;

use crate::errors::ResolveError;

pub use openfigi::OpenFigiApi;
pub use openfigi_dto::{FigiCandidate, MappingJob};

/// External identifier-to-listing lookup. Implementations throttle
/// themselves; callers only see candidates or a [`ResolveError`].
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup(&self, job: &MappingJob) -> Result<Vec<FigiCandidate>, ResolveError>;
}
