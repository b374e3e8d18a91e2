//! The extraction capability contract.

use async_trait::async_trait;

use crate::error::ExtractResult;
use crate::types::document::{UserDocument, UserRef};

/// Context passed to every extraction job.
///
/// Carries at least the owning user; capabilities stamp documents with
/// this identity.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub user: UserRef,
}

impl ExtractContext {
    pub fn new(user: UserRef) -> Self {
        Self { user }
    }

    /// Build a context for a stored user.
    pub fn for_user(user: &UserDocument) -> Self {
        Self {
            user: user.user_ref(),
        }
    }
}

/// A pluggable strategy implementing extraction for one class of source.
///
/// `extract` performs side effects (network/process I/O, persistence) and
/// returns nothing on success. Failures are typed and surfaced; only
/// best-effort cleanup paths swallow errors.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract the content behind `link` on behalf of `ctx.user`.
    async fn extract(&self, link: &str, ctx: &ExtractContext) -> ExtractResult<()>;

    /// Platform tag for documents this capability produces.
    fn platform(&self) -> &str;
}
