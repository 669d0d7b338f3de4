use async_trait::async_trait;

use crate::catalog::ToolCatalog;
use crate::error::ProviderError;
use crate::turns::Turn;

/// Translation layer between the canonical [`Turn`] model and one provider's
/// wire format.
///
/// `send` encodes the full conversation plus the catalog's tool declarations
/// into the provider's request shape, performs the call, and decodes the
/// reply into a canonical assistant [`Turn`]. Implementations preserve
/// provider-supplied tool-call ids and synthesize stable ones when the
/// provider omits them. Transport failures, non-success statuses, and
/// malformed payloads surface as [`ProviderError`]; adapters never retry.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> &str;

    fn model_id(&self) -> &str;

    async fn send(
        &self,
        conversation: &[Turn],
        catalog: &ToolCatalog,
    ) -> Result<Turn, ProviderError>;
}
