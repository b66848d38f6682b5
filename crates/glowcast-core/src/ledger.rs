// ── Prize ledger seam ──

use async_trait::async_trait;

use glowcast_api::LedgerClient;

use crate::error::CoreError;
use crate::model::PrizeUpdate;

/// External store of the prize pool.
#[async_trait]
pub trait PrizeLedger: Send + Sync {
    async fn record(&self, update: &PrizeUpdate) -> Result<(), CoreError>;
}

#[async_trait]
impl PrizeLedger for LedgerClient {
    async fn record(&self, update: &PrizeUpdate) -> Result<(), CoreError> {
        LedgerClient::deposit(self, update.slot.as_ref(), update.amount).await?;
        Ok(())
    }
}
