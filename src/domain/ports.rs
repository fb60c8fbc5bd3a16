use super::account::{Account, AccountId, Amount};
use super::events::DeferralEvent;
use super::invoice::{Invoice, InvoiceId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: Account) -> Result<()>;
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Account>>;
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// Adds `amount` to the account's balance and returns the updated account.
    ///
    /// The read and the write happen under an exclusive lock on that account,
    /// released on every exit path. Fails with `AccountNotFound` if the account
    /// does not exist; on any other failure no partial update is visible.
    async fn credit(&self, id: AccountId, amount: Amount) -> Result<Account>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: Invoice) -> Result<()>;
    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>>;

    /// All invoices owned by `account_id`, newest first.
    async fn find_by_account_id(&self, account_id: AccountId) -> Result<Vec<Invoice>>;

    /// Persists the status and update time of `invoice`, but only if the
    /// stored row is still `pending`.
    ///
    /// Returns `Ok(false)` when the stored row was already resolved, and
    /// `InvoiceNotFound` when there is no such row.
    async fn update_status(&self, invoice: &Invoice) -> Result<bool>;
}

/// Outbound side of the message queue.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Fails with `PublishFailed` on any transport error.
    async fn publish_deferral(&self, event: &DeferralEvent) -> Result<()>;
}

/// Inbound side of the message queue.
///
/// Consumers are driven from a spawned task, hence `Sync`.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Waits for the next raw payload. `Ok(None)` means the source is closed
    /// and nothing more will arrive.
    async fn receive(&mut self) -> Result<Option<Vec<u8>>>;

    /// Marks the payload last returned by `receive` as handled. Until then a
    /// restarted consumer may see it again.
    async fn acknowledge(&mut self) -> Result<()> {
        Ok(())
    }
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type InvoiceStoreRef = Arc<dyn InvoiceStore>;
pub type EventPublisherRef = Arc<dyn EventPublisher>;
pub type EventConsumerBox = Box<dyn EventConsumer>;
