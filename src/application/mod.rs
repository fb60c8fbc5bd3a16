//! Application layer orchestrating the domain against the ports.
//!
//! `TransactionService` is the entry point for charges, `AccountService` for
//! accounts, and `ResolutionBridge` drives deferred charges to a final status
//! from the verdict topic.

pub mod account_service;
pub mod resolution;
pub mod transaction_service;
pub mod views;

use crate::domain::ports::{AccountStoreRef, EventPublisherRef, InvoiceStoreRef};
use crate::domain::risk::RiskPolicyRef;
use account_service::AccountService;
use transaction_service::TransactionService;

/// The services of one gateway process, wired once at startup.
#[derive(Clone)]
pub struct Gateway {
    pub accounts: AccountService,
    pub transactions: TransactionService,
}

impl Gateway {
    pub fn new(
        account_store: AccountStoreRef,
        invoice_store: InvoiceStoreRef,
        risk: RiskPolicyRef,
        publisher: EventPublisherRef,
    ) -> Self {
        let accounts = AccountService::new(account_store);
        let transactions =
            TransactionService::new(accounts.clone(), invoice_store, risk, publisher);
        Self {
            accounts,
            transactions,
        }
    }
}
