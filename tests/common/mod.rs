#![allow(dead_code)]

use async_trait::async_trait;
use payment_gateway::application::Gateway;
use payment_gateway::application::transaction_service::CreateTransaction;
use payment_gateway::domain::account::{AccountId, Amount};
use payment_gateway::domain::invoice::{CreditCard, Invoice, InvoiceId};
use payment_gateway::domain::ports::{InvoiceStore, InvoiceStoreRef};
use payment_gateway::domain::risk::{Decision, RiskPolicy};
use payment_gateway::error::{GatewayError, Result};
use payment_gateway::infrastructure::in_memory::{InMemoryAccountStore, InMemoryInvoiceStore};
use payment_gateway::infrastructure::in_memory_queue::{TopicReader, topic};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Risk policy with a fixed answer for amounts up to the threshold.
pub struct Fixed {
    pub inline: Decision,
    pub threshold: Decimal,
}

impl RiskPolicy for Fixed {
    fn decide(&self, amount: Amount) -> Decision {
        if amount.value() > self.threshold {
            Decision::Defer
        } else {
            self.inline
        }
    }
}

pub fn fixed(inline: Decision) -> Arc<Fixed> {
    Arc::new(Fixed {
        inline,
        threshold: Decimal::from(10000),
    })
}

/// Invoice store whose inserts can be switched off.
pub struct FlakyInvoiceStore {
    inner: InMemoryInvoiceStore,
    pub fail_inserts: AtomicBool,
}

impl FlakyInvoiceStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryInvoiceStore::new(),
            fail_inserts: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl InvoiceStore for FlakyInvoiceStore {
    async fn insert(&self, invoice: Invoice) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(GatewayError::InternalError("disk full".into()));
        }
        self.inner.insert(invoice).await
    }

    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_account_id(&self, account_id: AccountId) -> Result<Vec<Invoice>> {
        self.inner.find_by_account_id(account_id).await
    }

    async fn update_status(&self, invoice: &Invoice) -> Result<bool> {
        self.inner.update_status(invoice).await
    }
}

/// In-memory gateway plus the reader side of its deferral topic.
pub fn gateway(policy: Arc<dyn RiskPolicy>) -> (Gateway, TopicReader) {
    gateway_with_invoices(policy, Arc::new(InMemoryInvoiceStore::new()))
}

pub fn gateway_with_invoices(
    policy: Arc<dyn RiskPolicy>,
    invoices: InvoiceStoreRef,
) -> (Gateway, TopicReader) {
    let (writer, reader) = topic("pending_transactions");
    let gateway = Gateway::new(
        Arc::new(InMemoryAccountStore::new()),
        invoices,
        policy,
        Arc::new(writer),
    );
    (gateway, reader)
}

pub fn charge(api_key: &str, amount: Decimal) -> CreateTransaction {
    CreateTransaction {
        api_key: api_key.to_string(),
        amount,
        description: "Order".to_string(),
        payment_type: "credit_card".to_string(),
        card: CreditCard::new("4111 1111 1111 1234"),
    }
}

pub fn write_requests(path: &Path, rows: &[&[&str]]) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record([
        "type",
        "account",
        "email",
        "reference",
        "amount",
        "description",
        "payment_type",
        "card_number",
        "status",
    ])?;
    for row in rows {
        wtr.write_record(*row)?;
    }

    wtr.flush()?;
    Ok(())
}
