use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::domain::ports::{AccountStore, InvoiceStore};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct AccountTable {
    rows: HashMap<AccountId, Arc<Mutex<Account>>>,
    by_api_key: HashMap<String, AccountId>,
}

/// A thread-safe in-memory store for accounts.
///
/// Every account row sits behind its own `Mutex`, so a credit locks only the
/// account it touches while other accounts stay available.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    table: Arc<RwLock<AccountTable>>,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn row(&self, id: AccountId) -> Option<Arc<Mutex<Account>>> {
        self.table.read().await.rows.get(&id).cloned()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let mut table = self.table.write().await;
        if table.by_api_key.contains_key(&account.api_key) {
            return Err(GatewayError::DuplicatedApiKey);
        }
        table.by_api_key.insert(account.api_key.clone(), account.id);
        table.rows.insert(account.id, Arc::new(Mutex::new(account)));
        Ok(())
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Account>> {
        let id = match self.table.read().await.by_api_key.get(api_key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        match self.row(id).await {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn credit(&self, id: AccountId, amount: Amount) -> Result<Account> {
        let row = self.row(id).await.ok_or(GatewayError::AccountNotFound)?;
        let mut account = row.lock().await;
        account.credit(amount)?;
        Ok(account.clone())
    }
}

/// A thread-safe in-memory store for invoices.
#[derive(Default, Clone)]
pub struct InMemoryInvoiceStore {
    invoices: Arc<RwLock<HashMap<InvoiceId, Invoice>>>,
}

impl InMemoryInvoiceStore {
    /// Creates a new, empty in-memory invoice store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn insert(&self, invoice: Invoice) -> Result<()> {
        let mut invoices = self.invoices.write().await;
        if invoices.contains_key(&invoice.id) {
            return Err(GatewayError::ValidationError(format!(
                "invoice {} already exists",
                invoice.id
            )));
        }
        invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        let invoices = self.invoices.read().await;
        Ok(invoices.get(&id).cloned())
    }

    async fn find_by_account_id(&self, account_id: AccountId) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        let mut owned: Vec<Invoice> = invoices
            .values()
            .filter(|invoice| invoice.account_id == account_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update_status(&self, invoice: &Invoice) -> Result<bool> {
        let mut invoices = self.invoices.write().await;
        let stored = invoices
            .get_mut(&invoice.id)
            .ok_or(GatewayError::InvoiceNotFound(invoice.id))?;
        if stored.status != InvoiceStatus::Pending {
            return Ok(false);
        }
        stored.status = invoice.status;
        stored.updated_at = invoice.updated_at;
        Ok(true)
    }
}
