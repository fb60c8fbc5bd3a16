use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::domain::ports::{AccountStore, InvoiceStore};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for account rows, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family mapping API keys to account ids.
pub const CF_ACCOUNT_API_KEYS: &str = "account_api_keys";
/// Column Family for invoice rows, keyed by invoice id.
pub const CF_INVOICES: &str = "invoices";
/// Column Family indexing invoices by owner: `account id ++ invoice id`.
pub const CF_ACCOUNT_INVOICES: &str = "account_invoices";

/// How long a transaction waits for a row lock held by another one.
const LOCK_TIMEOUT_MS: i64 = 10_000;

/// A persistent store implementation using a RocksDB `TransactionDB`.
///
/// Serves both `AccountStore` and `InvoiceStore` from separate Column
/// Families. Writes that must see a consistent row (credits, status updates,
/// unique API keys) run inside a pessimistic transaction that locks the row
/// with `get_for_update`; dropping an uncommitted transaction rolls it back.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(LOCK_TIMEOUT_MS);

        let descriptors = [
            CF_ACCOUNTS,
            CF_ACCOUNT_API_KEYS,
            CF_INVOICES,
            CF_ACCOUNT_INVOICES,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = TransactionDB::open_cf_descriptors(&opts, &txn_opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Runs `f` on the blocking pool, where waiting for a row lock cannot
    /// stall the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&TransactionDB) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| GatewayError::InternalError(Box::new(e)))?
    }
}

fn handle<'a>(db: &'a TransactionDB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        GatewayError::InternalError(Box::new(std::io::Error::other(format!(
            "{} column family not found",
            name
        ))))
    })
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        GatewayError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        GatewayError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

fn owner_key(account_id: AccountId, invoice_id: InvoiceId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(invoice_id.as_bytes());
    key
}

fn account_by_id(db: &TransactionDB, id: AccountId) -> Result<Option<Account>> {
    let cf = handle(db, CF_ACCOUNTS)?;
    db.get_cf(cf, id.as_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn invoice_by_id(db: &TransactionDB, id: InvoiceId) -> Result<Option<Invoice>> {
    let cf = handle(db, CF_INVOICES)?;
    db.get_cf(cf, id.as_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn insert(&self, account: Account) -> Result<()> {
        self.blocking(move |db| {
            let accounts = handle(db, CF_ACCOUNTS)?;
            let api_keys = handle(db, CF_ACCOUNT_API_KEYS)?;

            let txn = db.transaction();
            if txn
                .get_for_update_cf(api_keys, account.api_key.as_bytes(), true)?
                .is_some()
            {
                return Err(GatewayError::DuplicatedApiKey);
            }
            txn.put_cf(api_keys, account.api_key.as_bytes(), account.id.as_bytes())?;
            txn.put_cf(accounts, account.id.as_bytes(), encode(&account)?)?;
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Account>> {
        let api_keys = handle(&self.db, CF_ACCOUNT_API_KEYS)?;
        let Some(id_bytes) = self.db.get_cf(api_keys, api_key.as_bytes())? else {
            return Ok(None);
        };
        let id = AccountId::from_slice(&id_bytes)
            .map_err(|e| GatewayError::InternalError(Box::new(e)))?;
        account_by_id(&self.db, id)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        account_by_id(&self.db, id)
    }

    async fn credit(&self, id: AccountId, amount: Amount) -> Result<Account> {
        self.blocking(move |db| {
            let accounts = handle(db, CF_ACCOUNTS)?;

            // SELECT ... FOR UPDATE: the row stays locked until commit or drop.
            let txn = db.transaction();
            let bytes = txn
                .get_for_update_cf(accounts, id.as_bytes(), true)?
                .ok_or(GatewayError::AccountNotFound)?;
            let mut account: Account = decode(&bytes)?;
            account.credit(amount)?;
            txn.put_cf(accounts, id.as_bytes(), encode(&account)?)?;
            txn.commit()?;
            Ok(account)
        })
        .await
    }
}

#[async_trait]
impl InvoiceStore for RocksDBStore {
    async fn insert(&self, invoice: Invoice) -> Result<()> {
        self.blocking(move |db| {
            let invoices = handle(db, CF_INVOICES)?;
            let owners = handle(db, CF_ACCOUNT_INVOICES)?;

            let txn = db.transaction();
            if txn
                .get_for_update_cf(invoices, invoice.id.as_bytes(), true)?
                .is_some()
            {
                return Err(GatewayError::ValidationError(format!(
                    "invoice {} already exists",
                    invoice.id
                )));
            }
            txn.put_cf(invoices, invoice.id.as_bytes(), encode(&invoice)?)?;
            txn.put_cf(owners, owner_key(invoice.account_id, invoice.id), b"")?;
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        invoice_by_id(&self.db, id)
    }

    async fn find_by_account_id(&self, account_id: AccountId) -> Result<Vec<Invoice>> {
        let owners = handle(&self.db, CF_ACCOUNT_INVOICES)?;
        let prefix: &[u8] = account_id.as_bytes();

        let mut found = Vec::new();
        let iter = self
            .db
            .iterator_cf(owners, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let invoice_id = InvoiceId::from_slice(&key[prefix.len()..])
                .map_err(|e| GatewayError::InternalError(Box::new(e)))?;
            if let Some(invoice) = invoice_by_id(&self.db, invoice_id)? {
                found.push(invoice);
            }
        }

        found.sort_by(|a: &Invoice, b: &Invoice| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_status(&self, invoice: &Invoice) -> Result<bool> {
        let id = invoice.id;
        let status = invoice.status;
        let updated_at = invoice.updated_at;
        self.blocking(move |db| {
            let invoices = handle(db, CF_INVOICES)?;

            let txn = db.transaction();
            let bytes = txn
                .get_for_update_cf(invoices, id.as_bytes(), true)?
                .ok_or(GatewayError::InvoiceNotFound(id))?;
            let mut stored: Invoice = decode(&bytes)?;
            if stored.status != InvoiceStatus::Pending {
                return Ok(false);
            }
            stored.status = status;
            stored.updated_at = updated_at;
            txn.put_cf(invoices, id.as_bytes(), encode(&stored)?)?;
            txn.commit()?;
            Ok(true)
        })
        .await
    }
}
