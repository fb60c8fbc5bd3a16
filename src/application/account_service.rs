use super::views::AccountView;
use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::ports::AccountStoreRef;
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Opens accounts, looks them up and credits their balances.
#[derive(Clone)]
pub struct AccountService {
    accounts: AccountStoreRef,
}

impl AccountService {
    pub fn new(accounts: AccountStoreRef) -> Self {
        Self { accounts }
    }

    /// Opens an account with a zero balance. The returned view carries the
    /// generated API key.
    pub async fn open_account(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<AccountView> {
        let account = Account::new(name, email);
        if self
            .accounts
            .find_by_api_key(&account.api_key)
            .await?
            .is_some()
        {
            return Err(GatewayError::DuplicatedApiKey);
        }
        self.accounts.insert(account.clone()).await?;
        info!(account_id = %account.id, "account opened");
        Ok(account.into())
    }

    pub async fn find_by_api_key(&self, api_key: &str) -> Result<AccountView> {
        Ok(self.account_by_api_key(api_key).await?.into())
    }

    pub async fn find_by_id(&self, id: AccountId) -> Result<AccountView> {
        let account = self
            .accounts
            .find_by_id(id)
            .await?
            .ok_or(GatewayError::AccountNotFound)?;
        Ok(account.into())
    }

    /// Credits the account behind `api_key`. Used for administrative top-ups.
    ///
    /// A non-positive `amount` fails with `InvalidAmount` before the account
    /// is touched.
    pub async fn credit_balance(&self, api_key: &str, amount: Decimal) -> Result<AccountView> {
        let amount = Amount::new(amount)?;
        let account = self.account_by_api_key(api_key).await?;
        Ok(self.credit(account.id, amount).await?.into())
    }

    pub(crate) async fn account_by_api_key(&self, api_key: &str) -> Result<Account> {
        self.accounts
            .find_by_api_key(api_key)
            .await?
            .ok_or(GatewayError::AccountNotFound)
    }

    pub(crate) async fn credit(&self, id: AccountId, amount: Amount) -> Result<Account> {
        let account = self.accounts.credit(id, amount).await?;
        debug!(account_id = %id, %amount, balance = %account.balance.value(), "balance credited");
        Ok(account)
    }
}
