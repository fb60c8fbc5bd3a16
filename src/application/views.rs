//! Output shapes handed to a presentation layer.

use crate::domain::account::{Account, AccountId};
use crate::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AccountView {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub api_key: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            api_key: account.api_key,
            balance: account.balance.value(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct InvoiceView {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub description: String,
    pub payment_type: String,
    pub card_last_digits: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            account_id: invoice.account_id,
            amount: invoice.amount.value(),
            status: invoice.status,
            description: invoice.description,
            payment_type: invoice.payment_type,
            card_last_digits: invoice.card_last_digits,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}
