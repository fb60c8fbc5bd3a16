//! Message-queue payloads exchanged with the external fraud-analysis process.
//!
//! Both are flat JSON objects. Unknown fields are ignored on the way in.

use super::account::{AccountId, Amount};
use super::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Published once for every invoice the risk policy defers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DeferralEvent {
    pub account_id: AccountId,
    pub invoice_id: InvoiceId,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
}

impl DeferralEvent {
    pub fn for_invoice(invoice: &Invoice) -> Self {
        Self {
            account_id: invoice.account_id,
            invoice_id: invoice.id,
            amount: invoice.amount,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Final status a verdict may carry. `pending` is not a verdict.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Approved,
    Rejected,
}

impl From<VerdictStatus> for InvoiceStatus {
    fn from(status: VerdictStatus) -> Self {
        match status {
            VerdictStatus::Approved => InvoiceStatus::Approved,
            VerdictStatus::Rejected => InvoiceStatus::Rejected,
        }
    }
}

/// The analysis process's decision for a deferred invoice.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VerdictEvent {
    pub invoice_id: InvoiceId,
    pub status: VerdictStatus,
}

impl VerdictEvent {
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
