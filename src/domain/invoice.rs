use super::account::{AccountId, Amount};
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type InvoiceId = Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Rejected,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvoiceStatus::Pending)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card details as submitted with a charge.
///
/// Only [`CreditCard::last_digits`] ever leaves this struct; the full number
/// and CVV are redacted from `Debug` output.
#[derive(Clone, Default, Deserialize)]
pub struct CreditCard {
    pub number: String,
    pub cvv: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cardholder_name: String,
}

impl CreditCard {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Default::default()
        }
    }

    /// The last four digits of the card number. Separators are ignored.
    pub fn last_digits(&self) -> String {
        let digits: Vec<char> = self.number.chars().filter(char::is_ascii_digit).collect();
        let start = digits.len().saturating_sub(4);
        digits[start..].iter().collect()
    }
}

impl fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreditCard")
            .field("number", &format_args!("****{}", self.last_digits()))
            .field("cvv", &"***")
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cardholder_name", &self.cardholder_name)
            .finish()
    }
}

/// A charge against an account, tracked through `pending -> approved | rejected`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Invoice {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub amount: Amount,
    pub status: InvoiceStatus,
    pub description: String,
    pub payment_type: String,
    pub card_last_digits: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds a `pending` invoice. Fails with `InvalidAmount` unless `amount > 0`.
    ///
    /// Only the last four digits of `card` are kept.
    pub fn new(
        account_id: AccountId,
        amount: Decimal,
        description: impl Into<String>,
        payment_type: impl Into<String>,
        card: &CreditCard,
    ) -> Result<Self> {
        let amount = Amount::new(amount)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            status: InvoiceStatus::Pending,
            description: description.into(),
            payment_type: payment_type.into(),
            card_last_digits: card.last_digits(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves a `pending` invoice to `status`.
    ///
    /// This is the only place an invoice status changes, for both inline
    /// decisions and verdicts consumed later.
    pub fn resolve(&mut self, status: InvoiceStatus) -> Result<()> {
        if self.status != InvoiceStatus::Pending || status == InvoiceStatus::Pending {
            return Err(GatewayError::InvalidStatusTransition {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
