use super::account_service::AccountService;
use super::views::InvoiceView;
use crate::domain::events::DeferralEvent;
use crate::domain::invoice::{CreditCard, Invoice, InvoiceId, InvoiceStatus};
use crate::domain::ports::{EventPublisherRef, InvoiceStoreRef};
use crate::domain::risk::{Decision, RiskPolicyRef};
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

/// A charge as submitted by a merchant.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub api_key: String,
    pub amount: Decimal,
    pub description: String,
    pub payment_type: String,
    pub card: CreditCard,
}

/// What a verdict did to its invoice.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResolutionOutcome {
    /// The invoice left `pending` with this status.
    Applied(InvoiceStatus),
    /// The invoice was already resolved; nothing changed.
    AlreadyResolved,
}

/// Coordinates account lookup, invoice creation, risk evaluation, crediting
/// and persistence for every charge.
///
/// Cloning is cheap; the inline request path and the verdict consumer share
/// one instance.
#[derive(Clone)]
pub struct TransactionService {
    accounts: AccountService,
    invoices: InvoiceStoreRef,
    risk: RiskPolicyRef,
    publisher: EventPublisherRef,
}

impl TransactionService {
    pub fn new(
        accounts: AccountService,
        invoices: InvoiceStoreRef,
        risk: RiskPolicyRef,
        publisher: EventPublisherRef,
    ) -> Self {
        Self {
            accounts,
            invoices,
            risk,
            publisher,
        }
    }

    /// Creates an invoice and decides it inline, or defers it.
    ///
    /// Approved charges are credited before the invoice is stored. If storing
    /// fails after that, the error is `ReconciliationRequired`. A deferred
    /// invoice is only stored once its deferral event has been published.
    pub async fn create_transaction(&self, request: CreateTransaction) -> Result<InvoiceView> {
        let account = self.accounts.account_by_api_key(&request.api_key).await?;
        let mut invoice = Invoice::new(
            account.id,
            request.amount,
            request.description,
            request.payment_type,
            &request.card,
        )?;

        let mut credited = false;
        match self.risk.decide(invoice.amount) {
            Decision::Defer => {
                // Published before the insert below. A verdict that arrives
                // before the insert finds no invoice and is skipped.
                let event = DeferralEvent::for_invoice(&invoice);
                if let Err(err) = self.publisher.publish_deferral(&event).await {
                    warn!(invoice_id = %invoice.id, error = %err, "deferral not published, transaction aborted");
                    return Err(err);
                }
                info!(
                    invoice_id = %invoice.id,
                    account_id = %invoice.account_id,
                    amount = %invoice.amount,
                    "transaction deferred for analysis"
                );
            }
            Decision::Approve => {
                invoice.resolve(InvoiceStatus::Approved)?;
                self.accounts.credit(account.id, invoice.amount).await?;
                credited = true;
            }
            Decision::Reject => invoice.resolve(InvoiceStatus::Rejected)?,
        }

        if let Err(err) = self.invoices.insert(invoice.clone()).await {
            if credited {
                error!(
                    invoice_id = %invoice.id,
                    account_id = %invoice.account_id,
                    amount = %invoice.amount,
                    error = %err,
                    "balance credited but invoice not persisted"
                );
                return Err(GatewayError::ReconciliationRequired {
                    invoice_id: invoice.id,
                    account_id: invoice.account_id,
                    amount: invoice.amount.value(),
                    source: Box::new(err),
                });
            }
            return Err(err);
        }

        info!(invoice_id = %invoice.id, status = %invoice.status, card = %invoice.card_last_digits, "transaction created");
        Ok(invoice.into())
    }

    /// Loads an invoice, provided it belongs to the account behind `api_key`.
    pub async fn get_transaction(&self, id: InvoiceId, api_key: &str) -> Result<InvoiceView> {
        let invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or(GatewayError::InvoiceNotFound(id))?;
        let account = self.accounts.account_by_api_key(api_key).await?;
        if invoice.account_id != account.id {
            return Err(GatewayError::UnauthorizedAccess);
        }
        Ok(invoice.into())
    }

    /// Every invoice of the account behind `api_key`, newest first.
    pub async fn list_transactions(&self, api_key: &str) -> Result<Vec<InvoiceView>> {
        let account = self.accounts.account_by_api_key(api_key).await?;
        let invoices = self.invoices.find_by_account_id(account.id).await?;
        Ok(invoices.into_iter().map(InvoiceView::from).collect())
    }

    /// Applies a verdict from the analysis process to a deferred invoice.
    ///
    /// A verdict for an invoice that is no longer `pending` is a duplicate and
    /// changes nothing. An approval credits the owning account once the new
    /// status is stored.
    pub async fn resolve_transaction_result(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<ResolutionOutcome> {
        let mut invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or(GatewayError::InvoiceNotFound(id))?;

        if invoice.status.is_terminal() {
            return Ok(ResolutionOutcome::AlreadyResolved);
        }
        invoice.resolve(status)?;

        // Another consumer may have resolved it between the read and here.
        if !self.invoices.update_status(&invoice).await? {
            return Ok(ResolutionOutcome::AlreadyResolved);
        }

        if invoice.status == InvoiceStatus::Approved
            && let Err(err) = self
                .accounts
                .credit(invoice.account_id, invoice.amount)
                .await
        {
            error!(
                invoice_id = %invoice.id,
                account_id = %invoice.account_id,
                amount = %invoice.amount,
                error = %err,
                "invoice approved but balance not credited"
            );
            return Err(GatewayError::ReconciliationRequired {
                invoice_id: invoice.id,
                account_id: invoice.account_id,
                amount: invoice.amount.value(),
                source: Box::new(err),
            });
        }

        Ok(ResolutionOutcome::Applied(invoice.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::ports::{EventConsumer, EventPublisher};
    use crate::domain::risk::RiskPolicy;
    use crate::infrastructure::in_memory::{InMemoryAccountStore, InMemoryInvoiceStore};
    use crate::infrastructure::in_memory_queue::{TopicReader, topic};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Always(Decision);

    impl RiskPolicy for Always {
        fn decide(&self, _amount: Amount) -> Decision {
            self.0
        }
    }

    struct Fixture {
        service: TransactionService,
        accounts: AccountService,
        deferrals: TopicReader,
    }

    fn fixture(decision: Decision) -> Fixture {
        let accounts = AccountService::new(Arc::new(InMemoryAccountStore::new()));
        let (writer, deferrals) = topic("pending_transactions");
        let publisher: Arc<dyn EventPublisher> = Arc::new(writer);
        let service = TransactionService::new(
            accounts.clone(),
            Arc::new(InMemoryInvoiceStore::new()),
            Arc::new(Always(decision)),
            publisher,
        );
        Fixture {
            service,
            accounts,
            deferrals,
        }
    }

    fn charge(api_key: &str, amount: Decimal) -> CreateTransaction {
        CreateTransaction {
            api_key: api_key.to_string(),
            amount,
            description: "Order".to_string(),
            payment_type: "credit_card".to_string(),
            card: CreditCard::new("4111111111111111"),
        }
    }

    #[tokio::test]
    async fn test_approved_transaction_credits_account() {
        let mut f = fixture(Decision::Approve);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();

        let invoice = f
            .service
            .create_transaction(charge(&account.api_key, dec!(50)))
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Approved);
        assert_eq!(invoice.card_last_digits, "1111");
        assert_eq!(
            f.accounts.find_by_id(account.id).await.unwrap().balance,
            dec!(50)
        );
        assert!(f.deferrals.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_rejected_transaction_leaves_balance() {
        let mut f = fixture(Decision::Reject);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();

        let invoice = f
            .service
            .create_transaction(charge(&account.api_key, dec!(50)))
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Rejected);
        assert_eq!(
            f.accounts.find_by_id(account.id).await.unwrap().balance,
            dec!(0)
        );
        assert!(f.deferrals.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_deferred_transaction_publishes_event() {
        let mut f = fixture(Decision::Defer);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();

        let invoice = f
            .service
            .create_transaction(charge(&account.api_key, dec!(15000)))
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        let payload = f.deferrals.receive().await.unwrap().unwrap();
        let event: DeferralEvent = serde_json::from_slice(&payload).unwrap();
        assert_eq!(event.invoice_id, invoice.id);
        assert_eq!(event.account_id, account.id);
        assert_eq!(event.amount.value(), dec!(15000));
        assert!(f.deferrals.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_publish_failure_aborts_creation() {
        let f = fixture(Decision::Defer);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();
        drop(f.deferrals);

        let result = f
            .service
            .create_transaction(charge(&account.api_key, dec!(15000)))
            .await;
        assert!(matches!(result, Err(GatewayError::PublishFailed(_))));
        assert!(
            f.service
                .list_transactions(&account.api_key)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_invalid_amount_has_no_side_effects() {
        let mut f = fixture(Decision::Approve);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();

        let result = f
            .service
            .create_transaction(charge(&account.api_key, dec!(0)))
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidAmount(_))));
        assert!(
            f.service
                .list_transactions(&account.api_key)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(f.deferrals.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_unknown_api_key() {
        let f = fixture(Decision::Approve);
        assert!(matches!(
            f.service.create_transaction(charge("nope", dec!(5))).await,
            Err(GatewayError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_get_transaction_checks_ownership() {
        let f = fixture(Decision::Reject);
        let owner = f.accounts.open_account("X", "x@example.com").await.unwrap();
        let other = f.accounts.open_account("Y", "y@example.com").await.unwrap();

        let invoice = f
            .service
            .create_transaction(charge(&owner.api_key, dec!(10)))
            .await
            .unwrap();

        let fetched = f
            .service
            .get_transaction(invoice.id, &owner.api_key)
            .await
            .unwrap();
        assert_eq!(fetched, invoice);
        assert!(matches!(
            f.service.get_transaction(invoice.id, &other.api_key).await,
            Err(GatewayError::UnauthorizedAccess)
        ));
        assert!(matches!(
            f.service
                .get_transaction(InvoiceId::new_v4(), &owner.api_key)
                .await,
            Err(GatewayError::InvoiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_deferred_approval_is_idempotent() {
        let f = fixture(Decision::Defer);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();
        let invoice = f
            .service
            .create_transaction(charge(&account.api_key, dec!(15000)))
            .await
            .unwrap();

        let first = f
            .service
            .resolve_transaction_result(invoice.id, InvoiceStatus::Approved)
            .await
            .unwrap();
        let second = f
            .service
            .resolve_transaction_result(invoice.id, InvoiceStatus::Approved)
            .await
            .unwrap();

        assert_eq!(first, ResolutionOutcome::Applied(InvoiceStatus::Approved));
        assert_eq!(second, ResolutionOutcome::AlreadyResolved);
        assert_eq!(
            f.accounts.find_by_id(account.id).await.unwrap().balance,
            dec!(15000)
        );
    }

    #[tokio::test]
    async fn test_resolve_deferred_rejection() {
        let f = fixture(Decision::Defer);
        let account = f.accounts.open_account("A", "a@example.com").await.unwrap();
        let invoice = f
            .service
            .create_transaction(charge(&account.api_key, dec!(20000)))
            .await
            .unwrap();

        let outcome = f
            .service
            .resolve_transaction_result(invoice.id, InvoiceStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(outcome, ResolutionOutcome::Applied(InvoiceStatus::Rejected));

        // A late approval must not flip a rejected invoice.
        let late = f
            .service
            .resolve_transaction_result(invoice.id, InvoiceStatus::Approved)
            .await
            .unwrap();
        assert_eq!(late, ResolutionOutcome::AlreadyResolved);
        let stored = f
            .service
            .get_transaction(invoice.id, &account.api_key)
            .await
            .unwrap();
        assert_eq!(stored.status, InvoiceStatus::Rejected);
        assert_eq!(
            f.accounts.find_by_id(account.id).await.unwrap().balance,
            dec!(0)
        );
    }

    #[tokio::test]
    async fn test_resolve_unknown_invoice() {
        let f = fixture(Decision::Defer);
        assert!(matches!(
            f.service
                .resolve_transaction_result(InvoiceId::new_v4(), InvoiceStatus::Approved)
                .await,
            Err(GatewayError::InvoiceNotFound(_))
        ));
    }
}
