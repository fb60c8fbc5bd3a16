use super::account_writer::AccountSummary;
use super::request_reader::{Request, RequestType};
use crate::application::Gateway;
use crate::application::transaction_service::CreateTransaction;
use crate::domain::events::VerdictEvent;
use crate::domain::invoice::{CreditCard, InvoiceId, InvoiceStatus};
use crate::error::{GatewayError, Result};
use crate::infrastructure::in_memory_queue::TopicWriter;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const DEFAULT_PAYMENT_TYPE: &str = "credit_card";

/// Applies replay rows to a gateway.
///
/// Accounts are addressed by display name and invoices by the caller's
/// `reference`; this keeps the API keys and invoice ids the gateway generates
/// out of the input file. Verdict rows go onto `verdicts`, to be picked up by
/// whatever consumes that topic.
pub struct Replayer {
    gateway: Gateway,
    verdicts: Option<TopicWriter>,
    api_keys: BTreeMap<String, String>,
    references: HashMap<String, InvoiceId>,
}

impl Replayer {
    pub fn new(gateway: Gateway, verdicts: TopicWriter) -> Self {
        Self {
            gateway,
            verdicts: Some(verdicts),
            api_keys: BTreeMap::new(),
            references: HashMap::new(),
        }
    }

    pub async fn apply(&mut self, request: Request) -> Result<()> {
        match request.r#type {
            RequestType::Open => {
                let name = required(request.account, "account")?;
                if self.api_keys.contains_key(&name) {
                    return Err(GatewayError::ValidationError(format!(
                        "account {name} is already open"
                    )));
                }
                let email = request.email.unwrap_or_default();
                let account = self.gateway.accounts.open_account(&name, email).await?;
                self.api_keys.insert(name, account.api_key);
            }
            RequestType::Charge => {
                let api_key = self.api_key(request.account)?;
                let reference = required(request.reference, "reference")?;
                if self.references.contains_key(&reference) {
                    return Err(GatewayError::ValidationError(format!(
                        "reference {reference} is already used"
                    )));
                }
                let invoice = self
                    .gateway
                    .transactions
                    .create_transaction(CreateTransaction {
                        api_key,
                        amount: required(request.amount, "amount")?,
                        description: request.description.unwrap_or_default(),
                        payment_type: request
                            .payment_type
                            .unwrap_or_else(|| DEFAULT_PAYMENT_TYPE.to_string()),
                        card: CreditCard::new(request.card_number.unwrap_or_default()),
                    })
                    .await?;
                debug!(%reference, invoice_id = %invoice.id, status = %invoice.status, "charge replayed");
                self.references.insert(reference, invoice.id);
            }
            RequestType::Topup => {
                let api_key = self.api_key(request.account)?;
                let amount = required(request.amount, "amount")?;
                self.gateway
                    .accounts
                    .credit_balance(&api_key, amount)
                    .await?;
            }
            RequestType::Verdict => {
                let reference = required(request.reference, "reference")?;
                let invoice_id = *self.references.get(&reference).ok_or_else(|| {
                    GatewayError::ValidationError(format!("unknown reference {reference}"))
                })?;
                let status = required(request.status, "status")?;
                let verdicts = self.verdicts.as_ref().ok_or_else(|| {
                    GatewayError::PublishFailed("verdict topic is closed".to_string())
                })?;
                verdicts.send(&VerdictEvent { invoice_id, status })?;
            }
        }
        Ok(())
    }

    /// Drops the verdict topic writer so its consumer sees the end of input.
    pub fn close_verdicts(&mut self) {
        self.verdicts = None;
    }

    /// Balance and invoice counts of every opened account, ordered by name.
    pub async fn summaries(&self) -> Result<Vec<AccountSummary>> {
        let mut summaries = Vec::with_capacity(self.api_keys.len());
        for (name, api_key) in &self.api_keys {
            let account = self.gateway.accounts.find_by_api_key(api_key).await?;
            let invoices = self.gateway.transactions.list_transactions(api_key).await?;
            let count = |status: InvoiceStatus| {
                invoices.iter().filter(|i| i.status == status).count()
            };
            summaries.push(AccountSummary {
                account: name.clone(),
                balance: account.balance,
                approved: count(InvoiceStatus::Approved),
                rejected: count(InvoiceStatus::Rejected),
                pending: count(InvoiceStatus::Pending),
            });
        }
        Ok(summaries)
    }

    #[cfg(test)]
    fn api_keys(&self) -> &BTreeMap<String, String> {
        &self.api_keys
    }

    #[cfg(test)]
    fn invoice_id(&self, reference: &str) -> Option<InvoiceId> {
        self.references.get(reference).copied()
    }

    fn api_key(&self, account: Option<String>) -> Result<String> {
        let name = required(account, "account")?;
        self.api_keys
            .get(&name)
            .cloned()
            .ok_or(GatewayError::AccountNotFound)
    }
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| GatewayError::ValidationError(format!("missing {column}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::events::VerdictStatus;
    use crate::domain::ports::EventConsumer;
    use crate::domain::risk::{Decision, RiskPolicy};
    use crate::infrastructure::in_memory::{InMemoryAccountStore, InMemoryInvoiceStore};
    use crate::infrastructure::in_memory_queue::{TopicReader, topic};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct DeferAll;

    impl RiskPolicy for DeferAll {
        fn decide(&self, _amount: Amount) -> Decision {
            Decision::Defer
        }
    }

    struct Fixture {
        replayer: Replayer,
        deferrals: TopicReader,
        verdicts: TopicReader,
    }

    fn fixture() -> Fixture {
        let (deferral_writer, deferrals) = topic("pending_transactions");
        let (verdict_writer, verdicts) = topic("transaction_results");
        let gateway = Gateway::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryInvoiceStore::new()),
            Arc::new(DeferAll),
            Arc::new(deferral_writer),
        );
        Fixture {
            replayer: Replayer::new(gateway, verdict_writer),
            deferrals,
            verdicts,
        }
    }

    fn request(r#type: RequestType) -> Request {
        Request {
            r#type,
            account: None,
            email: None,
            reference: None,
            amount: None,
            description: None,
            payment_type: None,
            card_number: None,
            status: None,
        }
    }

    fn open(name: &str) -> Request {
        Request {
            account: Some(name.to_string()),
            ..request(RequestType::Open)
        }
    }

    fn charge(name: &str, reference: &str) -> Request {
        Request {
            account: Some(name.to_string()),
            reference: Some(reference.to_string()),
            amount: Some(dec!(42)),
            ..request(RequestType::Charge)
        }
    }

    #[tokio::test]
    async fn test_charge_and_verdict_by_reference() {
        let mut f = fixture();
        f.replayer.apply(open("alice")).await.unwrap();
        f.replayer.apply(charge("alice", "r1")).await.unwrap();
        assert_eq!(f.deferrals.drain().len(), 1);

        f.replayer
            .apply(Request {
                reference: Some("r1".to_string()),
                status: Some(VerdictStatus::Approved),
                ..request(RequestType::Verdict)
            })
            .await
            .unwrap();

        let sent = f.verdicts.try_receive().unwrap();
        let verdict = VerdictEvent::from_json(&sent).unwrap();
        assert_eq!(Some(verdict.invoice_id), f.replayer.invoice_id("r1"));
        assert_eq!(verdict.status, VerdictStatus::Approved);

        let summaries = f.replayer.summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].pending, 1);
        assert_eq!(summaries[0].balance, dec!(0));
    }

    #[tokio::test]
    async fn test_duplicate_names_and_references_rejected() {
        let mut f = fixture();
        f.replayer.apply(open("alice")).await.unwrap();
        assert!(matches!(
            f.replayer.apply(open("alice")).await,
            Err(GatewayError::ValidationError(_))
        ));

        f.replayer.apply(charge("alice", "r1")).await.unwrap();
        assert!(matches!(
            f.replayer.apply(charge("alice", "r1")).await,
            Err(GatewayError::ValidationError(_))
        ));
        assert_eq!(f.replayer.api_keys().len(), 1);
    }

    #[tokio::test]
    async fn test_verdict_after_close_fails() {
        let mut f = fixture();
        f.replayer.apply(open("alice")).await.unwrap();
        f.replayer.apply(charge("alice", "r1")).await.unwrap();
        f.replayer.close_verdicts();

        let result = f
            .replayer
            .apply(Request {
                reference: Some("r1".to_string()),
                status: Some(VerdictStatus::Rejected),
                ..request(RequestType::Verdict)
            })
            .await;
        assert!(matches!(result, Err(GatewayError::PublishFailed(_))));
        assert_eq!(f.verdicts.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_columns() {
        let mut f = fixture();
        assert!(matches!(
            f.replayer.apply(request(RequestType::Open)).await,
            Err(GatewayError::ValidationError(_))
        ));
        assert!(matches!(
            f.replayer.apply(charge("ghost", "r1")).await,
            Err(GatewayError::AccountNotFound)
        ));
    }
}
