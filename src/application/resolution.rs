use super::transaction_service::{ResolutionOutcome, TransactionService};
use crate::domain::events::VerdictEvent;
use crate::domain::ports::EventConsumerBox;
use crate::error::GatewayError;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause after a failed receive before trying again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Resolves once `shutdown` reads `true` or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Counters for one run of the consumption loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionReport {
    pub applied: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub failed: u64,
}

/// Consumes verdicts and feeds them to [`TransactionService::resolve_transaction_result`].
///
/// One message is handled at a time and acknowledged once handled, so a
/// crash mid-message leaves it to be redelivered. A message that cannot be
/// decoded or applied is logged and skipped; only a shutdown signal or a
/// closed source ends the loop.
pub struct ResolutionBridge {
    service: TransactionService,
    consumer: EventConsumerBox,
    retry_delay: Duration,
}

impl ResolutionBridge {
    pub fn new(service: TransactionService, consumer: EventConsumerBox) -> Self {
        Self {
            service,
            consumer,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Runs until `shutdown` turns `true` (or its sender is dropped) or the
    /// source closes.
    ///
    /// Shutdown only interrupts the wait for the next message. A message
    /// already being applied runs to completion first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        info!("verdict consumer started");

        loop {
            let received = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => {
                    info!("verdict consumer shutting down");
                    break;
                }
                received = self.consumer.receive() => received,
            };

            match received {
                Ok(Some(payload)) => {
                    self.handle(&payload, &mut report).await;
                    if let Err(err) = self.consumer.acknowledge().await {
                        warn!(error = %err, "failed to acknowledge verdict");
                    }
                }
                Ok(None) => {
                    info!("verdict source closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "failed to receive verdict, retrying");
                    tokio::select! {
                        biased;
                        _ = stopped(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!(
            applied = report.applied,
            duplicates = report.duplicates,
            malformed = report.malformed,
            failed = report.failed,
            "verdict consumer stopped"
        );
        report
    }

    async fn handle(&self, payload: &[u8], report: &mut ResolutionReport) {
        let verdict = match VerdictEvent::from_json(payload) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, "skipping malformed verdict");
                report.malformed += 1;
                return;
            }
        };
        debug!(invoice_id = %verdict.invoice_id, status = ?verdict.status, "verdict received");

        match self
            .service
            .resolve_transaction_result(verdict.invoice_id, verdict.status.into())
            .await
        {
            Ok(ResolutionOutcome::Applied(status)) => {
                info!(invoice_id = %verdict.invoice_id, %status, "transaction resolved");
                report.applied += 1;
            }
            Ok(ResolutionOutcome::AlreadyResolved) => {
                info!(invoice_id = %verdict.invoice_id, "duplicate verdict ignored");
                report.duplicates += 1;
            }
            Err(err @ GatewayError::ReconciliationRequired { .. }) => {
                error!(invoice_id = %verdict.invoice_id, error = %err, "verdict needs reconciliation");
                report.failed += 1;
            }
            Err(err) => {
                warn!(invoice_id = %verdict.invoice_id, error = %err, "verdict skipped");
                report.failed += 1;
            }
        }
    }
}
