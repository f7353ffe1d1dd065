//! Transaction Engine
//!
//! Executes exactly one transaction: channel selection, the carrier
//! fallback state machine, payload preparation, result interpretation,
//! persistence triggering, and response delivery.
//!
//! # Channel selection
//!
//! A transaction whose configuration names a registered carrier delivery
//! package is offered to the carrier channel first. The carrier completes
//! asynchronously; the fallback decision and everything after it run from
//! inside that completion callback. When no carrier channel is registered,
//! or the carrier declined the job, the direct path runs synchronously on
//! the current context. Both paths converge on the same finalization step,
//! and the result sink is invoked exactly once per transaction.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::broadcast::AudienceDirectory;
use crate::carrier::{CarrierCallback, CarrierChannel, CarrierStatus, ChannelAttempt};
use crate::policy::{EmergencyContactNotifier, IdentityScope, NumberPolicy, PersistPolicy};
use crate::sink::{DeliveredResult, ResultCode, ResultSink};
use crate::store::MessageStore;
use crate::transaction::Transaction;
use crate::transport::TransportClient;

/// The engine's external collaborators.
///
/// Everything the engine touches beyond the transaction itself goes
/// through these seams, so hosts and tests swap implementations freely.
pub struct Services {
    pub store: Arc<dyn MessageStore>,
    pub transport: Arc<dyn TransportClient>,
    /// Carrier delivery channel, when the host registered one.
    pub carrier: Option<Arc<dyn CarrierChannel>>,
    pub sink: Arc<dyn ResultSink>,
    pub numbers: Arc<dyn NumberPolicy>,
    pub emergency: Arc<dyn EmergencyContactNotifier>,
    pub audience: Arc<dyn AudienceDirectory>,
    pub persist_policy: Arc<dyn PersistPolicy>,
    pub identity: Arc<dyn IdentityScope>,
}

/// Executes message transactions, one at a time.
///
/// The engine is cheap to clone; clones share the same collaborators. The
/// outer queue guarantees at most one concurrent attempt per transaction;
/// the engine guarantees a single result delivery per attempt.
#[derive(Clone)]
pub struct TransactionEngine {
    services: Arc<Services>,
}

impl TransactionEngine {
    /// Creates an engine over the given collaborators.
    pub fn new(services: Services) -> Self {
        TransactionEngine {
            services: Arc::new(services),
        }
    }

    /// Returns the engine's collaborators.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Executes one transaction. Invoked once; the outcome is delivered
    /// through the result sink, never returned.
    pub fn execute(&self, transaction: Transaction) {
        let carrier_app = transaction.ctx.config.carrier_app.clone();
        match (self.services.carrier.clone(), carrier_app) {
            (Some(channel), Some(package)) => {
                self.execute_by_carrier(channel, &package, transaction)
            }
            _ => self.execute_direct(transaction),
        }
    }

    /// Offers the transaction to the carrier delivery service. Completion —
    /// including a synthesized one for a failed bind — continues in
    /// [`TransactionEngine::on_carrier_complete`].
    fn execute_by_carrier(
        &self,
        channel: Arc<dyn CarrierChannel>,
        package: &str,
        transaction: Transaction,
    ) {
        let attempt = Arc::new(ChannelAttempt::new(channel.connect()));

        if !attempt.bind(package) {
            warn!(
                id = %transaction.ctx.id,
                package,
                "carrier service bind failed, treating as declined"
            );
            attempt.release();
            self.on_carrier_complete(transaction, CarrierStatus::RetryOnCarrierNetwork, None);
            return;
        }
        debug!(id = %transaction.ctx.id, package, "bound to carrier delivery service");

        let job = transaction.carrier_job();
        let engine = self.clone();
        let shared = Arc::clone(&attempt);
        let on_complete: CarrierCallback = Box::new(move |outcome| {
            // Release before anything else: every completion variant must
            // free the binding exactly once.
            shared.release();
            match transaction.accept_carrier_outcome(&outcome) {
                Some((status, response)) => {
                    engine.on_carrier_complete(transaction, status, response)
                }
                // Mismatched completion kind, already logged. The carrier
                // still owes the real completion for this job.
                None => {}
            }
        });
        attempt.submit(job, on_complete);
    }

    /// Fallback decision after a carrier completion. A decline falls back
    /// to the direct path; every other status finalizes with the carrier's
    /// outcome, tagged with its provenance.
    fn on_carrier_complete(
        &self,
        transaction: Transaction,
        status: CarrierStatus,
        response: Option<Vec<u8>>,
    ) {
        if status == CarrierStatus::RetryOnCarrierNetwork {
            info!(id = %transaction.ctx.id, "carrier declined, falling back to direct delivery");
            self.execute_direct(transaction);
            return;
        }

        debug!(id = %transaction.ctx.id, ?status, "carrier completed the transaction");
        let code = translate_carrier_status(status);
        self.process_result(transaction, code, response, 0, true);
    }

    /// Runs the direct path: kind-specific preparation, then the transport
    /// exchange, then finalization.
    fn execute_direct(&self, mut transaction: Transaction) {
        if !transaction.prepare(&self.services) {
            error!(id = %transaction.ctx.id, "payload preparation failed, transport skipped");
            self.process_result(transaction, ResultCode::IoFailure, None, 0, false);
            return;
        }

        match transaction.transfer(&self.services) {
            Ok(response) => {
                self.process_result(transaction, ResultCode::Success, Some(response), 0, false)
            }
            Err(e) => {
                error!(id = %transaction.ctx.id, status = e.status_code, "direct transfer failed: {e}");
                let code = if e.status_code == 0 {
                    ResultCode::NetworkUnavailable
                } else {
                    ResultCode::HttpFailure
                };
                self.process_result(transaction, code, None, e.status_code, false);
            }
        }
    }

    /// Converging finalization step for both channels: persistence,
    /// response transfer, access revocation, and the single result
    /// delivery.
    fn process_result(
        &self,
        transaction: Transaction,
        code: ResultCode,
        response: Option<Vec<u8>>,
        http_status: u16,
        originated_from_carrier: bool,
    ) {
        transaction.persist(&self.services, code, response.as_deref());

        let mut final_code = code;
        let mut attached = None;
        if let Some(bytes) = response.as_deref() {
            let (ok, bytes_for_caller) = transaction.transfer_response(&self.services, bytes);
            attached = bytes_for_caller;
            if !ok {
                final_code = ResultCode::IoFailure;
            }
        }

        transaction.revoke_access(&self.services);

        info!(
            id = %transaction.ctx.id,
            code = ?final_code,
            carrier = originated_from_carrier,
            "transaction finished"
        );
        self.services.sink.deliver(DeliveredResult {
            transaction_id: transaction.ctx.id.clone(),
            code: final_code,
            response: attached,
            http_status,
            originated_from_carrier,
        });
    }
}

/// Translates a carrier status into the channel-neutral vocabulary.
/// Declines never reach this point; they are consumed by the fallback
/// decision.
fn translate_carrier_status(status: CarrierStatus) -> ResultCode {
    match status {
        CarrierStatus::Ok => ResultCode::Success,
        CarrierStatus::Error | CarrierStatus::RetryOnCarrierNetwork => {
            ResultCode::UnspecifiedFailure
        }
    }
}
