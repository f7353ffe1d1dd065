//! Inbound Retrieval
//!
//! Downloads a pending message from its source location, writes the raw
//! bytes to the caller's target, and persists the decoded message into the
//! inbox in place of its placeholder record. The download broadcast goes
//! out before persistence and regardless of the persistence preference.

use tracing::{debug, error, warn};

use super::{unix_time, PayloadSizeHints, TransactionContext};
use crate::broadcast::{notify_all_eligible, BroadcastEvent};
use crate::carrier::{CarrierJob, CarrierOutcome, CarrierStatus};
use crate::engine::Services;
use crate::pdu::{Pdu, RetrieveStatus};
use crate::policy::ElevatedIdentity;
use crate::store::{MessageBox, MetadataUpdate, StoreError};
use crate::transport::{Method, TransportError};

/// An inbound message retrieval.
#[derive(Debug)]
pub struct DownloadTransaction {
    /// Source of the pending message on the carrier network.
    location_url: String,
    /// Caller-supplied locator the raw response is written to.
    target_locator: String,
}

impl DownloadTransaction {
    /// Creates a retrieval for a pending message.
    pub fn new(location_url: &str, target_locator: &str) -> Self {
        DownloadTransaction {
            location_url: location_url.to_string(),
            target_locator: target_locator.to_string(),
        }
    }

    /// Size of the pending payload per the external hint; zero when the
    /// size is unknown.
    pub fn payload_size(&self, hints: &dyn PayloadSizeHints) -> u64 {
        hints.payload_size(&self.location_url).unwrap_or(0)
    }

    pub(crate) fn transfer(
        &mut self,
        services: &Services,
        ctx: &TransactionContext,
    ) -> Result<Vec<u8>, TransportError> {
        services.transport.transfer(
            &self.location_url,
            None,
            Method::Get,
            &ctx.apn,
            &ctx.config,
            ctx.subscription_id,
            &ctx.id,
        )
    }

    pub(crate) fn carrier_job(&self, ctx: &TransactionContext) -> CarrierJob {
        CarrierJob::Download {
            target_locator: self.target_locator.clone(),
            subscription_id: ctx.subscription_id,
            location_url: self.location_url.clone(),
        }
    }

    pub(crate) fn accept_carrier_outcome(
        &self,
        ctx: &TransactionContext,
        outcome: &CarrierOutcome,
    ) -> Option<(CarrierStatus, Option<Vec<u8>>)> {
        match outcome {
            CarrierOutcome::DownloadComplete { status } => Some((*status, None)),
            CarrierOutcome::SendComplete { status, .. } => {
                error!(
                    id = %ctx.id,
                    ?status,
                    "unexpected send completion for a download transaction"
                );
                None
            }
        }
    }

    /// Broadcasts the download to all eligible user contexts, then persists
    /// the retrieved message if the caller opted into persistence. Store
    /// failures are logged and swallowed.
    pub(crate) fn persist(
        &self,
        services: &Services,
        ctx: &TransactionContext,
        response: Option<&[u8]>,
    ) {
        // Listeners beyond the store need to know a download completed, so
        // the broadcast is not gated on the persistence preference.
        notify_all_eligible(services.audience.as_ref(), BroadcastEvent::MessageDownloaded);

        if !services.persist_policy.auto_persist() {
            debug!(id = %ctx.id, "persistence skipped by preference");
            return;
        }
        let Some(response) = response.filter(|r| !r.is_empty()) else {
            debug!(id = %ctx.id, "nothing to persist: empty response");
            return;
        };
        if let Err(e) = self.persist_inner(services, ctx, response) {
            error!(id = %ctx.id, "failed to persist downloaded message: {e}");
        }
    }

    fn persist_inner(
        &self,
        services: &Services,
        ctx: &TransactionContext,
        response: &[u8],
    ) -> Result<(), StoreError> {
        let _identity = ElevatedIdentity::enter(services.identity.as_ref());

        let conf = match Pdu::decode(response) {
            Ok(Pdu::RetrieveConf(conf)) => conf,
            Ok(_) => {
                warn!(id = %ctx.id, "not persisting: response is not a retrieval confirmation");
                return Ok(());
            }
            Err(e) => {
                warn!(id = %ctx.id, "not persisting: cannot parse response: {e}");
                return Ok(());
            }
        };

        let status = conf.retrieve_status;
        if status != RetrieveStatus::Ok {
            warn!(id = %ctx.id, ?status, "retrieval reported failure");
            services
                .store
                .update_placeholder_status(&self.location_url, status)?;
            return Ok(());
        }

        let locator = services
            .store
            .persist_message(&Pdu::RetrieveConf(conf), MessageBox::Inbox)?;
        let update = MetadataUpdate {
            date: Some(unix_time()),
            read: Some(false),
            seen: Some(false),
            creator: Some(ctx.creator.clone()),
            subscription_id: Some(ctx.subscription_id),
            ..Default::default()
        };
        services.store.update_metadata(&locator, &update)?;

        // The stored message supersedes the pending-download marker.
        services.store.delete_placeholder(&self.location_url)?;
        Ok(())
    }

    /// Writes the raw response to the caller's target locator. A failed
    /// write is a transfer failure, distinct from a transport failure.
    pub(crate) fn transfer_response(
        &self,
        services: &Services,
        ctx: &TransactionContext,
        response: &[u8],
    ) -> (bool, Option<Vec<u8>>) {
        match services.store.write_payload(&self.target_locator, response) {
            Ok(()) => (true, None),
            Err(e) => {
                error!(id = %ctx.id, "failed to write response to target: {e}");
                (false, None)
            }
        }
    }

    pub(crate) fn revoke_access(&self, services: &Services) {
        services.store.revoke_access(&self.target_locator);
    }
}
