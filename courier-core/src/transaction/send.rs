//! Outbound Transfer
//!
//! Sends a staged message payload to the carrier network and persists the
//! result into the sent collection. Destination rewriting and the
//! emergency-contact notification run best-effort before transport and can
//! never abort the send.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, warn};

use super::{unix_time, TransactionContext};
use crate::carrier::{CarrierJob, CarrierOutcome, CarrierStatus};
use crate::engine::Services;
use crate::pdu::{Pdu, ResponseStatus, SendConfPdu, SendRequestPdu, ADDRESS_FIELDS};
use crate::policy::ElevatedIdentity;
use crate::sink::ResultCode;
use crate::store::{MessageBox, MetadataUpdate, StoreError};
use crate::transport::{Method, TransportError};

/// An outbound message transfer.
#[derive(Debug)]
pub struct SendTransaction {
    payload_locator: String,
    /// Explicit destination URL; the APN MMSC is used when absent.
    destination_url: Option<String>,
    /// Payload bytes, cached by preparation.
    payload: Option<Vec<u8>>,
}

impl SendTransaction {
    /// Creates an outbound transfer for a staged payload.
    pub fn new(payload_locator: &str, destination_url: Option<String>) -> Self {
        SendTransaction {
            payload_locator: payload_locator.to_string(),
            destination_url,
            payload: None,
        }
    }

    /// The prepared payload bytes, if preparation ran.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Size of the prepared payload; zero before preparation.
    pub fn payload_size(&self) -> u64 {
        self.payload.as_ref().map(|p| p.len() as u64).unwrap_or(0)
    }

    /// Loads the payload bytes into memory, bounded by the configured
    /// maximum message size.
    pub(crate) fn prepare(&mut self, services: &Services, ctx: &TransactionContext) -> bool {
        if self.payload.is_some() {
            return true;
        }
        match services
            .store
            .read_payload(&self.payload_locator, ctx.config.max_message_size)
        {
            Ok(data) => {
                self.payload = Some(data);
                true
            }
            Err(e) => {
                error!(id = %ctx.id, "failed to read payload: {e}");
                false
            }
        }
    }

    pub(crate) fn transfer(
        &mut self,
        services: &Services,
        ctx: &TransactionContext,
    ) -> Result<Vec<u8>, TransportError> {
        let parsed = self.parse_payload(ctx);
        self.notify_if_emergency_contact(services, ctx, parsed.as_ref());
        self.update_destination_addresses(services, ctx, parsed);

        let Some(payload) = self.payload.as_deref() else {
            return Err(TransportError::unavailable("payload was never prepared"));
        };
        let url = self
            .destination_url
            .as_deref()
            .unwrap_or(&ctx.apn.mmsc_url);

        services.transport.transfer(
            url,
            Some(payload),
            Method::Post,
            &ctx.apn,
            &ctx.config,
            ctx.subscription_id,
            &ctx.id,
        )
    }

    /// Decodes the cached payload as a send request. Any failure is logged
    /// and treated as "nothing to inspect" by the best-effort pre-send
    /// steps.
    fn parse_payload(&self, ctx: &TransactionContext) -> Option<SendRequestPdu> {
        let payload = self.payload.as_deref()?;
        match Pdu::decode(payload) {
            Ok(Pdu::SendRequest(req)) => Some(req),
            Ok(_) => {
                info!(id = %ctx.id, "payload is not a send request");
                None
            }
            Err(e) => {
                warn!(id = %ctx.id, "failed to parse payload: {e}");
                None
            }
        }
    }

    /// Notifies the contact-restriction subsystem when the message targets
    /// an emergency number. Fire-and-forget: runs on a detached thread and
    /// no failure can reach the send.
    fn notify_if_emergency_contact(
        &self,
        services: &Services,
        ctx: &TransactionContext,
        parsed: Option<&SendRequestPdu>,
    ) {
        let Some(req) = parsed else { return };
        let emergency = req
            .to
            .iter()
            .any(|address| services.numbers.is_emergency(ctx.subscription_id, address));
        if !emergency {
            return;
        }

        info!(id = %ctx.id, "destination is an emergency contact, notifying");
        let notifier = Arc::clone(&services.emergency);
        thread::spawn(move || notifier.notify_emergency_contact());
    }

    /// Applies assisted-dialing normalization to every destination address
    /// and re-encodes the payload when any address changed. Best-effort: a
    /// re-encoding failure keeps the original payload.
    fn update_destination_addresses(
        &mut self,
        services: &Services,
        ctx: &TransactionContext,
        parsed: Option<SendRequestPdu>,
    ) {
        let Some(mut req) = parsed else { return };

        let mut updated = false;
        for field in ADDRESS_FIELDS {
            let rewritten: Vec<String> = req
                .addresses(field)
                .iter()
                .map(|address| {
                    match services.numbers.rewrite(ctx.subscription_id, address) {
                        Some(new_address) if new_address != *address => {
                            updated = true;
                            new_address
                        }
                        _ => address.clone(),
                    }
                })
                .collect();
            req.set_addresses(field, rewritten);
        }

        if !updated {
            return;
        }
        match Pdu::SendRequest(req).encode() {
            Ok(data) => {
                debug!(id = %ctx.id, "destination addresses rewritten");
                self.payload = Some(data);
            }
            Err(e) => {
                warn!(id = %ctx.id, "failed to re-encode rewritten payload: {e}");
            }
        }
    }

    pub(crate) fn carrier_job(&self, ctx: &TransactionContext) -> CarrierJob {
        CarrierJob::Send {
            payload_locator: self.payload_locator.clone(),
            subscription_id: ctx.subscription_id,
            destination_url: self.destination_url.clone(),
        }
    }

    pub(crate) fn accept_carrier_outcome(
        &self,
        ctx: &TransactionContext,
        outcome: &CarrierOutcome,
    ) -> Option<(CarrierStatus, Option<Vec<u8>>)> {
        match outcome {
            CarrierOutcome::SendComplete {
                status,
                confirmation,
            } => Some((*status, confirmation.clone())),
            CarrierOutcome::DownloadComplete { status } => {
                error!(
                    id = %ctx.id,
                    ?status,
                    "unexpected download completion for a send transaction"
                );
                None
            }
        }
    }

    /// Persists the sent message, gated on the auto-persist preference and
    /// the creator's write permission. Store failures are logged and
    /// swallowed.
    pub(crate) fn persist(
        &self,
        services: &Services,
        ctx: &TransactionContext,
        code: ResultCode,
        response: Option<&[u8]>,
    ) {
        if !services.persist_policy.auto_persist()
            || !services
                .persist_policy
                .can_write_messages(&ctx.creator, ctx.calling_user)
        {
            debug!(id = %ctx.id, "persistence skipped by policy");
            return;
        }
        let Some(payload) = self.payload.as_deref() else {
            error!(id = %ctx.id, "persistence skipped: empty payload");
            return;
        };
        if let Err(e) = self.persist_inner(services, ctx, code, response, payload) {
            error!(id = %ctx.id, "failed to persist sent message: {e}");
        }
    }

    fn persist_inner(
        &self,
        services: &Services,
        ctx: &TransactionContext,
        code: ResultCode,
        response: Option<&[u8]>,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        let _identity = ElevatedIdentity::enter(services.identity.as_ref());

        // Only a well-formed send request is persisted; anything else is
        // skipped, not an error.
        let pdu = match Pdu::decode(payload) {
            Ok(pdu @ Pdu::SendRequest(_)) => pdu,
            Ok(_) => {
                debug!(id = %ctx.id, "not persisting: payload is not a send request");
                return Ok(());
            }
            Err(e) => {
                warn!(id = %ctx.id, "not persisting: cannot parse payload: {e}");
                return Ok(());
            }
        };

        let locator = services.store.persist_message(&pdu, MessageBox::Sent)?;

        let confirmation = self.parse_confirmation(ctx, response);
        let mut update = MetadataUpdate {
            date: Some(unix_time()),
            read: Some(true),
            seen: Some(true),
            creator: Some(ctx.creator.clone()),
            subscription_id: Some(ctx.subscription_id),
            ..Default::default()
        };
        let confirmed_ok = confirmation
            .as_ref()
            .map(|conf| conf.response_status == ResponseStatus::Ok)
            .unwrap_or(false);
        if code != ResultCode::Success || !confirmed_ok {
            update.message_box = Some(MessageBox::Failed);
        }
        if let Some(conf) = &confirmation {
            update.response_status = Some(conf.response_status);
            update.server_message_id = conf.message_id.clone();
        }

        services.store.update_metadata(&locator, &update)?;
        Ok(())
    }

    fn parse_confirmation(
        &self,
        ctx: &TransactionContext,
        response: Option<&[u8]>,
    ) -> Option<SendConfPdu> {
        let response = response.filter(|r| !r.is_empty())?;
        match Pdu::decode(response) {
            Ok(Pdu::SendConf(conf)) => Some(conf),
            Ok(_) => {
                debug!(id = %ctx.id, "response is not a send confirmation");
                None
            }
            Err(e) => {
                warn!(id = %ctx.id, "failed to parse send confirmation: {e}");
                None
            }
        }
    }

    /// Send confirmations are small; the raw bytes ride along on the
    /// delivered result.
    pub(crate) fn transfer_response(&self, response: &[u8]) -> (bool, Option<Vec<u8>>) {
        (true, Some(response.to_vec()))
    }

    pub(crate) fn revoke_access(&self, services: &Services) {
        services.store.revoke_access(&self.payload_locator);
    }
}
