//! Mock Collaborators
//!
//! In-memory implementations of the engine's external seams, used by the
//! test suite and for host integration bring-up. Each mock records the
//! calls it receives and can be scripted to fail.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tracing::warn;

use crate::broadcast::{AudienceContext, AudienceDirectory, BroadcastEvent};
use crate::carrier::{CarrierBinding, CarrierCallback, CarrierChannel, CarrierJob, CarrierOutcome};
use crate::config::{ApnSettings, CarrierConfig};
use crate::pdu::{Pdu, RetrieveStatus};
use crate::policy::{EmergencyContactNotifier, IdentityScope, NumberPolicy, PersistPolicy};
use crate::sink::{DeliveredResult, ResultSink};
use crate::store::{MessageBox, MessageStore, MetadataUpdate, StoreError, StoredMessage};
use crate::transaction::{PayloadSizeHints, TransactionId};
use crate::transport::{Method, TransportClient, TransportError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One transfer the mock transport was asked to perform.
#[derive(Debug, Clone)]
pub struct RecordedTransfer {
    pub url: String,
    pub method: Method,
    pub body: Option<Vec<u8>>,
}

/// Scriptable transport client.
///
/// Responses are consumed in FIFO order; a transfer without a scripted
/// response fails as channel-unavailable.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    transfers: Mutex<Vec<RecordedTransfer>>,
}

impl MockTransport {
    /// Creates a transport with no scripted responses.
    pub fn new() -> Self {
        MockTransport::default()
    }

    /// Scripts a successful response.
    pub fn enqueue_response(&self, data: Vec<u8>) {
        lock(&self.responses).push_back(Ok(data));
    }

    /// Scripts a failure.
    pub fn enqueue_error(&self, error: TransportError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// Returns the transfers performed so far.
    pub fn transfers(&self) -> Vec<RecordedTransfer> {
        lock(&self.transfers).clone()
    }

    /// Returns the number of transfers performed.
    pub fn transfer_count(&self) -> usize {
        lock(&self.transfers).len()
    }
}

impl TransportClient for MockTransport {
    fn transfer(
        &self,
        url: &str,
        body: Option<&[u8]>,
        method: Method,
        _apn: &ApnSettings,
        _config: &CarrierConfig,
        _subscription_id: i32,
        _transaction_id: &TransactionId,
    ) -> Result<Vec<u8>, TransportError> {
        lock(&self.transfers).push(RecordedTransfer {
            url: url.to_string(),
            method,
            body: body.map(|b| b.to_vec()),
        });
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::unavailable("no scripted response")))
    }
}

#[derive(Default)]
struct CarrierState {
    refuse_bind: AtomicBool,
    deliver_on_thread: AtomicBool,
    outcome: Mutex<Option<CarrierOutcome>>,
    binds: AtomicUsize,
    submits: AtomicUsize,
    releases: AtomicUsize,
    jobs: Mutex<Vec<CarrierJob>>,
}

/// Scriptable carrier delivery channel.
///
/// By default bindings succeed and the scripted outcome is delivered
/// synchronously from inside `submit`; enable [`deliver_on_thread`] to
/// deliver it from a separate thread instead, which is how a real carrier
/// service behaves.
///
/// [`deliver_on_thread`]: MockCarrierChannel::deliver_on_thread
#[derive(Default)]
pub struct MockCarrierChannel {
    state: Arc<CarrierState>,
}

impl MockCarrierChannel {
    /// Creates a channel whose bindings succeed.
    pub fn new() -> Self {
        MockCarrierChannel::default()
    }

    /// Makes all future bind attempts fail.
    pub fn refuse_bind(&self) {
        self.state.refuse_bind.store(true, Ordering::SeqCst);
    }

    /// Scripts the outcome delivered for the next submitted job.
    pub fn set_outcome(&self, outcome: CarrierOutcome) {
        *lock(&self.state.outcome) = Some(outcome);
    }

    /// Delivers outcomes from a spawned thread instead of synchronously.
    pub fn deliver_on_thread(&self, enabled: bool) {
        self.state.deliver_on_thread.store(enabled, Ordering::SeqCst);
    }

    /// Number of bind attempts across all bindings.
    pub fn bind_count(&self) -> usize {
        self.state.binds.load(Ordering::SeqCst)
    }

    /// Number of submitted jobs.
    pub fn submit_count(&self) -> usize {
        self.state.submits.load(Ordering::SeqCst)
    }

    /// Number of binding releases.
    pub fn release_count(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    /// Returns the submitted jobs.
    pub fn jobs(&self) -> Vec<CarrierJob> {
        lock(&self.state.jobs).clone()
    }
}

impl CarrierChannel for MockCarrierChannel {
    fn connect(&self) -> Box<dyn CarrierBinding> {
        Box::new(MockCarrierBinding {
            state: Arc::clone(&self.state),
        })
    }
}

struct MockCarrierBinding {
    state: Arc<CarrierState>,
}

impl CarrierBinding for MockCarrierBinding {
    fn bind(&mut self, _package: &str) -> bool {
        self.state.binds.fetch_add(1, Ordering::SeqCst);
        !self.state.refuse_bind.load(Ordering::SeqCst)
    }

    fn submit(&mut self, job: CarrierJob, on_complete: CarrierCallback) {
        self.state.submits.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.jobs).push(job);

        let Some(outcome) = lock(&self.state.outcome).take() else {
            warn!("mock carrier has no scripted outcome, dropping completion");
            return;
        };
        if self.state.deliver_on_thread.load(Ordering::SeqCst) {
            thread::spawn(move || on_complete(outcome));
        } else {
            on_complete(outcome);
        }
    }

    fn release(&mut self) {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory message store with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    messages: Mutex<Vec<StoredMessage>>,
    placeholders: Mutex<HashMap<String, u32>>,
    revoked: Mutex<Vec<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_persist: AtomicBool,
    fail_metadata: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Stages payload bytes under a locator.
    pub fn stage_payload(&self, locator: &str, data: &[u8]) {
        lock(&self.payloads).insert(locator.to_string(), data.to_vec());
    }

    /// Creates a placeholder record for a pending inbound message.
    pub fn create_placeholder(&self, location_url: &str) {
        lock(&self.placeholders).insert(location_url.to_string(), RetrieveStatus::Ok.code());
    }

    /// Returns the bytes under a locator.
    pub fn payload(&self, locator: &str) -> Option<Vec<u8>> {
        lock(&self.payloads).get(locator).cloned()
    }

    /// Returns all persisted messages, oldest first.
    pub fn messages(&self) -> Vec<StoredMessage> {
        lock(&self.messages).clone()
    }

    /// Returns the placeholder status for a location URL, if present.
    pub fn placeholder(&self, location_url: &str) -> Option<u32> {
        lock(&self.placeholders).get(location_url).copied()
    }

    /// Returns the locators whose access has been revoked.
    pub fn revoked(&self) -> Vec<String> {
        lock(&self.revoked).clone()
    }

    /// Makes payload reads fail.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Makes payload writes fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Makes message persistence fail.
    pub fn fail_persist(&self) {
        self.fail_persist.store(true, Ordering::SeqCst);
    }

    /// Makes metadata updates fail.
    pub fn fail_metadata(&self) {
        self.fail_metadata.store(true, Ordering::SeqCst);
    }
}

impl MessageStore for MemoryStore {
    fn read_payload(&self, locator: &str, max_size: usize) -> Result<Vec<u8>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound(locator.to_string()));
        }
        let data = lock(&self.payloads)
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))?;
        if data.len() > max_size {
            return Err(StoreError::TooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Ok(data)
    }

    fn write_payload(&self, locator: &str, data: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("write failure injected".to_string()));
        }
        lock(&self.payloads).insert(locator.to_string(), data.to_vec());
        Ok(())
    }

    fn persist_message(&self, pdu: &Pdu, dest: MessageBox) -> Result<String, StoreError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("persist failure injected".to_string()));
        }
        let (subject, body) = match pdu {
            Pdu::SendRequest(req) => (req.subject.clone(), req.body.clone()),
            Pdu::RetrieveConf(conf) => (conf.subject.clone(), conf.body.clone()),
            Pdu::SendConf(_) => {
                return Err(StoreError::Rejected(
                    "send confirmations are not storable messages".to_string(),
                ))
            }
        };
        let mut messages = lock(&self.messages);
        let locator = format!("mem/{}", messages.len());
        messages.push(StoredMessage {
            locator: locator.clone(),
            message_box: dest,
            subject,
            body,
            response_status: None,
            server_message_id: None,
            date: 0,
            read: false,
            seen: false,
            creator: None,
            subscription_id: None,
        });
        Ok(locator)
    }

    fn update_metadata(&self, locator: &str, update: &MetadataUpdate) -> Result<(), StoreError> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("metadata failure injected".to_string()));
        }
        let mut messages = lock(&self.messages);
        let message = messages
            .iter_mut()
            .find(|m| m.locator == locator)
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))?;

        if let Some(dest) = update.message_box {
            message.message_box = dest;
        }
        if let Some(status) = update.response_status {
            message.response_status = Some(status.code());
        }
        if let Some(id) = &update.server_message_id {
            message.server_message_id = Some(id.clone());
        }
        if let Some(date) = update.date {
            message.date = date;
        }
        if let Some(read) = update.read {
            message.read = read;
        }
        if let Some(seen) = update.seen {
            message.seen = seen;
        }
        if let Some(creator) = &update.creator {
            message.creator = Some(creator.clone());
        }
        if let Some(subscription_id) = update.subscription_id {
            message.subscription_id = Some(subscription_id);
        }
        Ok(())
    }

    fn update_placeholder_status(
        &self,
        location_url: &str,
        status: RetrieveStatus,
    ) -> Result<(), StoreError> {
        let mut placeholders = lock(&self.placeholders);
        match placeholders.get_mut(location_url) {
            Some(entry) => {
                *entry = status.code();
                Ok(())
            }
            None => Err(StoreError::NotFound(location_url.to_string())),
        }
    }

    fn delete_placeholder(&self, location_url: &str) -> Result<(), StoreError> {
        lock(&self.placeholders).remove(location_url);
        Ok(())
    }

    fn revoke_access(&self, locator: &str) {
        lock(&self.revoked).push(locator.to_string());
    }
}

/// Sink that records every delivered result.
#[derive(Default)]
pub struct RecordingSink {
    results: Mutex<Vec<DeliveredResult>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        RecordingSink::default()
    }

    /// Returns the delivered results.
    pub fn results(&self) -> Vec<DeliveredResult> {
        lock(&self.results).clone()
    }

    /// Returns the number of delivered results.
    pub fn delivery_count(&self) -> usize {
        lock(&self.results).len()
    }
}

impl ResultSink for RecordingSink {
    fn deliver(&self, result: DeliveredResult) {
        lock(&self.results).push(result);
    }
}

/// Table-driven number policy.
#[derive(Default)]
pub struct StaticNumberPolicy {
    rewrites: Mutex<HashMap<String, String>>,
    emergency: Mutex<HashSet<String>>,
}

impl StaticNumberPolicy {
    /// Creates a policy that rewrites nothing.
    pub fn new() -> Self {
        StaticNumberPolicy::default()
    }

    /// Registers an address rewrite.
    pub fn add_rewrite(&self, from: &str, to: &str) {
        lock(&self.rewrites).insert(from.to_string(), to.to_string());
    }

    /// Classifies an address as an emergency number.
    pub fn add_emergency(&self, address: &str) {
        lock(&self.emergency).insert(address.to_string());
    }
}

impl NumberPolicy for StaticNumberPolicy {
    fn rewrite(&self, _subscription_id: i32, address: &str) -> Option<String> {
        lock(&self.rewrites).get(address).cloned()
    }

    fn is_emergency(&self, _subscription_id: i32, address: &str) -> bool {
        lock(&self.emergency).contains(address)
    }
}

/// Notifier that counts notifications.
#[derive(Default)]
pub struct CountingEmergencyNotifier {
    notifications: AtomicUsize,
}

impl CountingEmergencyNotifier {
    /// Creates a notifier with a zero count.
    pub fn new() -> Self {
        CountingEmergencyNotifier::default()
    }

    /// Number of notifications received.
    pub fn count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

impl EmergencyContactNotifier for CountingEmergencyNotifier {
    fn notify_emergency_contact(&self) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fixed audience directory that records dispatches.
#[derive(Default)]
pub struct StaticAudience {
    contexts: Mutex<Vec<AudienceContext>>,
    delivered: Mutex<Vec<(i32, BroadcastEvent)>>,
}

impl StaticAudience {
    /// Creates an empty directory.
    pub fn new() -> Self {
        StaticAudience::default()
    }

    /// Adds an active context.
    pub fn add_context(&self, context: AudienceContext) {
        lock(&self.contexts).push(context);
    }

    /// Returns the dispatched events as `(user_id, event)` pairs.
    pub fn delivered(&self) -> Vec<(i32, BroadcastEvent)> {
        lock(&self.delivered).clone()
    }
}

impl AudienceDirectory for StaticAudience {
    fn active_contexts(&self) -> Vec<AudienceContext> {
        lock(&self.contexts).clone()
    }

    fn dispatch(&self, context: &AudienceContext, event: BroadcastEvent) {
        lock(&self.delivered).push((context.user_id, event));
    }
}

/// Persistence policy with switchable answers.
pub struct MockPersistPolicy {
    auto_persist: AtomicBool,
    can_write: AtomicBool,
}

impl Default for MockPersistPolicy {
    fn default() -> Self {
        MockPersistPolicy {
            auto_persist: AtomicBool::new(true),
            can_write: AtomicBool::new(true),
        }
    }
}

impl MockPersistPolicy {
    /// Creates a policy that allows everything.
    pub fn new() -> Self {
        MockPersistPolicy::default()
    }

    /// Sets the auto-persistence preference.
    pub fn set_auto_persist(&self, enabled: bool) {
        self.auto_persist.store(enabled, Ordering::SeqCst);
    }

    /// Sets whether creators may write messages.
    pub fn set_can_write(&self, allowed: bool) {
        self.can_write.store(allowed, Ordering::SeqCst);
    }
}

impl PersistPolicy for MockPersistPolicy {
    fn auto_persist(&self) -> bool {
        self.auto_persist.load(Ordering::SeqCst)
    }

    fn can_write_messages(&self, _creator: &str, _calling_user: i32) -> bool {
        self.can_write.load(Ordering::SeqCst)
    }
}

/// Identity scope that counts clear/restore pairs.
#[derive(Default)]
pub struct CountingIdentityScope {
    cleared: AtomicUsize,
    restored: AtomicUsize,
}

impl CountingIdentityScope {
    /// Creates a scope with zero counts.
    pub fn new() -> Self {
        CountingIdentityScope::default()
    }

    /// Number of elevations entered.
    pub fn cleared(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }

    /// Number of elevations restored.
    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

impl IdentityScope for CountingIdentityScope {
    fn clear_calling_identity(&self) -> u64 {
        self.cleared.fetch_add(1, Ordering::SeqCst) as u64
    }

    fn restore_calling_identity(&self, _token: u64) {
        self.restored.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fixed payload size hints.
#[derive(Default)]
pub struct StaticSizeHints {
    sizes: Mutex<HashMap<String, u64>>,
}

impl StaticSizeHints {
    /// Creates an empty hint table.
    pub fn new() -> Self {
        StaticSizeHints::default()
    }

    /// Registers a size hint for a location URL.
    pub fn set_size(&self, location_url: &str, size: u64) {
        lock(&self.sizes).insert(location_url.to_string(), size);
    }
}

impl PayloadSizeHints for StaticSizeHints {
    fn payload_size(&self, location_url: &str) -> Option<u64> {
        lock(&self.sizes).get(location_url).copied()
    }
}
