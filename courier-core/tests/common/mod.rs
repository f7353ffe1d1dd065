// SPDX-FileCopyrightText: 2026 Courier Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Mock wiring and payload fixtures shared across the engine test modules.

#![allow(dead_code)]

use std::sync::Arc;

use courier_core::{
    ApnSettings, CarrierConfig, CountingEmergencyNotifier, CountingIdentityScope, MemoryStore,
    MockCarrierChannel, MockPersistPolicy, MockTransport, Pdu, RecordingSink, ResponseStatus,
    RetrieveConfPdu, RetrieveStatus, SendConfPdu, SendRequestPdu, Services, StaticAudience,
    StaticNumberPolicy, Transaction, TransactionContext, TransactionEngine, TransactionKind,
};

/// Engine wired to mock collaborators, with handles kept for assertions.
pub struct TestHarness {
    pub engine: TransactionEngine,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<MockTransport>,
    pub carrier: Arc<MockCarrierChannel>,
    pub sink: Arc<RecordingSink>,
    pub numbers: Arc<StaticNumberPolicy>,
    pub emergency: Arc<CountingEmergencyNotifier>,
    pub audience: Arc<StaticAudience>,
    pub persist: Arc<MockPersistPolicy>,
    pub identity: Arc<CountingIdentityScope>,
}

/// Builds a harness without a registered carrier channel.
pub fn harness() -> TestHarness {
    build_harness(false)
}

/// Builds a harness with the mock carrier channel registered.
pub fn harness_with_carrier() -> TestHarness {
    build_harness(true)
}

fn build_harness(with_carrier: bool) -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(MockTransport::new());
    let carrier = Arc::new(MockCarrierChannel::new());
    let sink = Arc::new(RecordingSink::new());
    let numbers = Arc::new(StaticNumberPolicy::new());
    let emergency = Arc::new(CountingEmergencyNotifier::new());
    let audience = Arc::new(StaticAudience::new());
    let persist = Arc::new(MockPersistPolicy::new());
    let identity = Arc::new(CountingIdentityScope::new());

    let services = Services {
        store: store.clone(),
        transport: transport.clone(),
        carrier: if with_carrier {
            Some(carrier.clone())
        } else {
            None
        },
        sink: sink.clone(),
        numbers: numbers.clone(),
        emergency: emergency.clone(),
        audience: audience.clone(),
        persist_policy: persist.clone(),
        identity: identity.clone(),
    };

    TestHarness {
        engine: TransactionEngine::new(services),
        store,
        transport,
        carrier,
        sink,
        numbers,
        emergency,
        audience,
        persist,
        identity,
    }
}

/// Context for a transaction without a carrier app configured.
pub fn context() -> TransactionContext {
    context_with_carrier_app(None)
}

/// Context naming a carrier delivery package.
pub fn context_with_carrier_app(carrier_app: Option<&str>) -> TransactionContext {
    let config = CarrierConfig {
        carrier_app: carrier_app.map(|p| p.to_string()),
        ..Default::default()
    };
    TransactionContext::new(
        1,
        0,
        "com.example.messaging",
        config,
        ApnSettings::new("http://mmsc.test/"),
    )
}

/// Builds a transaction from a context and kind.
pub fn transaction(ctx: TransactionContext, kind: TransactionKind) -> Transaction {
    Transaction::new(ctx, kind)
}

/// Encoded send request targeting the given addresses.
pub fn send_request(to: &[&str]) -> Vec<u8> {
    Pdu::SendRequest(SendRequestPdu {
        to: to.iter().map(|a| a.to_string()).collect(),
        cc: Vec::new(),
        bcc: Vec::new(),
        subject: Some("hello".to_string()),
        body: b"message body".to_vec(),
    })
    .encode()
    .unwrap()
}

/// Encoded send confirmation.
pub fn send_conf(status: ResponseStatus, message_id: Option<&str>) -> Vec<u8> {
    Pdu::SendConf(SendConfPdu {
        response_status: status,
        message_id: message_id.map(|m| m.to_string()),
    })
    .encode()
    .unwrap()
}

/// Encoded retrieval confirmation.
pub fn retrieve_conf(status: RetrieveStatus) -> Vec<u8> {
    Pdu::RetrieveConf(RetrieveConfPdu {
        retrieve_status: status,
        from: Some("+15550000001".to_string()),
        subject: Some("incoming".to_string()),
        body: b"downloaded body".to_vec(),
    })
    .encode()
    .unwrap()
}
