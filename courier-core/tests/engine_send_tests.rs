//! Tests for the outbound transfer path of the transaction engine.

mod common;

use std::time::{Duration, Instant};

use common::*;
use courier_core::{
    EmergencyContactNotifier, MessageBox, Method, Pdu, ResponseStatus, ResultCode,
    SendTransaction, TransactionKind, TransportError,
};

const PAYLOAD_LOCATOR: &str = "payloads/1";

fn staged_send(h: &TestHarness, to: &[&str]) -> courier_core::Transaction {
    h.store.stage_payload(PAYLOAD_LOCATOR, &send_request(to));
    transaction(
        context(),
        TransactionKind::Send(SendTransaction::new(PAYLOAD_LOCATOR, None)),
    )
}

// === Result Delivery ===

#[test]
fn test_direct_send_success_delivers_result_once() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    let conf = send_conf(ResponseStatus::Ok, Some("MID-1"));
    h.transport.enqueue_response(conf.clone());

    h.engine.execute(txn);

    let results = h.sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, ResultCode::Success);
    assert_eq!(results[0].response, Some(conf));
    assert_eq!(results[0].http_status, 0);
    assert!(!results[0].originated_from_carrier);
}

#[test]
fn test_send_posts_payload_to_mmsc() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    let transfers = h.transport.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].url, "http://mmsc.test/");
    assert_eq!(transfers[0].method, Method::Post);
    assert!(transfers[0].body.is_some());
}

#[test]
fn test_transport_failure_maps_to_http_failure() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_error(TransportError::new(500, "internal error"));

    h.engine.execute(txn);

    let results = h.sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, ResultCode::HttpFailure);
    assert_eq!(results[0].http_status, 500);
}

#[test]
fn test_channel_unavailable_is_zero_status_failure() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_error(TransportError::unavailable("network not ready"));

    h.engine.execute(txn);

    let results = h.sink.results();
    assert_eq!(results[0].code, ResultCode::NetworkUnavailable);
    assert_eq!(results[0].http_status, 0);
}

#[test]
fn test_preparation_failure_skips_transport() {
    let h = harness();
    // Nothing staged under the locator: preparation cannot load the payload.
    let txn = transaction(
        context(),
        TransactionKind::Send(SendTransaction::new(PAYLOAD_LOCATOR, None)),
    );

    h.engine.execute(txn);

    assert_eq!(h.transport.transfer_count(), 0);
    let results = h.sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, ResultCode::IoFailure);
    assert!(h.store.messages().is_empty());
}

// === Persistence ===

#[test]
fn test_send_success_with_ok_confirmation_persists_to_sent() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, Some("MID-1")));

    h.engine.execute(txn);

    let messages = h.store.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_box, MessageBox::Sent);
    assert_eq!(messages[0].server_message_id.as_deref(), Some("MID-1"));
    assert_eq!(messages[0].response_status, Some(ResponseStatus::Ok.code()));
    assert!(messages[0].read);
    assert!(messages[0].seen);
    assert_eq!(messages[0].creator.as_deref(), Some("com.example.messaging"));
    assert_eq!(messages[0].subscription_id, Some(1));
    assert!(messages[0].date > 0);
}

#[test]
fn test_send_with_failed_confirmation_is_flagged_failed() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::ErrorTransientFailure, None));

    h.engine.execute(txn);

    let messages = h.store.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_box, MessageBox::Failed);
    assert_eq!(
        messages[0].response_status,
        Some(ResponseStatus::ErrorTransientFailure.code())
    );
}

#[test]
fn test_send_without_confirmation_is_flagged_failed() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport.enqueue_response(Vec::new());

    h.engine.execute(txn);

    let messages = h.store.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_box, MessageBox::Failed);
    assert_eq!(messages[0].response_status, None);
}

#[test]
fn test_transport_failure_still_persists_as_failed() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_error(TransportError::new(404, "not found"));

    h.engine.execute(txn);

    let messages = h.store.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_box, MessageBox::Failed);
}

#[test]
fn test_persistence_skipped_when_auto_persist_disabled() {
    let h = harness();
    h.persist.set_auto_persist(false);
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    assert!(h.store.messages().is_empty());
    assert_eq!(h.sink.results()[0].code, ResultCode::Success);
}

#[test]
fn test_persistence_skipped_without_write_permission() {
    let h = harness();
    h.persist.set_can_write(false);
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    assert!(h.store.messages().is_empty());
    assert_eq!(h.sink.results()[0].code, ResultCode::Success);
}

#[test]
fn test_persist_failure_never_changes_the_result() {
    let h = harness();
    h.store.fail_persist();
    let txn = staged_send(&h, &["+15550001111"]);
    let conf = send_conf(ResponseStatus::Ok, Some("MID-1"));
    h.transport.enqueue_response(conf.clone());

    h.engine.execute(txn);

    let results = h.sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, ResultCode::Success);
    assert_eq!(results[0].response, Some(conf));
    assert!(h.store.messages().is_empty());
}

#[test]
fn test_metadata_failure_never_changes_the_result() {
    let h = harness();
    h.store.fail_metadata();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    assert_eq!(h.sink.results()[0].code, ResultCode::Success);
}

#[test]
fn test_identity_elevation_restored_on_every_path() {
    let h = harness();
    h.store.fail_metadata();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    assert_eq!(h.identity.cleared(), 1);
    assert_eq!(h.identity.restored(), 1);
}

#[test]
fn test_access_revoked_after_finalization() {
    let h = harness();
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    assert_eq!(h.store.revoked(), vec![PAYLOAD_LOCATOR.to_string()]);
}

// === Destination Rewriting ===

#[test]
fn test_rewrite_changes_transmitted_payload() {
    let h = harness();
    h.numbers.add_rewrite("+15550001111", "15550001111");
    let staged = send_request(&["+15550001111"]);
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    let transfers = h.transport.transfers();
    let body = transfers[0].body.clone().unwrap();
    assert_ne!(body, staged);

    match Pdu::decode(&body).unwrap() {
        Pdu::SendRequest(req) => assert_eq!(req.to, vec!["15550001111".to_string()]),
        other => panic!("expected send request, got {other:?}"),
    }
}

#[test]
fn test_no_rewrite_keeps_payload_byte_identical() {
    let h = harness();
    let staged = send_request(&["+15550001111", "+15550002222"]);
    let txn = staged_send(&h, &["+15550001111", "+15550002222"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    let transfers = h.transport.transfers();
    assert_eq!(transfers[0].body.as_deref(), Some(staged.as_slice()));
}

#[test]
fn test_identity_rewrite_keeps_payload_byte_identical() {
    let h = harness();
    // The policy answers, but with the same address: nothing changed.
    h.numbers.add_rewrite("+15550001111", "+15550001111");
    let staged = send_request(&["+15550001111"]);
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    let transfers = h.transport.transfers();
    assert_eq!(transfers[0].body.as_deref(), Some(staged.as_slice()));
}

#[test]
fn test_undecodable_payload_sent_unchanged() {
    let h = harness();
    h.store.stage_payload(PAYLOAD_LOCATOR, b"not a pdu");
    let txn = transaction(
        context(),
        TransactionKind::Send(SendTransaction::new(PAYLOAD_LOCATOR, None)),
    );
    h.transport.enqueue_response(Vec::new());

    h.engine.execute(txn);

    // Rewriting treats an unparseable payload as "nothing to rewrite".
    let transfers = h.transport.transfers();
    assert_eq!(transfers[0].body.as_deref(), Some(b"not a pdu".as_slice()));
    assert_eq!(h.sink.results()[0].code, ResultCode::Success);
}

// === Emergency Contact Notification ===

#[test]
fn test_emergency_destination_notifies_contact_subsystem() {
    let h = harness();
    h.numbers.add_emergency("911");
    let txn = staged_send(&h, &["911"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    // The notification is fire-and-forget on a detached thread.
    let deadline = Instant::now() + Duration::from_secs(2);
    while h.emergency.count() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(h.emergency.count(), 1);
    assert_eq!(h.sink.results()[0].code, ResultCode::Success);
}

#[test]
fn test_ordinary_destination_does_not_notify() {
    let h = harness();
    h.numbers.add_emergency("911");
    let txn = staged_send(&h, &["+15550001111"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, None));

    h.engine.execute(txn);

    assert_eq!(h.emergency.count(), 0);
}

#[test]
fn test_emergency_notifier_panic_cannot_affect_the_send() {
    struct PanickyNotifier;
    impl EmergencyContactNotifier for PanickyNotifier {
        fn notify_emergency_contact(&self) {
            panic!("notifier blew up");
        }
    }

    let h = harness();
    h.numbers.add_emergency("911");
    let txn = staged_send(&h, &["911"]);
    h.transport
        .enqueue_response(send_conf(ResponseStatus::Ok, Some("MID-9")));

    // Swap in a notifier that panics on its own thread.
    let services = courier_core::Services {
        store: h.store.clone(),
        transport: h.transport.clone(),
        carrier: None,
        sink: h.sink.clone(),
        numbers: h.numbers.clone(),
        emergency: std::sync::Arc::new(PanickyNotifier),
        audience: h.audience.clone(),
        persist_policy: h.persist.clone(),
        identity: h.identity.clone(),
    };
    let engine = courier_core::TransactionEngine::new(services);

    engine.execute(txn);

    let results = h.sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, ResultCode::Success);
}
