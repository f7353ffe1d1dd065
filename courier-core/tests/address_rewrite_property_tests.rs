//! Property tests for destination address rewriting.
//!
//! The payload handed to the transport must be byte-identical to the staged
//! payload whenever no address changes, and must decode to the rewritten
//! addresses whenever one does.

mod common;

use common::*;
use courier_core::{Pdu, ResponseStatus, SendTransaction, TransactionKind};
use proptest::prelude::*;

fn address_strategy() -> impl Strategy<Value = String> {
    "[+][0-9]{7,12}"
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 48, ..ProptestConfig::default() })]

    #[test]
    fn prop_unrewritten_addresses_keep_payload_bytes(
        addresses in proptest::collection::vec(address_strategy(), 1..4)
    ) {
        let h = harness();
        let refs: Vec<&str> = addresses.iter().map(|a| a.as_str()).collect();
        let staged = send_request(&refs);
        h.store.stage_payload("payloads/p", &staged);
        h.transport.enqueue_response(send_conf(ResponseStatus::Ok, None));

        let txn = transaction(
            context(),
            TransactionKind::Send(SendTransaction::new("payloads/p", None)),
        );
        h.engine.execute(txn);

        let transfers = h.transport.transfers();
        prop_assert_eq!(transfers.len(), 1);
        prop_assert_eq!(transfers[0].body.as_deref(), Some(staged.as_slice()));
    }

    #[test]
    fn prop_rewritten_address_changes_payload(
        addresses in proptest::collection::vec(address_strategy(), 1..4)
    ) {
        let h = harness();
        let rewritten = format!("{}00", addresses[0]);
        h.numbers.add_rewrite(&addresses[0], &rewritten);

        let refs: Vec<&str> = addresses.iter().map(|a| a.as_str()).collect();
        let staged = send_request(&refs);
        h.store.stage_payload("payloads/p", &staged);
        h.transport.enqueue_response(send_conf(ResponseStatus::Ok, None));

        let txn = transaction(
            context(),
            TransactionKind::Send(SendTransaction::new("payloads/p", None)),
        );
        h.engine.execute(txn);

        let transfers = h.transport.transfers();
        prop_assert_eq!(transfers.len(), 1);
        let body = transfers[0].body.clone().unwrap();
        prop_assert_ne!(&body, &staged);

        match Pdu::decode(&body).unwrap() {
            Pdu::SendRequest(req) => {
                prop_assert_eq!(&req.to[0], &rewritten);
            }
            other => prop_assert!(false, "expected send request, got {:?}", other),
        }
    }
}
