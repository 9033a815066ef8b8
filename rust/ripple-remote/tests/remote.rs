mod common;

use std::collections::HashSet;

use common::{LedgerState, connect, failure, success};
use ripple_remote::data::{Account, Hash256, LedgerSelector};
use ripple_remote::streams::StreamMessage;
use ripple_remote::{Partition, RemoteError};
use serde_json::{Value, json};

fn key(first: u8, fill: u8) -> Hash256 {
    let mut bytes = [fill; 32];
    bytes[0] = first;
    Hash256(bytes)
}

#[tokio::test]
async fn submit_batch_returns_results_in_request_order() {
    let mut held = Vec::new();
    let (remote, node) = connect(move |request| {
        held.push(request.clone());
        if held.len() < 3 {
            return Vec::new();
        }
        // Answer the whole batch at once, last request first.
        held.drain(..)
            .rev()
            .map(|request| {
                let blob = request["tx_blob"].clone();
                success(&request, json!({"engine_result": "tesSUCCESS", "tx_blob": blob}))
            })
            .collect()
    });

    let batch: [&[u8]; 3] = [&[0x01], &[0x02], &[0xAB]];
    let results = remote.submit_batch(&batch).await.expect("batch submitted");
    let blobs: Vec<_> = results
        .into_iter()
        .map(|result| result.expect("submit succeeded").tx_blob)
        .collect();
    assert_eq!(blobs, ["01", "02", "AB"]);
    assert_eq!(node.requests_for("submit").len(), 3);
    remote.close().await;
}

#[tokio::test]
async fn account_lines_follows_markers_then_sorts() {
    let (remote, node) = connect(|request| {
        let lines = |entries: &[(&str, &str)]| -> Vec<Value> {
            entries
                .iter()
                .map(|(currency, balance)| {
                    json!({
                        "account": "rPeer", "currency": currency, "balance": balance,
                        "limit": "1000", "limit_peer": "0",
                    })
                })
                .collect()
        };
        let result = match request.get("marker") {
            None => json!({
                "account": "rAlice", "ledger_index": 100,
                "lines": lines(&[("USD", "10"), ("EUR", "3")]),
                "marker": {"page": 2, "key": "AB"},
            }),
            Some(marker) if *marker == json!({"page": 2, "key": "AB"}) => json!({
                "account": "rAlice", "ledger_index": 100,
                "lines": lines(&[("USD", "2")]),
                "marker": "M2",
            }),
            Some(marker) if *marker == json!("M2") => json!({
                "account": "rAlice", "ledger_index": 100,
                "lines": lines(&[("BTC", "1"), ("USD", "-4")]),
            }),
            Some(other) => return vec![failure(request, &format!("badMarker {other}"), 1)],
        };
        vec![success(request, result)]
    });

    let result = remote
        .account_lines(&Account::from("rAlice"), Some(LedgerSelector::Validated))
        .await
        .expect("account_lines succeeds");

    let order: Vec<_> = result
        .lines
        .iter()
        .map(|line| (line.currency.as_str(), line.balance.as_str()))
        .collect();
    assert_eq!(
        order,
        [("BTC", "1"), ("EUR", "3"), ("USD", "-4"), ("USD", "2"), ("USD", "10")]
    );
    assert!(result.marker.is_none());

    let requests = node.requests_for("account_lines");
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0]["ledger_index"], json!("validated"));
    assert_eq!(requests[0]["limit"], json!(400));
    // Later pages read the ledger the first page came from.
    assert_eq!(requests[1]["ledger_index"], json!(100));
    assert_eq!(requests[2]["ledger_index"], json!(100));
    remote.close().await;
}

#[tokio::test]
async fn account_offers_sorts_by_quality() {
    let (remote, node) = connect(|request| {
        let offer = |seq: u32, quality: &str| {
            json!({
                "seq": seq, "quality": quality, "flags": 0,
                "taker_gets": "1000",
                "taker_pays": {"value": "1", "currency": "USD", "issuer": "rGate"},
            })
        };
        let result = if request.get("marker").is_none() {
            json!({"account": "rBob", "ledger_current_index": 7,
                   "offers": [offer(1, "3"), offer(2, "0.25")], "marker": 1})
        } else {
            json!({"account": "rBob", "ledger_current_index": 7, "offers": [offer(3, "1")]})
        };
        vec![success(request, result)]
    });

    let result = remote
        .account_offers(&Account::from("rBob"), None)
        .await
        .expect("account_offers succeeds");
    let seqs: Vec<_> = result.offers.iter().map(|offer| offer.seq).collect();
    assert_eq!(seqs, [2, 3, 1]);

    let requests = node.requests_for("account_offers");
    assert_eq!(requests.len(), 2);
    assert!(requests[0].get("ledger_index").is_none());
    assert_eq!(requests[1]["marker"], json!(1));
    assert_eq!(requests[1]["ledger_index"], json!(7));
    remote.close().await;
}

#[tokio::test]
async fn account_tx_streams_pages_and_reports_failure_last() {
    let (remote, node) = connect(|request| {
        let tx = |n: u32| json!({"tx": {"Sequence": n}, "meta": {}, "validated": true});
        match request.get("marker").and_then(Value::as_u64) {
            None => vec![success(
                request,
                json!({"account": "rAlice", "transactions": [tx(1), tx(2)], "marker": 1}),
            )],
            Some(1) => vec![success(
                request,
                json!({"account": "rAlice", "transactions": [tx(3)], "marker": 2}),
            )],
            _ => vec![failure(request, "lgrIdxsInvalid", 57)],
        }
    });

    let mut stream = remote
        .account_tx(&Account::from("rAlice"), 2, -1, -1)
        .expect("stream starts");
    let mut sequences = Vec::new();
    let mut last_error = None;
    while let Some(item) = stream.recv().await {
        match item {
            Ok(tx) => sequences.push(tx.tx["Sequence"].as_u64().expect("sequence")),
            Err(err) => last_error = Some(err),
        }
    }
    assert_eq!(sequences, [1, 2, 3]);
    assert!(matches!(
        last_error,
        Some(RemoteError::Command { ref error, .. }) if error == "lgrIdxsInvalid"
    ));

    let requests = node.requests_for("account_tx");
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0]["ledger_index_min"], json!(-1));
    assert_eq!(requests[0]["limit"], json!(2));
    remote.close().await;
}

#[tokio::test]
async fn stream_ledger_data_yields_each_entry_once() {
    let mut keys = vec![
        Hash256::ZERO,
        key(0x00, 0x01),
        key(0x0F, 0xFE),
        key(0x0F, 0xFF),
        key(0x10, 0x00),
        key(0x10, 0x01),
        key(0x7A, 0x33),
        Hash256::MAX,
    ];
    for nibble in 0..16u8 {
        keys.push(key(nibble << 4 | 0x08, 0x42));
    }
    let state = LedgerState::new(keys.clone(), 3, 77);
    let (remote, node) = connect(move |request| vec![success(request, state.page(request))]);

    let mut stream = remote
        .stream_ledger_data(LedgerSelector::Validated)
        .expect("stream starts");
    let mut seen = Vec::new();
    while let Some(batch) = stream.recv().await {
        for entry in batch.expect("page succeeds") {
            assert_eq!(entry.type_name(), Some("RippleState"));
            seen.push(entry.index);
        }
    }

    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "an entry was delivered twice");
    assert_eq!(unique, keys.iter().copied().collect::<HashSet<_>>());

    let requests = node.requests_for("ledger_data");
    assert!(requests.iter().all(|request| request["binary"] == json!(true)));
    assert_eq!(requests[0]["ledger_index"], json!("validated"));
    assert!(requests[0].get("marker").is_none());
    assert!(requests[1..].iter().all(|request| request["ledger_index"] == json!(77)));
    // Partition 1 starts right before its lower bound, so 0x1000.. is its first key.
    let start = Partition::nth(1).lower.predecessor().map(|k| json!(k.to_string()));
    assert!(requests.iter().any(|request| request.get("marker").cloned() == start));
    remote.close().await;
}

#[tokio::test]
async fn stream_ledger_data_reads_one_ledger() {
    // The node's current ledger moves on with every unpinned request.
    let state = LedgerState::new((0..16u8).map(|nibble| key(nibble << 4, 0x42)), 1, 0);
    let mut current = 500u32;
    let (remote, node) = connect(move |request| {
        let mut page = state.page(request);
        page["ledger_index"] = match request["ledger_index"].as_u64() {
            Some(seq) => json!(seq),
            None => {
                current += 1;
                json!(current)
            }
        };
        vec![success(request, page)]
    });

    let mut stream = remote
        .stream_ledger_data(LedgerSelector::Current)
        .expect("stream starts");
    let mut seen = 0;
    while let Some(batch) = stream.recv().await {
        seen += batch.expect("page succeeds").len();
    }
    assert_eq!(seen, 16);

    let requests = node.requests_for("ledger_data");
    assert_eq!(requests[0]["ledger_index"], json!("current"));
    let ledgers: HashSet<_> = requests[1..]
        .iter()
        .map(|request| request["ledger_index"].clone())
        .collect();
    assert_eq!(ledgers, HashSet::from([json!(501)]));
    remote.close().await;
}

#[tokio::test]
async fn stream_ledger_data_ends_when_the_node_goes_away() {
    // Only the opening page is answered; every later page hangs.
    let (remote, node) = connect(|request| {
        if request.get("marker").is_some() {
            return Vec::new();
        }
        let marker = key(0x00, 0x01).to_string();
        vec![success(request, json!({"ledger_index": 9, "state": [], "marker": marker}))]
    });
    let mut stream = remote
        .stream_ledger_data(LedgerSelector::Current)
        .expect("stream starts");
    // The opening page, then one outstanding page per partition.
    while node.requests_for("ledger_data").len() < 17 {
        tokio::task::yield_now().await;
    }
    node.hang_up().await;

    let mut errors = 0;
    while let Some(batch) = stream.recv().await {
        assert_eq!(batch, Err(RemoteError::Closed));
        errors += 1;
    }
    assert_eq!(errors, 16);
    assert!(!remote.is_connected());
}

#[tokio::test]
async fn stream_ledger_data_reports_a_failed_start() {
    let (remote, _node) = connect(|request| vec![failure(request, "lgrNotFound", 21)]);
    let mut stream = remote
        .stream_ledger_data(LedgerSelector::Sequence(3))
        .expect("stream starts");
    let first = stream.recv().await.expect("one item");
    assert!(matches!(first, Err(RemoteError::Command { .. })), "got {first:?}");
    assert!(stream.recv().await.is_none());
    remote.close().await;
}

#[tokio::test]
async fn subscribe_requires_acknowledgements() {
    let (remote, node) = connect(|request| {
        let streams = request["streams"].as_array().cloned().unwrap_or_default();
        let mut result = json!({});
        if streams.contains(&json!("ledger")) {
            result["ledger_index"] = json!(10);
            result["ledger_hash"] = json!(Hash256::MAX.to_string());
        }
        // The server stream is never acknowledged.
        vec![success(request, result)]
    });

    let ack = remote
        .subscribe(true, true, false, false)
        .await
        .expect("ledger subscription acknowledged");
    assert_eq!(ack.ledger.map(|ledger| ledger.ledger_index), Some(10));

    let err = remote.subscribe(true, false, false, true).await.unwrap_err();
    assert!(matches!(err, RemoteError::Protocol(_)), "got {err:?}");

    let requests = node.requests_for("subscribe");
    assert_eq!(requests[0]["streams"], json!(["ledger", "transactions"]));
    assert_eq!(requests[1]["streams"], json!(["ledger", "server"]));
    remote.close().await;
}

#[tokio::test]
async fn stream_messages_arrive_on_incoming() {
    let (remote, node) = connect(|_| Vec::new());
    let mut incoming = remote.incoming().expect("first consumer");

    node.push(json!({
        "type": "ledgerClosed",
        "ledger_index": 11,
        "ledger_hash": Hash256::ZERO.to_string(),
        "txn_count": 4,
    }))
    .await;
    node.push(json!({"type": "serverStatus", "server_status": "full", "load_base": 256, "load_factor": 512}))
        .await;

    match incoming.recv().await {
        Some(StreamMessage::LedgerClosed(closed)) => assert_eq!(closed.ledger_index, 11),
        other => panic!("expected ledgerClosed, got {other:?}"),
    }
    match incoming.recv().await {
        Some(StreamMessage::ServerStatus(status)) => assert_eq!(status.load_factor, 512),
        other => panic!("expected serverStatus, got {other:?}"),
    }
    remote.close().await;
}

#[tokio::test]
async fn command_errors_reach_only_their_caller() {
    let (remote, _node) = connect(|request| match request["command"].as_str() {
        Some("account_info") => vec![failure(request, "actNotFound", 19)],
        _ => vec![success(
            request,
            json!({"drops": {"base_fee": "10", "median_fee": "5000",
                             "minimum_fee": "10", "open_ledger_fee": "10"},
                   "ledger_current_index": 5}),
        )],
    });

    let err = remote
        .account_info(&Account::from("rNobody"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Command { ref error, code: Some(19), .. } if error == "actNotFound"));

    let fee = remote.fee().await.expect("fee succeeds");
    assert_eq!(fee.drops.base_fee, "10");
    assert!(remote.is_connected());
    remote.close().await;
}

#[tokio::test]
async fn ledger_orders_expanded_transactions() {
    let (remote, node) = connect(|request| {
        vec![success(
            request,
            json!({"validated": true, "ledger": {
                "ledger_index": "300",
                "transactions": [
                    {"hash": "C", "metaData": {"TransactionIndex": 2}},
                    {"hash": "A", "metaData": {"TransactionIndex": 0}},
                    {"hash": "B", "metaData": {"TransactionIndex": 1}},
                ],
            }}),
        )]
    });

    let result = remote
        .ledger(LedgerSelector::Sequence(300), true)
        .await
        .expect("ledger succeeds");
    let hashes: Vec<_> = result.ledger.transactions.iter().map(|tx| tx["hash"].clone()).collect();
    assert_eq!(hashes, [json!("A"), json!("B"), json!("C")]);
    assert_eq!(result.ledger.ledger_index, Some(300));

    let request = &node.requests_for("ledger")[0];
    assert_eq!(request["expand"], json!(true));
    assert_eq!(request["transactions"], json!(true));
    remote.close().await;
}

#[tokio::test]
async fn calls_fail_fast_once_closed() {
    let (remote, node) = connect(|request| vec![success(request, json!({}))]);
    remote.close().await;

    assert!(!remote.is_connected());
    assert_eq!(remote.fee().await.unwrap_err(), RemoteError::NotConnected);
    assert_eq!(
        remote.submit_batch(&[[0u8]]).await.unwrap_err(),
        RemoteError::NotConnected
    );
    assert!(matches!(
        remote.account_tx(&Account::from("rAlice"), 10, -1, -1),
        Err(RemoteError::NotConnected)
    ));
    assert!(matches!(
        remote.stream_ledger_data(LedgerSelector::Validated),
        Err(RemoteError::NotConnected)
    ));
    assert!(node.requests().is_empty());
}
