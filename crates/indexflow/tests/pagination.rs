//! Pagination engine behaviour against a stub index.

mod common;

use common::{Reply, StubTransport, INDEX_URL};
use futures::StreamExt;
use indexflow::{CancelToken, Error, Pipeline, Record};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn index_over(stub: &Arc<StubTransport>) -> Pipeline<Record> {
    indexflow::index(INDEX_URL).unwrap().transport(stub.clone())
}

fn ids(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_u64()).unwrap())
        .collect()
}

#[tokio::test]
async fn seven_records_in_chunks_of_three() {
    let stub = StubTransport::new().with_rows(7).arc();
    let records = assert_ok!(index_over(&stub).chunk_size(3).collect().await);

    assert_eq!(stub.offsets(), vec![0, 3, 6]);
    assert_eq!(ids(&records), (0..7).collect::<Vec<_>>());
}

#[tokio::test]
async fn exact_multiple_stops_without_an_empty_page() {
    let stub = StubTransport::new().with_rows(6).arc();
    let count = assert_ok!(index_over(&stub).chunk_size(3).count().await);

    assert_eq!(count, 6);
    assert_eq!(stub.offsets(), vec![0, 3]);
}

#[tokio::test]
async fn empty_index_makes_one_request() {
    let stub = StubTransport::new().arc();
    let records = assert_ok!(index_over(&stub).chunk_size(3).collect().await);

    assert!(records.is_empty());
    assert_eq!(stub.offsets(), vec![0]);
}

#[tokio::test]
async fn request_carries_offset_limit_and_sheet() {
    let stub = StubTransport::new().with_rows(2).arc();
    assert_ok!(index_over(&stub).chunk_size(5).sheet("blog").collect().await);

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].as_str(),
        "https://x.com/query-index.json?offset=0&limit=5&sheet=blog"
    );
}

#[tokio::test]
async fn chunk_size_set_downstream_reaches_the_engine() {
    let stub = StubTransport::new().with_rows(5).arc();
    let pipeline = index_over(&stub).filter(|r| r.contains("id")).chunk_size(2);
    assert_eq!(assert_ok!(pipeline.count().await), 5);
    assert_eq!(stub.offsets(), vec![0, 2, 4]);
}

#[tokio::test]
async fn not_found_fails_the_stream_before_any_record() {
    let stub = StubTransport::new()
        .with_rows(3)
        .with_index_reply(Reply::status(404))
        .arc();
    let items: Vec<_> = index_over(&stub).stream().collect().await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(Error::DocumentNotFound { .. })));
}

#[tokio::test]
async fn other_statuses_are_network_errors() {
    let stub = StubTransport::new()
        .with_index_reply(Reply::status(503))
        .arc();
    let err = assert_err!(index_over(&stub).collect().await);

    match err {
        Error::Network { status, url, .. } => {
            assert_eq!(status, Some(503));
            assert!(url.starts_with(INDEX_URL));
        }
        other => panic!("expected a network error, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_fatal() {
    let stub = StubTransport::new()
        .with_index_reply(Reply::Fail("connection reset".into()))
        .arc();
    let err = assert_err!(index_over(&stub).first().await);
    assert!(err.to_string().starts_with("network error"));
}

#[tokio::test]
async fn undecodable_page_is_a_decoding_error() {
    let stub = StubTransport::new()
        .with_index_reply(Reply::html("<html>not json</html>"))
        .arc();
    let err = assert_err!(index_over(&stub).collect().await);
    assert!(matches!(err, Error::Decoding(_)));
}

#[tokio::test]
async fn limit_stops_paging_early() {
    let stub = StubTransport::new().with_rows(100).arc();
    let records = assert_ok!(index_over(&stub).chunk_size(3).limit(4).collect().await);

    assert_eq!(ids(&records), vec![0, 1, 2, 3]);
    assert_eq!(stub.offsets(), vec![0, 3]);
}

#[tokio::test]
async fn first_fetches_a_single_page() {
    let stub = StubTransport::new().with_rows(100).arc();
    let first = assert_ok!(index_over(&stub).chunk_size(10).skip(2).first().await);

    assert_eq!(first.and_then(|r| r.get("id").cloned()), Some(2.into()));
    assert_eq!(stub.offsets(), vec![0]);
}

#[tokio::test]
async fn nothing_is_requested_until_evaluation() {
    let stub = StubTransport::new().with_rows(10).arc();
    let pipeline = index_over(&stub).chunk_size(2).skip(1).limit(3);
    let _stream = pipeline.stream();
    assert!(stub.requests().is_empty());

    assert_eq!(ids(&assert_ok!(pipeline.collect().await)), vec![1, 2, 3]);
}

#[tokio::test]
async fn skip_and_slice_agree_across_pages() {
    let stub = StubTransport::new().with_rows(8).arc();
    let base = index_over(&stub).chunk_size(3);
    for a in 0..=8 {
        for b in a..=8 {
            let sliced = assert_ok!(base.slice(a, b).collect().await);
            let composed = assert_ok!(base.skip(a).limit(b - a).collect().await);
            assert_eq!(ids(&sliced), ids(&composed), "slice({a}, {b})");
            assert_eq!(sliced.len(), b - a);
        }
    }
}

#[tokio::test]
async fn cancellation_between_records_is_reported_unchanged() {
    let stub = StubTransport::new().with_rows(10).arc();
    let token = CancelToken::new();
    let mut stream = index_over(&stub).chunk_size(4).cancel_token(token.clone()).stream();

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());
    token.cancel();

    assert_eq!(stream.next().await, Some(Err(Error::Cancelled)));
    assert!(stream.next().await.is_none());
    assert_eq!(stub.offsets(), vec![0]);
}

#[tokio::test]
async fn cancellation_interrupts_an_inflight_page_request() {
    let stub = StubTransport::new()
        .with_index_reply(Reply::Hang)
        .arc();
    let token = CancelToken::new();
    let pipeline = index_over(&stub).cancel_token(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let result = tokio::time::timeout(Duration::from_secs(5), pipeline.collect())
        .await
        .expect("cancellation should end the stream");

    assert_eq!(result, Err(Error::Cancelled));
    canceller.await.unwrap();
}

#[tokio::test]
async fn typed_decoding_of_index_rows() {
    #[derive(serde::Deserialize)]
    struct Row {
        id: u64,
        path: String,
    }
    let stub = StubTransport::new().with_rows(3).arc();
    let rows: Vec<Row> = assert_ok!(index_over(&stub).decode().collect().await);
    assert_eq!(rows[2].id, 2);
    assert_eq!(rows[2].path, "/page/2");
}
