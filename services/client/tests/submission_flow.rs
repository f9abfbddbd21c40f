/// End-to-end submission runs against scripted server connections
mod common;

use common::*;
use std::time::Duration;

use agency_client::events::ClientEvent;
use agency_client::{BatchReport, ClientError, QueryOutcome, RunOutcome};
use shared::{BatchStatus, DecodeError};

const BET_1: &str = "Santiago,Lorca,30904465,1999-03-17,7574";
const BET_2: &str = "Ana,Diaz,30904930,1988-11-02,2201";
const BET_3: &str = "Luis,Paz,20111222,1980-01-01,42";

#[tokio::test]
async fn test_three_records_in_batches_of_two() {
    let ctx = TestContext::new(
        vec![
            Ok(exchange(&batch_frame("1", &[BET_1, BET_2]), b"success|2\n")),
            Ok(exchange(&batch_frame("1", &[BET_3]), b"success|1\n")),
            Ok(exchange(&notify_frame("1"), b"ack_notify\n")),
            Ok(exchange(&query_frame("1"), b"ok|1\n30904930\n")),
        ],
        &[BET_1, BET_2, BET_3],
    );

    let outcome = ctx.client("1", 2).run().await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            batches: vec![
                BatchReport { index: 0, size: 2, status: BatchStatus::Success, count: 2 },
                BatchReport { index: 1, size: 1, status: BatchStatus::Success, count: 1 },
            ],
            records_submitted: 3,
            records_accepted: 3,
            query: QueryOutcome::Winners {
                documents: vec!["30904930".to_string()],
            },
        }
    );
    assert_eq!(ctx.connector.dials(), 4);
    assert!(ctx.sleeper.delays().is_empty());

    let events = ctx.events.events();
    assert!(events.contains(&ClientEvent::NotifyAcknowledged));
    assert!(events.contains(&ClientEvent::WinnersReceived { count: 1 }));
    assert!(matches!(events.last(), Some(ClientEvent::RunComplete { .. })));
}

#[tokio::test]
async fn test_no_records_means_no_io() {
    let ctx = TestContext::new(Vec::new(), &[]);

    let outcome = ctx.client("2", 2).run().await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToSend);
    assert_eq!(ctx.connector.dials(), 0);
    assert_eq!(ctx.source.loads(), 1);
    assert_eq!(ctx.events.events(), vec![ClientEvent::NothingToSend]);
}

#[tokio::test]
async fn test_pending_signal_skips_the_run() {
    let ctx = TestContext::new(Vec::new(), &[BET_1]);
    ctx.shutdown.request();

    let outcome = ctx.client("1", 2).run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped);
    assert_eq!(ctx.source.loads(), 0);
    assert_eq!(ctx.connector.dials(), 0);
    assert_eq!(ctx.events.events(), vec![ClientEvent::ExitOnSignal]);
}

#[tokio::test]
async fn test_batch_is_resent_after_connect_exhaustion() {
    let ctx = TestContext::new(
        vec![
            refused(),
            refused(),
            refused(),
            Ok(exchange(&batch_frame("1", &[BET_1]), b"success|1\n")),
            Ok(exchange(&notify_frame("1"), b"ack_notify\n")),
            Ok(exchange(&query_frame("1"), b"ok|0\n")),
        ],
        &[BET_1],
    );

    let outcome = ctx.client("1", 5).run().await.unwrap();

    match outcome {
        RunOutcome::Completed { records_accepted, query, .. } => {
            assert_eq!(records_accepted, 1);
            assert_eq!(query, QueryOutcome::Winners { documents: Vec::new() });
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    // two dial delays inside the first attempt, one between batch attempts
    assert_eq!(ctx.sleeper.delays(), vec![Duration::from_secs(1); 3]);
    let batch_retries = ctx
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::BatchRetry { .. }))
        .count();
    assert_eq!(batch_retries, 1);
}

#[tokio::test]
async fn test_exhausted_batch_aborts_the_run() {
    let ctx = TestContext::new(Vec::new(), &[BET_1, BET_2, BET_3]);

    let err = ctx.client("1", 2).run().await.unwrap_err();

    match err {
        ClientError::BatchDelivery { index, attempts, .. } => {
            assert_eq!(index, 0);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // 3 batch attempts x 3 dials; no later batch, notify or query
    assert_eq!(ctx.connector.dials(), 9);
}

#[tokio::test]
async fn test_rejected_batch_stops_remaining_batches() {
    let ctx = TestContext::new(
        vec![Ok(exchange(&batch_frame("1", &[BET_1, BET_2]), b"fail|2\n"))],
        &[BET_1, BET_2, BET_3],
    );

    let outcome = ctx.client("1", 2).run().await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::BatchRejected {
            batch_index: 0,
            status: BatchStatus::Fail,
            count: 2,
            records_submitted: 2,
            records_accepted: 0,
        }
    );
    assert_eq!(ctx.connector.dials(), 1);
    assert!(ctx.sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_malformed_batch_response_is_resent() {
    let ctx = TestContext::new(
        vec![
            Ok(exchange(&batch_frame("1", &[BET_1]), b"success|x\n")),
            Ok(exchange(&batch_frame("1", &[BET_1]), b"success|1\n")),
            Ok(exchange(&notify_frame("1"), b"ack_notify\n")),
            Ok(exchange(&query_frame("1"), b"ok|0\n")),
        ],
        &[BET_1],
    );

    let outcome = ctx.client("1", 2).run().await.unwrap();

    match outcome {
        RunOutcome::Completed { batches, records_accepted, .. } => {
            assert_eq!(
                batches,
                vec![BatchReport { index: 0, size: 1, status: BatchStatus::Success, count: 1 }]
            );
            assert_eq!(records_accepted, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // 2 batch attempts, then notify and query
    assert_eq!(ctx.connector.dials(), 4);
    assert_eq!(ctx.sleeper.delays(), vec![Duration::from_secs(1)]);

    let events = ctx.events.events();
    assert!(events.iter().any(|e| matches!(e, ClientEvent::ProtocolError { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, ClientEvent::BatchRetry { index: 0, attempt: 1, .. })));
}

#[tokio::test]
async fn test_persistently_malformed_batch_response_aborts() {
    let ctx = TestContext::new(
        vec![
            Ok(exchange(&batch_frame("1", &[BET_1]), b"bad\n")),
            Ok(exchange(&batch_frame("1", &[BET_1]), b"bad\n")),
            Ok(exchange(&batch_frame("1", &[BET_1]), b"bad\n")),
        ],
        &[BET_1],
    );

    let err = ctx.client("1", 2).run().await.unwrap_err();

    match err {
        ClientError::BatchDelivery { index, attempts, source } => {
            assert_eq!(index, 0);
            assert_eq!(attempts, 3);
            assert!(matches!(
                *source,
                ClientError::Decode(DecodeError::FieldCount { found: 1, .. })
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(ctx.connector.dials(), 3);
    assert_eq!(ctx.sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_unexpected_notify_response_aborts() {
    let ctx = TestContext::new(
        vec![
            Ok(exchange(&batch_frame("1", &[BET_1]), b"success|1\n")),
            Ok(exchange(&notify_frame("1"), b"ack\n")),
        ],
        &[BET_1],
    );

    let err = ctx.client("1", 2).run().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Decode(DecodeError::UnrecognizedResponse(_))
    ));
    assert_eq!(ctx.connector.dials(), 2);
    assert!(!ctx
        .events
        .events()
        .iter()
        .any(|e| matches!(e, ClientEvent::RunComplete { .. })));
}

#[tokio::test]
async fn test_partial_acceptance_is_accounted() {
    let ctx = TestContext::new(
        vec![
            Ok(exchange(&batch_frame("7", &[BET_1, BET_2, BET_3]), b"success|2\n")),
            Ok(exchange(&notify_frame("7"), b"ack_notify\n")),
            Ok(exchange(&query_frame("7"), b"fail-no_sorteo\n")),
        ],
        &[BET_1, BET_2, BET_3],
    );

    let outcome = ctx.client("7", 10).run().await.unwrap();

    match outcome {
        RunOutcome::Completed {
            records_submitted,
            records_accepted,
            query,
            ..
        } => {
            assert_eq!(records_submitted, 3);
            assert_eq!(records_accepted, 2);
            assert_eq!(query, QueryOutcome::Failed { reason: "no_sorteo".to_string() });
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}
