//! Submission orchestrator
//!
//! Drives one agency run end to end:
//! `ReadingInput -> Sending(batch i) -> Notifying -> Querying -> Done`,
//! with `Aborted` reachable from any state on an unrecoverable error.
//! Batches go out strictly in order and a batch is never started before the
//! previous response has been read.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use shared::{
    encode_batch_request, encode_notify_request, AgencyId, Batch, BatchResponse, BatchStatus,
    RequestKind, ServerResponse,
};

use crate::batching::chunk;
use crate::bet_source::BetSource;
use crate::errors::{ClientError, Result};
use crate::events::ClientEvent;
use crate::poller::{QueryOutcome, WinnerPoller};
use crate::retry_strategy::{RetryError, RetryPolicy};
use crate::shutdown::ShutdownSignal;
use crate::transport::{Connector, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    ReadingInput,
    Sending(usize),
    Notifying,
    Querying,
    Done,
    Aborted,
}

/// Server answer for one delivered batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub index: usize,
    pub size: usize,
    pub status: BatchStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A stop was requested before the run started; no I/O happened
    Skipped,
    /// The agency has no records
    NothingToSend,
    /// The server refused a batch; later batches were not sent
    BatchRejected {
        batch_index: usize,
        status: BatchStatus,
        count: u64,
        records_submitted: usize,
        records_accepted: u64,
    },
    Completed {
        batches: Vec<BatchReport>,
        records_submitted: usize,
        records_accepted: u64,
        query: QueryOutcome,
    },
}

pub struct SubmissionClient<C> {
    agency: AgencyId,
    max_batch: usize,
    transport: Transport<C>,
    query_policy: RetryPolicy,
    source: Arc<dyn BetSource>,
    shutdown: Arc<dyn ShutdownSignal>,
}

impl<C: Connector> SubmissionClient<C> {
    pub fn new(
        agency: AgencyId,
        max_batch: usize,
        transport: Transport<C>,
        query_policy: RetryPolicy,
        source: Arc<dyn BetSource>,
        shutdown: Arc<dyn ShutdownSignal>,
    ) -> Self {
        Self {
            agency,
            max_batch,
            transport,
            query_policy,
            source,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        if self.shutdown.is_requested() {
            self.transport.events().emit(ClientEvent::ExitOnSignal);
            return Ok(RunOutcome::Skipped);
        }

        let started = Instant::now();
        match self.drive().await {
            Ok(outcome) => {
                self.enter(RunState::Done);
                info!(
                    agency = %self.agency,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.enter(RunState::Aborted);
                Err(e)
            }
        }
    }

    async fn drive(&self) -> Result<RunOutcome> {
        self.enter(RunState::ReadingInput);
        let records = self.source.load(&self.agency).await?;
        if records.is_empty() {
            self.transport.events().emit(ClientEvent::NothingToSend);
            return Ok(RunOutcome::NothingToSend);
        }

        let batches = chunk(&self.agency, records, self.max_batch);
        let mut reports = Vec::with_capacity(batches.len());
        let mut records_submitted = 0;
        let mut records_accepted = 0;

        for batch in &batches {
            self.enter(RunState::Sending(batch.index));
            let response = self.send_batch_with_retry(batch).await?;
            records_submitted += batch.len();

            self.transport.events().emit(ClientEvent::BatchSent {
                index: batch.index,
                size: batch.len(),
                status: response.status.clone(),
                count: response.count,
            });
            metrics::counter!("client_batches_sent_total").increment(1);

            if !response.status.is_success() {
                return Ok(RunOutcome::BatchRejected {
                    batch_index: batch.index,
                    status: response.status,
                    count: response.count,
                    records_submitted,
                    records_accepted,
                });
            }

            records_accepted += response.count;
            metrics::counter!("client_records_accepted_total").increment(response.count);
            reports.push(BatchReport {
                index: batch.index,
                size: batch.len(),
                status: response.status,
                count: response.count,
            });
        }

        self.enter(RunState::Notifying);
        self.notify_finished().await?;

        self.enter(RunState::Querying);
        let query = WinnerPoller::new(&self.transport, self.query_policy.clone())
            .poll(&self.agency)
            .await?;

        let outcome = RunOutcome::Completed {
            batches: reports,
            records_submitted,
            records_accepted,
            query,
        };
        self.transport.events().emit(ClientEvent::RunComplete {
            summary: serde_json::to_string(&outcome).unwrap_or_default(),
        });
        Ok(outcome)
    }

    fn enter(&self, state: RunState) {
        debug!(agency = %self.agency, state = ?state, "State transition");
    }

    /// Send one batch, repeating the whole exchange on transport or decode
    /// failures
    ///
    /// Any decoded answer ends the loop, including a server-side `fail`.
    async fn send_batch_with_retry(&self, batch: &Batch) -> Result<BatchResponse> {
        let frame = encode_batch_request(batch);
        let frame = frame.as_slice();
        let events = self.transport.events();

        debug!(
            batch_id = %batch.batch_id,
            index = batch.index,
            size = batch.len(),
            bytes = frame.len(),
            "Sending batch"
        );

        let result = self
            .transport
            .retry_policy()
            .run(
                self.transport.sleeper(),
                ClientError::is_batch_retryable,
                |attempt, err: &ClientError, delay| {
                    events.emit(ClientEvent::BatchRetry {
                        index: batch.index,
                        attempt,
                        error: err.to_string(),
                        delay_ms: ClientEvent::delay_ms(delay),
                    })
                },
                |_| self.send_batch_once(frame),
            )
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(RetryError::Fatal(err)) => Err(err),
            Err(RetryError::Exhausted { attempts, last }) => Err(ClientError::BatchDelivery {
                index: batch.index,
                attempts,
                source: Box::new(last),
            }),
        }
    }

    async fn send_batch_once(&self, frame: &[u8]) -> Result<BatchResponse> {
        let (conn, response) = self.transport.request(RequestKind::Batch, frame).await?;
        conn.close().await;

        match response {
            ServerResponse::Batch(response) => Ok(response),
            other => Err(ClientError::UnexpectedResponse {
                request: RequestKind::Batch,
                line: format!("{other:?}"),
            }),
        }
    }

    /// Sent once; only the dial is retried
    async fn notify_finished(&self) -> Result<()> {
        let frame = encode_notify_request(&self.agency);
        let (conn, response) = self
            .transport
            .request(RequestKind::NotifyFinished, &frame)
            .await?;
        conn.close().await;

        match response {
            ServerResponse::NotifyAck => {
                self.transport.events().emit(ClientEvent::NotifyAcknowledged);
                Ok(())
            }
            other => Err(ClientError::UnexpectedResponse {
                request: RequestKind::NotifyFinished,
                line: format!("{other:?}"),
            }),
        }
    }
}
