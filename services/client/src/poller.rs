//! Winner query polling
//!
//! Repeats the winners query until the server reports the draw result, a
//! permanent failure, or the attempt budget runs out. Every attempt uses a
//! fresh connection.

use serde::Serialize;

use shared::{encode_query_request, AgencyId, RequestKind, ServerResponse};

use crate::errors::{ClientError, Result};
use crate::events::ClientEvent;
use crate::retry_strategy::{RetryError, RetryPolicy};
use crate::transport::{Connection, Connector, Transport};

/// How a winners poll ended; none of these is an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Draw complete; document ids of this agency's winners
    Winners { documents: Vec<String> },
    /// Server reported a permanent failure with this reason code
    Failed { reason: String },
    /// Every attempt observed an in-progress draw
    DrawNotReady { attempts: u32 },
}

enum PollStep {
    NotReady,
    Abort(ClientError),
}

pub struct WinnerPoller<'a, C> {
    transport: &'a Transport<C>,
    policy: RetryPolicy,
}

impl<'a, C: Connector> WinnerPoller<'a, C> {
    pub fn new(transport: &'a Transport<C>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn poll(&self, agency: &AgencyId) -> Result<QueryOutcome> {
        let frame = encode_query_request(agency);
        let frame = frame.as_slice();
        let events = self.transport.events();

        let result = self
            .policy
            .run(
                self.transport.sleeper(),
                |step: &PollStep| matches!(step, PollStep::NotReady),
                |_, _, _| {},
                |attempt| async move {
                    metrics::counter!("client_query_attempts_total").increment(1);
                    self.attempt(attempt, frame).await
                },
            )
            .await;

        match result {
            Ok(outcome) => {
                match &outcome {
                    QueryOutcome::Winners { documents } => {
                        events.emit(ClientEvent::WinnersReceived {
                            count: documents.len(),
                        })
                    }
                    QueryOutcome::Failed { reason } => events.emit(ClientEvent::QueryFailed {
                        reason: reason.clone(),
                    }),
                    QueryOutcome::DrawNotReady { .. } => {}
                }
                Ok(outcome)
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                events.emit(ClientEvent::DrawNotReady { attempts });
                Ok(QueryOutcome::DrawNotReady { attempts })
            }
            Err(RetryError::Fatal(PollStep::Abort(err))) => Err(err),
            // NotReady is always retryable and only surfaces as exhaustion
            Err(RetryError::Fatal(PollStep::NotReady)) => Ok(QueryOutcome::DrawNotReady {
                attempts: self.policy.max_attempts(),
            }),
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        frame: &[u8],
    ) -> std::result::Result<QueryOutcome, PollStep> {
        let (mut conn, response) = self
            .transport
            .request(RequestKind::QueryWinners, frame)
            .await
            .map_err(PollStep::Abort)?;

        match response {
            ServerResponse::QueryInProgress => {
                self.transport
                    .events()
                    .emit(ClientEvent::QueryInProgress { attempt });
                conn.close().await;
                Err(PollStep::NotReady)
            }
            ServerResponse::QueryFail(reason) => {
                conn.close().await;
                Ok(QueryOutcome::Failed { reason })
            }
            ServerResponse::QueryOk(count) => {
                let documents = self
                    .read_documents(&mut conn, count)
                    .await
                    .map_err(PollStep::Abort)?;
                conn.close().await;
                Ok(QueryOutcome::Winners { documents })
            }
            other => Err(PollStep::Abort(ClientError::UnexpectedResponse {
                request: RequestKind::QueryWinners,
                line: format!("{other:?}"),
            })),
        }
    }

    async fn read_documents(
        &self,
        conn: &mut Connection<C::Stream>,
        count: u64,
    ) -> Result<Vec<String>> {
        let mut documents = Vec::with_capacity(count.min(1024) as usize);
        for read in 0..count {
            let line = self.transport.read_line(conn).await?;
            if line.is_empty() {
                return Err(ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("server closed after {read} of {count} winner documents"),
                )));
            }
            documents.push(line.trim().to_string());
        }
        Ok(documents)
    }
}
