//! Outcome events emitted by the client
//!
//! Components report what happened through an injected [`EventSink`] instead
//! of a process-wide logger. The production sink renders events with
//! `tracing`; tests collect them with [`MemorySink`].

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use shared::{AgencyId, BatchStatus, RequestKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    ConnectRetry {
        attempt: u32,
        error: String,
        delay_ms: u64,
    },
    ReadRetry {
        attempt: u32,
        error: String,
        delay_ms: u64,
    },
    BatchSent {
        index: usize,
        size: usize,
        status: BatchStatus,
        count: u64,
    },
    BatchRetry {
        index: usize,
        attempt: u32,
        error: String,
        delay_ms: u64,
    },
    NotifyAcknowledged,
    QueryInProgress {
        attempt: u32,
    },
    QueryFailed {
        reason: String,
    },
    WinnersReceived {
        count: usize,
    },
    DrawNotReady {
        attempts: u32,
    },
    NothingToSend,
    ExitOnSignal,
    RunComplete {
        summary: String,
    },
    ProtocolError {
        request: RequestKind,
        error: String,
    },
}

impl ClientEvent {
    pub fn delay_ms(delay: Duration) -> u64 {
        delay.as_millis().try_into().unwrap_or(u64::MAX)
    }
}

/// Receives outcome events; delivery failures never affect the caller
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

/// Renders events as structured `tracing` records
///
/// Field names follow the `action | result` vocabulary the lottery server
/// operators grep for.
#[derive(Debug, Clone)]
pub struct TracingSink {
    agency: AgencyId,
}

impl TracingSink {
    pub fn new(agency: AgencyId) -> Self {
        Self { agency }
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: ClientEvent) {
        let agency = self.agency.as_str();
        match event {
            ClientEvent::ConnectRetry { attempt, error, delay_ms } => {
                warn!(action = "dial_retry", result = "in_progress", agency, attempt, %error, delay_ms);
            }
            ClientEvent::ReadRetry { attempt, error, delay_ms } => {
                warn!(action = "read_response_retry", result = "in_progress", agency, attempt, %error, delay_ms);
            }
            ClientEvent::BatchSent { index, size, status, count } => {
                if status.is_success() {
                    info!(action = "apuesta_enviada", result = "success", agency, batch = index, size, count);
                } else {
                    error!(action = "apuesta_enviada", result = "fail", agency, batch = index, size, status = status.as_str(), count);
                }
            }
            ClientEvent::BatchRetry { index, attempt, error, delay_ms } => {
                warn!(action = "send_batch_retry", result = "in_progress", agency, batch = index, attempt, %error, delay_ms);
            }
            ClientEvent::NotifyAcknowledged => {
                info!(action = "notify_finished", result = "success", agency);
            }
            ClientEvent::QueryInProgress { attempt } => {
                debug!(action = "consulta_ganadores", result = "in_progress", agency, attempt);
            }
            ClientEvent::QueryFailed { reason } => {
                error!(action = "consulta_ganadores", result = "fail", agency, %reason);
            }
            ClientEvent::WinnersReceived { count } => {
                info!(action = "consulta_ganadores", result = "success", agency, cant_ganadores = count);
            }
            ClientEvent::DrawNotReady { attempts } => {
                error!(action = "consulta_ganadores", result = "fail", agency, attempts, "draw never became ready");
            }
            ClientEvent::NothingToSend => {
                info!(action = "send_batches", result = "success", agency, "no bets to send");
            }
            ClientEvent::ExitOnSignal => {
                info!(action = "exit", result = "success", agency, "SIGTERM received");
            }
            ClientEvent::RunComplete { summary } => {
                info!(action = "exit", result = "success", agency, %summary);
            }
            ClientEvent::ProtocolError { request, error } => {
                error!(action = request.as_str(), result = "fail", agency, %error, "protocol error");
            }
        }
    }
}

/// Collects events in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ClientEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ClientEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
