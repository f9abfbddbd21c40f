//! Common test utilities and fixtures for client integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::io::{Builder, Mock};

use agency_client::bet_source::BetSource;
use agency_client::events::MemorySink;
use agency_client::retry_strategy::{RetryPolicy, Sleeper};
use agency_client::shutdown::ShutdownFlag;
use agency_client::transport::{Connector, Transport};
use agency_client::SubmissionClient;
use shared::{AgencyId, BetRecord};

pub const IN_PROGRESS: &[u8] = b"in_progress-sorteo_no_listo\n";

/// Wrap a payload the way the client frames every request
pub fn frame(payload: &str) -> Vec<u8> {
    format!("{};{}", payload.len(), payload).into_bytes()
}

pub fn batch_frame(agency: &str, records: &[&str]) -> Vec<u8> {
    let mut payload = format!("agency_ID|{agency}\n");
    for record in records {
        payload.push_str(record);
        payload.push('\n');
    }
    frame(&payload)
}

pub fn notify_frame(agency: &str) -> Vec<u8> {
    frame(&format!("notify_finished|{agency}\n"))
}

pub fn query_frame(agency: &str) -> Vec<u8> {
    frame(&format!("query_winners|{agency}\n"))
}

/// A connection that expects exactly `request` and answers with `response`
pub fn exchange(request: &[u8], response: &[u8]) -> Mock {
    Builder::new().write(request).read(response).build()
}

pub fn refused() -> io::Result<Mock> {
    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
}

/// Hands out scripted connections in order; refuses once the script runs out
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<VecDeque<io::Result<Mock>>>>,
    dials: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<io::Result<Mock>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            dials: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Stream = Mock;

    async fn connect(&self, _address: &str) -> io::Result<Mock> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(refused)
    }
}

/// Records requested delays instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// In-memory bet records for one agency
pub struct MemoryBetSource {
    records: Vec<BetRecord>,
    loads: AtomicUsize,
}

impl MemoryBetSource {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            records: lines.iter().map(|l| BetRecord::new(*l).unwrap()).collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BetSource for MemoryBetSource {
    async fn load(&self, _agency: &AgencyId) -> anyhow::Result<Vec<BetRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

pub fn agency(id: &str) -> AgencyId {
    AgencyId::try_from(id).unwrap()
}

pub fn retry_policy() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_secs(1))
}

pub fn query_policy() -> RetryPolicy {
    RetryPolicy::fixed(30, Duration::from_secs(1))
}

/// Test context wiring a client to scripted collaborators
pub struct TestContext {
    pub connector: ScriptedConnector,
    pub sleeper: Arc<RecordingSleeper>,
    pub events: Arc<MemorySink>,
    pub source: Arc<MemoryBetSource>,
    pub shutdown: ShutdownFlag,
}

impl TestContext {
    pub fn new(script: Vec<io::Result<Mock>>, records: &[&str]) -> Self {
        Self {
            connector: ScriptedConnector::new(script),
            sleeper: Arc::new(RecordingSleeper::default()),
            events: Arc::new(MemorySink::new()),
            source: Arc::new(MemoryBetSource::new(records)),
            shutdown: ShutdownFlag::new(),
        }
    }

    pub fn transport(&self) -> Transport<ScriptedConnector> {
        Transport::new(
            self.connector.clone(),
            "server:12345",
            retry_policy(),
            self.sleeper.clone(),
            self.events.clone(),
        )
    }

    pub fn client(&self, agency_id: &str, max_batch: usize) -> SubmissionClient<ScriptedConnector> {
        SubmissionClient::new(
            agency(agency_id),
            max_batch,
            self.transport(),
            query_policy(),
            self.source.clone(),
            Arc::new(self.shutdown.clone()),
        )
    }
}
