//! Stream transport with per-operation retry
//!
//! One connection per request. A fresh buffered reader lives inside each
//! [`Connection`], so nothing is carried over between requests.

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use shared::{RequestKind, ServerResponse};

use crate::errors::{ClientError, Result};
use crate::events::{ClientEvent, EventSink};
use crate::retry_strategy::{RetryError, RetryPolicy, Sleeper};

/// Opens byte streams to the server
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, address: &str) -> io::Result<Self::Stream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// A live connection, exclusively owned by the request that opened it
///
/// Dropping it closes the socket; [`Connection::close`] also sends a clean
/// shutdown first.
pub struct Connection<S> {
    stream: BufReader<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Write the whole buffer, looping over short writes
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let n = self.stream.write(&bytes[written..]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("connection closed after {written} of {} bytes", bytes.len()),
                ));
            }
            written += n;
        }
        self.stream.flush().await
    }

    /// Read through the next `\n`; end of stream returns whatever was read
    async fn read_line_once(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.stream.read_line(&mut line).await?;
        Ok(line)
    }

    pub async fn close(mut self) {
        let _ = self.stream.get_mut().shutdown().await;
    }
}

/// Connects to one server address and applies the retry policy to dials and reads
pub struct Transport<C> {
    connector: C,
    address: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn EventSink>,
}

impl<C: Connector> Transport<C> {
    pub fn new(
        connector: C,
        address: impl Into<String>,
        retry: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            connector,
            address: address.into(),
            retry,
            sleeper,
            events,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Dial the server, retrying failed attempts with the configured delay
    pub async fn connect(&self) -> Result<Connection<C::Stream>> {
        let result = self
            .retry
            .run(
                self.sleeper.as_ref(),
                |_| true,
                |attempt, err: &io::Error, delay| {
                    self.events.emit(ClientEvent::ConnectRetry {
                        attempt,
                        error: err.to_string(),
                        delay_ms: ClientEvent::delay_ms(delay),
                    })
                },
                |_| self.connector.connect(&self.address),
            )
            .await;

        match result {
            Ok(stream) => Ok(Connection::new(stream)),
            Err(RetryError::Exhausted { attempts, last }) => Err(ClientError::Connect {
                address: self.address.clone(),
                attempts,
                source: last,
            }),
            Err(RetryError::Fatal(source)) => Err(ClientError::Connect {
                address: self.address.clone(),
                attempts: 1,
                source,
            }),
        }
    }

    /// Read one response line, retrying read errors on the same connection
    pub async fn read_line(&self, conn: &mut Connection<C::Stream>) -> Result<String> {
        let mut backoff = self.retry.create_backoff();
        let mut attempt = 1;

        loop {
            match conn.read_line_once().await {
                Ok(line) => return Ok(line),
                Err(err) if self.retry.should_retry(attempt) => {
                    let delay = backoff.next_backoff().unwrap_or_default();
                    self.events.emit(ClientEvent::ReadRetry {
                        attempt,
                        error: err.to_string(),
                        delay_ms: ClientEvent::delay_ms(delay),
                    });
                    metrics::counter!("client_retries_total").increment(1);
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(ClientError::Io(err)),
            }
        }
    }

    /// Connect, send one frame, and decode the first response line
    ///
    /// The connection is handed back so the caller can read any trailing
    /// lines; on error it is dropped here.
    pub async fn request(
        &self,
        kind: RequestKind,
        frame: &[u8],
    ) -> Result<(Connection<C::Stream>, ServerResponse)> {
        let mut conn = self.connect().await?;
        conn.write_all(frame).await?;
        let line = self.read_line(&mut conn).await?;

        match ServerResponse::decode(kind, &line) {
            Ok(response) => Ok((conn, response)),
            Err(err) => {
                self.events.emit(ClientEvent::ProtocolError {
                    request: kind,
                    error: err.to_string(),
                });
                Err(err.into())
            }
        }
    }
}
