//! Wire codec for the lottery submission protocol
//!
//! Every request payload is framed as `"<decimal-byte-length>;" + payload`.
//! Responses are single `\n`-terminated lines whose kind is decided by their
//! literal prefix; a winners response is followed by one line per document.

use serde::Serialize;

use crate::constants::*;
use crate::errors::DecodeError;
use crate::types::{AgencyId, Batch};

/// Which request a response line answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Batch,
    NotifyFinished,
    QueryWinners,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Batch => "batch",
            RequestKind::NotifyFinished => TAG_NOTIFY_FINISHED,
            RequestKind::QueryWinners => TAG_QUERY_WINNERS,
        }
    }
}

/// Prepend the decimal payload length and the frame separator
pub fn encode_framed(payload: &[u8]) -> Vec<u8> {
    let header = payload.len().to_string();
    let mut frame = Vec::with_capacity(header.len() + 1 + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.push(FRAME_SEPARATOR);
    frame.extend_from_slice(payload);
    frame
}

pub fn encode_batch_request(batch: &Batch) -> Vec<u8> {
    let mut payload = format!(
        "{TAG_AGENCY_ID}{FIELD_SEPARATOR}{}{LINE_TERMINATOR}",
        batch.agency
    );
    for record in batch.records() {
        payload.push_str(record.as_str());
        payload.push(LINE_TERMINATOR);
    }
    encode_framed(payload.as_bytes())
}

pub fn encode_notify_request(agency: &AgencyId) -> Vec<u8> {
    let payload = format!("{TAG_NOTIFY_FINISHED}{FIELD_SEPARATOR}{agency}{LINE_TERMINATOR}");
    encode_framed(payload.as_bytes())
}

pub fn encode_query_request(agency: &AgencyId) -> Vec<u8> {
    let payload = format!("{TAG_QUERY_WINNERS}{FIELD_SEPARATOR}{agency}{LINE_TERMINATOR}");
    encode_framed(payload.as_bytes())
}

/// Status reported by the server for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Fail,
    /// Any other status word; treated as a failure
    Other(String),
}

impl BatchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchStatus::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            BatchStatus::Success => STATUS_SUCCESS,
            BatchStatus::Fail => STATUS_FAIL,
            BatchStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResponse {
    pub status: BatchStatus,
    /// Number of records the server processed
    pub count: u64,
}

/// First line of a winners query response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryHeader {
    InProgress,
    Fail(String),
    /// Number of document lines that follow
    Ok(u64),
}

/// Every response the client understands, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerResponse {
    Batch(BatchResponse),
    NotifyAck,
    QueryInProgress,
    QueryFail(String),
    QueryOk(u64),
}

impl ServerResponse {
    /// Decode the response line to a request of the given kind
    pub fn decode(kind: RequestKind, line: &str) -> Result<Self, DecodeError> {
        match kind {
            RequestKind::Batch => decode_batch_response(line).map(ServerResponse::Batch),
            RequestKind::NotifyFinished => {
                decode_notify_response(line).map(|()| ServerResponse::NotifyAck)
            }
            RequestKind::QueryWinners => Ok(match decode_query_header(line)? {
                QueryHeader::InProgress => ServerResponse::QueryInProgress,
                QueryHeader::Fail(reason) => ServerResponse::QueryFail(reason),
                QueryHeader::Ok(count) => ServerResponse::QueryOk(count),
            }),
        }
    }
}

fn parse_count(value: &str, line: &str) -> Result<u64, DecodeError> {
    value.trim().parse().map_err(|_| DecodeError::InvalidCount {
        value: value.to_string(),
        line: line.to_string(),
    })
}

/// Decode `<status>|<count>`
pub fn decode_batch_response(line: &str) -> Result<BatchResponse, DecodeError> {
    let line = line.trim();
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != 2 {
        return Err(DecodeError::FieldCount {
            expected: 2,
            found: fields.len(),
            line: line.to_string(),
        });
    }

    let count = parse_count(fields[1], line)?;
    let status = match fields[0] {
        STATUS_SUCCESS => BatchStatus::Success,
        STATUS_FAIL => BatchStatus::Fail,
        other => BatchStatus::Other(other.to_string()),
    };
    Ok(BatchResponse { status, count })
}

/// The only valid answer to a finished notice is exactly `ack_notify`
pub fn decode_notify_response(line: &str) -> Result<(), DecodeError> {
    let line = line.trim();
    if line == RESPONSE_ACK_NOTIFY {
        Ok(())
    } else {
        Err(DecodeError::UnrecognizedResponse(line.to_string()))
    }
}

pub fn decode_query_header(line: &str) -> Result<QueryHeader, DecodeError> {
    let line = line.trim();

    if line.starts_with(RESPONSE_QUERY_IN_PROGRESS) {
        return Ok(QueryHeader::InProgress);
    }
    if let Some(reason) = line.strip_prefix(RESPONSE_QUERY_FAIL_PREFIX) {
        return Ok(QueryHeader::Fail(reason.to_string()));
    }

    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields[0] != RESPONSE_QUERY_OK {
        return Err(DecodeError::UnrecognizedResponse(line.to_string()));
    }
    if fields.len() != 2 {
        return Err(DecodeError::FieldCount {
            expected: 2,
            found: fields.len(),
            line: line.to_string(),
        });
    }
    parse_count(fields[1], line).map(QueryHeader::Ok)
}
