/// Shared constants for the lottery submission protocol
///
/// This module centralizes the wire vocabulary and the default retry tuning
/// so the client and any test server agree on every literal.

use std::time::Duration;

/// Maximum attempts for a dial, a line read, or a full batch send
///
/// Each layer owns its own budget; a batch attempt may itself consume
/// several dial attempts.
pub const MAX_RETRIES: u32 = 3;

/// Fixed delay between attempts of a retried operation
pub const WAIT_TIME: Duration = Duration::from_secs(1);

/// Maximum number of winner queries before the draw is declared not ready
pub const MAX_QUERY_RETRIES: u32 = 30;

/// Delay between two winner queries that observed an in-progress draw
pub const QUERY_WAIT_TIME: Duration = Duration::from_secs(1);

/// Default upper bound on records per batch
pub const DEFAULT_MAX_BATCH: usize = 50;

/// Separates the decimal payload length from the payload in a request frame
pub const FRAME_SEPARATOR: u8 = b';';

/// Separates fields inside request and response lines
pub const FIELD_SEPARATOR: char = '|';

/// Terminates every record line and every response line
pub const LINE_TERMINATOR: char = '\n';

// Request tags
pub const TAG_AGENCY_ID: &str = "agency_ID";
pub const TAG_NOTIFY_FINISHED: &str = "notify_finished";
pub const TAG_QUERY_WINNERS: &str = "query_winners";

// Response tags
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAIL: &str = "fail";
pub const RESPONSE_ACK_NOTIFY: &str = "ack_notify";
pub const RESPONSE_QUERY_OK: &str = "ok";
pub const RESPONSE_QUERY_IN_PROGRESS: &str = "in_progress-sorteo_no_listo";

/// Prefix of a permanent query failure; the remainder is the reason code
pub const RESPONSE_QUERY_FAIL_PREFIX: &str = "fail-";
