//! Agency client for the lottery submission protocol
//!
//! Submits an agency's bets in batches, notifies the server when done and
//! polls for the draw result.

pub mod batching;
pub mod bet_source;
pub mod config;
pub mod errors;
pub mod events;
pub mod poller;
pub mod retry_strategy;
pub mod shutdown;
pub mod submission;
pub mod transport;

pub use errors::{ClientError, Result};
pub use poller::{QueryOutcome, WinnerPoller};
pub use submission::{BatchReport, RunOutcome, SubmissionClient};
