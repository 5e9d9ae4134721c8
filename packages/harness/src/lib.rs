#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Concurrent fault-injection harness.
//!
//! Runs many independent trials in parallel. Each trial races a one-shot
//! cancellation signal against a dump-and-transmit operation on the same
//! request, with randomized payloads and randomized cancellation timing. The
//! harness has no success criterion beyond "no crash, no detected race, no
//! hang": a transmission error caused by cancellation is an accepted outcome.

use std::time::Duration;

use thiserror::Error;

mod run;
mod trial;

pub use run::{Outcome, Report, run_isolated, run_isolated_trial, run_trial, run_trials};
pub use trial::{CHARSET, CONTENT_TYPE, CancelPlan, Trial, TrialConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Dump(#[from] wiredump::Error),
    #[error(transparent)]
    Client(#[from] wiredump_client::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("trial {index} exceeded its {timeout:?} timeout")]
    Hang { index: usize, timeout: Duration },
    #[error("trial {index} failed with unexpected error: {source}")]
    Unexpected {
        index: usize,
        source: wiredump_client::Error,
    },
    #[error("trial {index} got unexpected status {status}")]
    BadStatus { index: usize, status: u16 },
    #[error("trial {index} payload mismatch: sent {sent} bytes, peer observed {observed}")]
    PayloadMismatch {
        index: usize,
        sent: usize,
        observed: usize,
    },
}
