//! Trial execution.
//!
//! Every trial runs on its own spawned task so trials execute with true
//! parallelism across the runtime's worker threads. A serialized run will not
//! reproduce scheduler-dependent interleavings reliably.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wiredump_client::{Client, DumpingClient, RoundTrip};

use crate::{CancelPlan, Error, Trial, TrialConfig};

/// Target used when no transmission happens. Never dialed.
const ISOLATED_URL: &str = "http://peer.invalid/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Response received, echoed payload verified byte-for-byte.
    Completed,
    Canceled,
    TimedOut,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub completed: usize,
    pub canceled: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl Report {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Canceled => self.canceled += 1,
            Outcome::TimedOut => self.timed_out += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.canceled + self.timed_out + self.failed
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.failed > 0
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "completed={} canceled={} timed_out={} failed={}",
            self.completed, self.canceled, self.timed_out, self.failed
        )
    }
}

/// Runs every configured trial concurrently against a live peer.
///
/// Trials are independent; a failing trial is recorded in the report and
/// does not stop the others.
///
/// # Errors
///
/// * If the HTTP client fails to build
/// * If a trial's request cannot be rendered ([`Error::Dump`], fatal)
/// * If a trial task panics
pub async fn run_trials(config: &TrialConfig, url: &str) -> Result<Report, Error> {
    let client = Arc::new(DumpingClient::new(Client::new()?));

    let mut handles = Vec::with_capacity(config.trial_count);

    for index in 0..config.trial_count {
        let trial = Trial::generate(index, config);
        let client = client.clone();
        let url = url.to_owned();
        let trial_timeout = config.trial_timeout;

        handles.push(wiredump_task::spawn("wiredump_trial", async move {
            run_trial(trial, &url, &client, trial_timeout).await
        }));
    }

    finish(handles).await
}

/// Runs a single trial: build the request, arm the cancel plan, then drive
/// the dump-and-transmit path under the per-trial timeout.
///
/// # Errors
///
/// * [`Error::Hang`] - the trial exceeded its timeout
/// * [`Error::BadStatus`] / [`Error::PayloadMismatch`] - the peer observed
///   corrupted bytes
/// * [`Error::Unexpected`] - an error class other than cancellation/timeout
pub async fn run_trial<T: RoundTrip>(
    trial: Trial,
    url: &str,
    client: &DumpingClient<T>,
    trial_timeout: Duration,
) -> Result<Outcome, Error> {
    let index = trial.index;
    let request = trial.request(url)?;
    let token = CancellationToken::new();

    arm_cancellation(trial.cancel_plan, &token, index);

    match tokio::time::timeout(trial_timeout, client.send(&request, &token)).await {
        Err(_elapsed) => Err(Error::Hang {
            index,
            timeout: trial_timeout,
        }),
        Ok(Ok(response)) => {
            if response.status() != 200 {
                return Err(Error::BadStatus {
                    index,
                    status: response.status(),
                });
            }
            if response.body().as_ref() == trial.payload.as_ref() {
                log::debug!("trial {index}: completed");
                Ok(Outcome::Completed)
            } else {
                Err(Error::PayloadMismatch {
                    index,
                    sent: trial.payload.len(),
                    observed: response.body().len(),
                })
            }
        }
        Ok(Err(wiredump_client::Error::Canceled)) => {
            log::debug!("trial {index}: canceled");
            Ok(Outcome::Canceled)
        }
        Ok(Err(wiredump_client::Error::Timeout)) => {
            log::debug!("trial {index}: timed out");
            Ok(Outcome::TimedOut)
        }
        Ok(Err(wiredump_client::Error::Dump(source))) => Err(Error::Dump(source)),
        Ok(Err(source)) => Err(Error::Unexpected { index, source }),
    }
}

/// Runs every configured trial concurrently with no network send.
///
/// Preserves the concurrent access pattern of the live mode: the dump
/// operation and a simulated transport read consume the same body buffer
/// while the cancel plan races both.
///
/// # Errors
///
/// * Same failure classes as [`run_trials`], minus client construction
pub async fn run_isolated(config: &TrialConfig) -> Result<Report, Error> {
    let mut handles = Vec::with_capacity(config.trial_count);

    for index in 0..config.trial_count {
        let trial = Trial::generate(index, config);
        let trial_timeout = config.trial_timeout;

        handles.push(wiredump_task::spawn("wiredump_trial", async move {
            run_isolated_trial(trial, trial_timeout).await
        }));
    }

    finish(handles).await
}

/// Single no-network trial: dump the request while a spawned task walks the
/// same body buffer, racing the cancel plan.
///
/// # Errors
///
/// * [`Error::Hang`] - the trial exceeded its timeout
/// * [`Error::PayloadMismatch`] - dump or read observed corrupted bytes
pub async fn run_isolated_trial(trial: Trial, trial_timeout: Duration) -> Result<Outcome, Error> {
    let index = trial.index;
    let request = trial.request(ISOLATED_URL)?;
    let token = CancellationToken::new();

    arm_cancellation(trial.cancel_plan, &token, index);

    let body = request.body().clone();
    let reader = wiredump_task::spawn("wiredump_transport_read", async move {
        // Consume the buffer the way a transport write loop would.
        let mut observed = 0_usize;
        for chunk in body.chunks(1024) {
            observed += chunk.len();
            tokio::task::yield_now().await;
        }
        observed
    });

    let work = async {
        let dump = wiredump::dump_request_out(&request)?;
        log::trace!("request dump:\n{}", String::from_utf8_lossy(&dump));
        let observed = reader.await?;
        Ok::<_, Error>((dump, observed))
    };

    let raced = tokio::time::timeout(trial_timeout, async {
        tokio::select! {
            // Work first: the dump runs before a pre-fired token can win.
            biased;
            result = work => result.map(Some),
            () = token.cancelled() => Ok(None),
        }
    })
    .await
    .map_err(|_| Error::Hang {
        index,
        timeout: trial_timeout,
    })??;

    match raced {
        None => {
            log::debug!("trial {index}: canceled");
            Ok(Outcome::Canceled)
        }
        Some((dump, observed)) => {
            if observed == trial.payload.len() && dump.ends_with(&trial.payload) {
                log::debug!("trial {index}: completed");
                Ok(Outcome::Completed)
            } else {
                Err(Error::PayloadMismatch {
                    index,
                    sent: trial.payload.len(),
                    observed,
                })
            }
        }
    }
}

fn arm_cancellation(plan: CancelPlan, token: &CancellationToken, index: usize) {
    match plan {
        CancelPlan::Immediate => {
            log::debug!("trial {index}: cancel fired immediately");
            token.cancel();
        }
        CancelPlan::Delayed(delay) => {
            let token = token.clone();
            drop(wiredump_task::spawn("wiredump_cancel", async move {
                tokio::time::sleep(delay).await;
                log::debug!("trial {index}: cancel fired after {delay:?}");
                token.cancel();
            }));
        }
    }
}

async fn finish(handles: Vec<JoinHandle<Result<Outcome, Error>>>) -> Result<Report, Error> {
    let mut report = Report::default();

    for result in join_all(handles).await {
        match result? {
            Ok(outcome) => report.record(outcome),
            // Request construction failures abort the whole run.
            Err(source @ Error::Dump(_)) => return Err(source),
            Err(source) => {
                log::error!("{source}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_immediate_cancel_still_renders_dump() {
        // An oversized body makes the dump fail. The failure is only
        // observable if the dump actually runs despite the pre-fired cancel.
        let trial = Trial {
            index: 0,
            payload: Bytes::from(vec![b'a'; 16 * 1024 * 1024 + 1]),
            cancel_plan: CancelPlan::Immediate,
        };

        let result = run_isolated_trial(trial, Duration::from_secs(5)).await;

        assert!(matches!(
            result,
            Err(Error::Dump(wiredump::Error::BodyTooLarge { .. }))
        ));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_immediate_cancel_trial_reports_canceled() {
        let trial = Trial {
            index: 1,
            payload: Bytes::from_static(b"cGF5bG9hZA=="),
            cancel_plan: CancelPlan::Immediate,
        };

        let outcome = run_isolated_trial(trial, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Canceled | Outcome::Completed));
    }
}
