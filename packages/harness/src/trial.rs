//! Trial generation.
//!
//! A trial is one independent execution of the race-reproduction sequence:
//! a randomized payload, a cancel plan, and nothing else. With a base seed,
//! each trial gets its own seeded generator, so a fixed base seed replays
//! every payload and cancel plan exactly. Without one, trials draw from the
//! process-wide generator.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use wiredump::OutboundRequest;
use wiredump_random::Rng;

pub const CONTENT_TYPE: &str = "application/soap+xml";
pub const CHARSET: &str = "utf-8";

#[derive(Debug, Clone)]
pub struct TrialConfig {
    pub trial_count: usize,
    /// Raw payload size in bytes, before base64 encoding.
    pub payload_size: usize,
    /// Upper bound for the random cancellation delay.
    pub max_delay: Duration,
    /// Per-trial bound that turns a hang into a reported defect.
    pub trial_timeout: Duration,
    /// Base seed for trial generation. `None` draws every trial from the
    /// process-wide generator.
    pub base_seed: Option<u64>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            trial_count: 100,
            payload_size: 10_000,
            max_delay: Duration::from_millis(3000),
            trial_timeout: Duration::from_secs(10),
            base_seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPlan {
    /// Fire the token before transmission begins.
    Immediate,
    /// Sleep, then fire.
    Delayed(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub index: usize,
    /// Base64 text of `payload_size` random bytes.
    pub payload: Bytes,
    pub cancel_plan: CancelPlan,
}

impl Trial {
    /// Generates trial number `index`.
    ///
    /// With a base seed the trial gets its own generator seeded from
    /// `base_seed + index`; otherwise it draws from the process-wide one.
    #[must_use]
    pub fn generate(index: usize, config: &TrialConfig) -> Self {
        let rng = config.base_seed.map_or_else(wiredump_random::rng, |seed| {
            Rng::from_seed(seed.wrapping_add(u64::try_from(index).unwrap_or(u64::MAX)))
        });

        let mut raw = vec![0_u8; config.payload_size];
        rng.fill_bytes(&mut raw);
        let payload = Bytes::from(STANDARD.encode(&raw).into_bytes());

        let max_ms = u64::try_from(config.max_delay.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let cancel_plan = if rng.next_u64() % 2 == 0 {
            CancelPlan::Immediate
        } else {
            CancelPlan::Delayed(Duration::from_millis(rng.gen_range_u64(0..max_ms)))
        };

        Self {
            index,
            payload,
            cancel_plan,
        }
    }

    /// Builds the outgoing request for this trial.
    ///
    /// # Errors
    ///
    /// * If the target URL is not a parseable http/https URL
    pub fn request(&self, url: &str) -> Result<OutboundRequest, wiredump::Error> {
        OutboundRequest::post(url)
            .header("Content-Type", CONTENT_TYPE)
            .header("Charset", CHARSET)
            .body(self.payload.clone())
            .build()
    }
}
