#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Isolated mode: no network send. The dump operation races a simulated
//! transport read of the same body buffer, plus the cancel plan.

use wiredump_harness::{Report, TrialConfig, run_isolated};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Harness(#[from] wiredump_harness::Error),
    #[error("harness detected defects: {0}")]
    Defects(Report),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let config = TrialConfig::default();

    log::info!("running {} isolated trials", config.trial_count);

    let report = run_isolated(&config).await?;

    log::info!("{report}");

    if report.is_failure() {
        return Err(Error::Defects(report));
    }

    Ok(())
}
