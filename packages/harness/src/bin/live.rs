#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Live mode: trials run against a real loopback peer, exercising the full
//! transport stack underneath the dump/cancel race.

use wiredump_harness::{Report, TrialConfig, run_trials};
use wiredump_peer::{Peer, PeerConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Harness(#[from] wiredump_harness::Error),
    #[error(transparent)]
    Peer(#[from] wiredump_peer::Error),
    #[error("harness detected defects: {0}")]
    Defects(Report),
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let config = TrialConfig::default();
    let peer = Peer::start(&PeerConfig::default())?;

    log::info!(
        "running {} trials against {}",
        config.trial_count,
        peer.url()
    );

    let result = run_trials(&config, peer.url()).await;

    peer.stop().await;

    let report = result?;

    log::info!("{report}");

    if report.is_failure() {
        return Err(Error::Defects(report));
    }

    Ok(())
}
