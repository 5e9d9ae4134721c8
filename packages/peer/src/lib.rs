#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Ephemeral loopback peer modeling a slow device.
//!
//! The peer accepts a POST, sleeps a random bounded duration, then drains the
//! request body and echoes it back. Keep-alive is disabled so every request
//! gets its own connection, like real devices that refuse pipelined
//! connections. The echoed body is what lets callers verify that the payload
//! survived the round trip byte-for-byte.

use std::time::Duration;

use actix_web::{App, HttpResponse, HttpServer, error::PayloadError, http::KeepAlive, web};
use bytes::BytesMut;
use futures_util::StreamExt as _;
use thiserror::Error;
use wiredump_random::Rng;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no bound address")]
    NoBoundAddress,
}

#[derive(Clone)]
pub struct PeerConfig {
    /// Upper bound on the random pre-drain sleep.
    pub max_delay: Duration,
    /// Seed for the sleep durations. `None` seeds from entropy.
    pub seed: Option<u64>,
    pub workers: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_millis(3000),
            seed: None,
            workers: 2,
        }
    }
}

#[derive(Clone)]
struct State {
    rng: Rng,
    max_delay: Duration,
}

pub struct Peer {
    url: String,
    handle: actix_web::dev::ServerHandle,
}

impl Peer {
    /// Starts the peer on an ephemeral loopback port.
    ///
    /// The server runs on the current tokio runtime until [`Peer::stop`] is
    /// called or the runtime shuts down.
    ///
    /// # Errors
    ///
    /// * If the listener fails to bind
    /// * If no bound address can be determined
    pub fn start(config: &PeerConfig) -> Result<Self, Error> {
        let state = State {
            rng: Rng::from_seed(config.seed),
            max_delay: config.max_delay,
        };

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/", web::post().to(ingest))
        })
        .workers(config.workers)
        .keep_alive(KeepAlive::Disabled)
        .bind(("127.0.0.1", 0))?;

        let addr = *server.addrs().first().ok_or(Error::NoBoundAddress)?;
        let server = server.run();
        let handle = server.handle();

        log::debug!("peer listening on {addr}");

        drop(wiredump_task::spawn("wiredump_peer", server));

        Ok(Self {
            url: format!("http://{addr}"),
            handle,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stops the peer immediately, without waiting for in-flight requests.
    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn ingest(state: web::Data<State>, mut payload: web::Payload) -> HttpResponse {
    let max_ms = u64::try_from(state.max_delay.as_millis()).unwrap_or(u64::MAX);

    if max_ms > 0 {
        let delay = state.rng.gen_range_u64(0..max_ms);
        log::trace!("sleeping {delay}ms before draining body");
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let mut body = BytesMut::new();

    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(chunk) => body.extend_from_slice(&chunk),
            Err(PayloadError::Incomplete(_) | PayloadError::Io(_)) => {
                // The client canceled mid-body. Expected under cancellation.
                log::debug!("payload aborted after {} bytes", body.len());
                return HttpResponse::BadRequest().finish();
            }
            Err(source) => {
                log::error!("payload error: {source:?}");
                return HttpResponse::BadRequest().finish();
            }
        }
    }

    log::trace!("drained {} bytes", body.len());

    HttpResponse::Ok().body(body.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_peer() -> PeerConfig {
        PeerConfig {
            max_delay: Duration::ZERO,
            seed: Some(1),
            workers: 1,
        }
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_peer_echoes_posted_body() {
        let peer = Peer::start(&instant_peer()).unwrap();

        let payload = vec![0xA5_u8; 10_000];
        let response = reqwest::Client::new()
            .post(peer.url())
            .body(payload.clone())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.bytes().await.unwrap().as_ref(), payload.as_slice());

        peer.stop().await;
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_peer_handles_empty_body() {
        let peer = Peer::start(&instant_peer()).unwrap();

        let response = reqwest::Client::new()
            .post(peer.url())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert!(response.bytes().await.unwrap().is_empty());

        peer.stop().await;
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_peer_sleeps_within_bound() {
        let config = PeerConfig {
            max_delay: Duration::from_millis(100),
            seed: Some(7),
            workers: 1,
        };
        let peer = Peer::start(&config).unwrap();

        let start = std::time::Instant::now();
        let response = reqwest::Client::new()
            .post(peer.url())
            .body(&b"timed"[..])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        // The pre-drain sleep is bounded by max_delay; the rest is local
        // socket overhead, covered by the slack.
        let elapsed = start.elapsed();
        assert!(
            elapsed < config.max_delay + Duration::from_millis(900),
            "round trip took {elapsed:?} against a {:?} sleep bound",
            config.max_delay
        );

        peer.stop().await;
    }
}
