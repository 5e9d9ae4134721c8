#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use wiredump::{Method, OutboundRequest};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum Error {
    #[error("request canceled")]
    Canceled,
    #[error("request timed out")]
    Timeout,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Dump(#[from] wiredump::Error),
}

pub struct Response {
    status: u16,
    body: Bytes,
}

impl Response {
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }
}

/// The seam between the plain send path and decorators wrapping it.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, request: &OutboundRequest) -> Result<Response, Error>;
}

pub struct Client(reqwest::Client);

impl Client {
    /// Creates a client configured for a slow, single-request-per-connection
    /// peer: connection pooling disabled, short dial timeout, bounded overall
    /// request timeout, and TLS verification disabled for test endpoints.
    ///
    /// # Errors
    ///
    /// * If the underlying `reqwest::Client` fails to build
    pub fn new() -> Result<Self, Error> {
        Ok(Self(
            reqwest::Client::builder()
                .pool_max_idle_per_host(0)
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .danger_accept_invalid_certs(true)
                .build()?,
        ))
    }

    #[must_use]
    pub const fn from_reqwest(client: reqwest::Client) -> Self {
        Self(client)
    }
}

#[async_trait]
impl RoundTrip for Client {
    async fn round_trip(&self, request: &OutboundRequest) -> Result<Response, Error> {
        let mut builder = self.0.request(into_reqwest_method(request.method()), request.url());

        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        // Bytes body: the transport reads the same buffer the dump reads.
        builder = builder.body(request.body().clone());

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(Response { status, body })
    }
}

/// Decorator that dumps the outgoing request immediately before delegating
/// transmission, the same lifecycle point a production logging wrapper uses.
pub struct DumpingClient<T: RoundTrip> {
    inner: T,
}

impl<T: RoundTrip> DumpingClient<T> {
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Sends the request, racing it against the cancellation token.
    ///
    /// The dump+transmit future is polled first, so every send renders the
    /// dump and hands the request to the transport even when the token has
    /// already fired. Past that first poll the race is unconstrained:
    /// cancellation may land while the dump reads the body, mid-transmit, or
    /// never. Transport errors observed while the token is already canceled
    /// are classified as [`Error::Canceled`] (the connection was torn down
    /// mid-flight); reqwest deadline errors become [`Error::Timeout`].
    ///
    /// # Errors
    ///
    /// * [`Error::Canceled`] - the token fired before a response arrived
    /// * [`Error::Timeout`] - the overall request timeout elapsed
    /// * [`Error::Dump`] - the request could not be rendered (fatal)
    /// * [`Error::Http`] - any other transport failure
    pub async fn send(
        &self,
        request: &OutboundRequest,
        token: &CancellationToken,
    ) -> Result<Response, Error> {
        tokio::select! {
            // Work first: a pre-fired token must still let the dump run and
            // the send reach the transport before cancellation wins.
            biased;
            result = self.round_trip(request) => match result {
                Err(Error::Http(source)) if token.is_cancelled() => {
                    log::debug!("transport error after cancellation: {source:?}");
                    Err(Error::Canceled)
                }
                Err(Error::Http(source)) if source.is_timeout() => Err(Error::Timeout),
                other => other,
            },
            () = token.cancelled() => Err(Error::Canceled),
        }
    }
}

#[async_trait]
impl<T: RoundTrip> RoundTrip for DumpingClient<T> {
    async fn round_trip(&self, request: &OutboundRequest) -> Result<Response, Error> {
        let dump = wiredump::dump_request_out(request)?;

        log::trace!("request dump:\n{}", String::from_utf8_lossy(&dump));

        self.inner.round_trip(request).await
    }
}

fn into_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Connect => reqwest::Method::CONNECT,
        Method::Trace => reqwest::Method::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct StubRoundTrip {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl RoundTrip for StubRoundTrip {
        async fn round_trip(&self, _request: &OutboundRequest) -> Result<Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Response {
                status: 200,
                body: Bytes::from_static(b"ok"),
            })
        }
    }

    fn request() -> OutboundRequest {
        OutboundRequest::post("http://127.0.0.1:9/")
            .header("Content-Type", "application/soap+xml")
            .header("Charset", "utf-8")
            .body(Bytes::from_static(b"payload"))
            .build()
            .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_send_completes_when_token_never_fires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = DumpingClient::new(StubRoundTrip {
            calls: calls.clone(),
            delay: Duration::ZERO,
        });
        let token = CancellationToken::new();

        let response = client.send(&request(), &token).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_send_cancels_slow_round_trip() {
        let client = DumpingClient::new(StubRoundTrip {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_secs(30),
        });
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let result = client.send(&request(), &token).await;

        assert!(matches!(result, Err(Error::Canceled)));
    }

    #[test_log::test(tokio::test)]
    async fn test_send_with_pre_canceled_token_resolves_without_fault() {
        let client = DumpingClient::new(StubRoundTrip {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_millis(50),
        });
        let token = CancellationToken::new();
        token.cancel();
        // Firing again must be harmless (one-shot, idempotent signal).
        token.cancel();

        let result = client.send(&request(), &token).await;

        assert!(matches!(result, Ok(_) | Err(Error::Canceled)));
    }

    #[test_log::test(tokio::test)]
    async fn test_pre_canceled_token_still_dumps_and_transmits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = DumpingClient::new(StubRoundTrip {
            calls: calls.clone(),
            delay: Duration::from_millis(50),
        });

        for _ in 0..200 {
            let token = CancellationToken::new();
            token.cancel();

            let result = client.send(&request(), &token).await;

            assert!(matches!(result, Err(Error::Canceled)));
        }

        // Every send entered the transport; the dump runs just before it.
        assert_eq!(calls.load(Ordering::SeqCst), 200);
    }

    #[test_log::test(tokio::test)]
    async fn test_dumping_round_trip_leaves_request_intact() {
        let client = DumpingClient::new(StubRoundTrip {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        });
        let request = request();
        let body_before = request.body().clone();

        client.round_trip(&request).await.unwrap();

        assert_eq!(request.body(), &body_before);
        assert_eq!(request.headers().len(), 2);
    }
}
