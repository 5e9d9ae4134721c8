#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use bytes::Bytes;
use strum::{AsRefStr, EnumString};
use thiserror::Error;

mod dump;

pub use dump::{MAX_DUMP_BODY, dump_request_out};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),
    #[error("invalid header value for {0:?}")]
    InvalidHeaderValue(String),
    #[error("body of {len} bytes exceeds dump limit of {max} bytes")]
    BodyTooLarge { len: usize, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// An outgoing HTTP request as the harness sees it.
///
/// The body is a [`Bytes`] buffer, so cloning the request or handing the body
/// to a transport never copies the payload. The dump operation and the
/// transport read the same underlying buffer.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: Method,
    url: String,
    authority: String,
    path_and_query: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl OutboundRequest {
    pub fn post(url: impl Into<String>) -> OutboundRequestBuilder {
        Self::builder(Method::Post, url)
    }

    pub fn builder(method: Method, url: impl Into<String>) -> OutboundRequestBuilder {
        OutboundRequestBuilder {
            method,
            url: url.into(),
            headers: vec![],
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    #[must_use]
    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }
}

pub struct OutboundRequestBuilder {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl OutboundRequestBuilder {
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// # Errors
    ///
    /// * If the URL is not a parseable http/https URL
    /// * If a header name or value contains characters that cannot appear on
    ///   the wire
    pub fn build(self) -> Result<OutboundRequest, Error> {
        let (authority, path_and_query) = split_url(&self.url)?;

        for (name, value) in &self.headers {
            if name.is_empty()
                || name
                    .chars()
                    .any(|c| c.is_whitespace() || c.is_control() || c == ':')
            {
                return Err(Error::InvalidHeaderName(name.clone()));
            }
            if value.contains(['\r', '\n']) {
                return Err(Error::InvalidHeaderValue(name.clone()));
            }
        }

        Ok(OutboundRequest {
            method: self.method,
            url: self.url,
            authority,
            path_and_query,
            headers: self.headers,
            body: self.body,
        })
    }
}

fn split_url(url: &str) -> Result<(String, String), Error> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

    let (authority, path_and_query) = rest
        .split_once('/')
        .map_or((rest, String::from("/")), |(authority, path)| {
            (authority, format!("/{path}"))
        });

    if authority.is_empty() {
        return Err(Error::InvalidUrl(url.to_string()));
    }

    Ok((authority.to_string(), path_and_query))
}
