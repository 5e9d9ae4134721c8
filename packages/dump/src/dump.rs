//! Wire-format rendering of outgoing requests.
//!
//! [`dump_request_out`] produces the HTTP/1.1 representation of a request the
//! way it would appear on the wire, including the full body. It reads the
//! request without mutating it, so a caller may invoke it at any point of the
//! request lifecycle, including while the transport is reading the same body
//! buffer.

use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{Error, OutboundRequest};

/// Largest body a dump will materialize.
pub const MAX_DUMP_BODY: usize = 16 * 1024 * 1024;

/// Renders the wire representation of an outgoing request, including body.
///
/// The output is deterministic for a given request: request line, derived
/// `Host` and `Content-Length` headers, the request's own headers in
/// insertion order, a blank line, then the body bytes. Caller-supplied
/// `Host`/`Content-Length` headers take precedence over the derived ones.
///
/// # Errors
///
/// * If the body exceeds [`MAX_DUMP_BODY`]
pub fn dump_request_out(request: &OutboundRequest) -> Result<Bytes, Error> {
    let body = request.body();

    if body.len() > MAX_DUMP_BODY {
        return Err(Error::BodyTooLarge {
            len: body.len(),
            max: MAX_DUMP_BODY,
        });
    }

    let mut buf = BytesMut::with_capacity(256 + body.len());

    buf.put_slice(request.method().as_ref().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(request.path_and_query().as_bytes());
    buf.put_slice(b" HTTP/1.1\r\n");

    let caller_host = header_value(request, "host");
    let caller_content_length = header_value(request, "content-length");

    buf.put_slice(b"Host: ");
    buf.put_slice(caller_host.unwrap_or_else(|| request.authority()).as_bytes());
    buf.put_slice(b"\r\n");

    buf.put_slice(b"Content-Length: ");
    if let Some(value) = caller_content_length {
        buf.put_slice(value.as_bytes());
    } else {
        buf.put_slice(body.len().to_string().as_bytes());
    }
    buf.put_slice(b"\r\n");

    for (name, value) in request.headers() {
        if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }

    buf.put_slice(b"\r\n");

    // The whole point: walk the body bytes themselves, not just the length,
    // so these reads overlap any concurrent transport reads of the buffer.
    buf.put_slice(body);

    Ok(buf.freeze())
}

fn header_value<'a>(request: &'a OutboundRequest, name: &str) -> Option<&'a str> {
    request
        .headers()
        .iter()
        .find(|(header, _)| header.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
