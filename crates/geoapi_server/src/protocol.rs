//! # Wire Protocol
//!
//! The HTTP surface is six GET endpoints, one request per connection, so the
//! parser handles exactly that: a request line, an optional
//! `X-Forwarded-For` header and a flat query string. Anything else in the
//! header block is ignored.
//!
//! ## Request Layout
//!
//! ```text
//! GET /biome?lat_min=0&lat_max=10&width=64 HTTP/1.1\r\n
//! X-Forwarded-For: 203.0.113.9, 10.0.0.1\r\n
//! \r\n
//! ```
//!
//! Query values are taken verbatim (no percent-decoding); every accepted
//! parameter is numeric.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::tile_cache::TileLayer;

/// Largest request head read from a connection.
pub const MAX_REQUEST_BYTES: usize = 4096;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed request head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Request method, as sent.
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Query parameters; on repeated keys the last one wins.
    pub query: HashMap<String, String>,
    /// The full request line, for access logs.
    pub request_line: String,
    /// First entry of `X-Forwarded-For`, if present.
    pub forwarded_for: Option<String>,
}

impl Request {
    /// Raw value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Client address for logs: the forwarded address if present, else the
    /// socket peer.
    #[must_use]
    pub fn client_ip(&self, peer: SocketAddr) -> String {
        self.forwarded_for
            .clone()
            .unwrap_or_else(|| peer.ip().to_string())
    }
}

/// Reads the request head: up to [`MAX_REQUEST_BYTES`], stopping early at
/// the blank line or at end of stream.
///
/// An empty result means the peer closed without sending anything.
///
/// # Errors
///
/// Returns any I/O error from the stream.
pub fn read_request<R: Read>(stream: &mut R) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let mut filled = 0;
    while filled < MAX_REQUEST_BYTES {
        let n = match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        // Only the tail can complete the terminator
        let scan_from = filled.saturating_sub(HEAD_TERMINATOR.len() - 1);
        filled += n;
        if buf[scan_from..filled]
            .windows(HEAD_TERMINATOR.len())
            .any(|w| w == HEAD_TERMINATOR)
        {
            break;
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Parses a request head.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] unless the first line has exactly three
/// space-separated parts.
pub fn parse_request(bytes: &[u8]) -> Result<Request, ApiError> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();

    let parts: Vec<&str> = request_line.split(' ').collect();
    let [method, target, _version] = parts.as_slice() else {
        return Err(ApiError::BadRequest(format!("malformed request line {request_line:?}")));
    };

    let (path, query_string) = target.split_once('?').unwrap_or((*target, ""));
    let query = parse_query(query_string);

    let mut forwarded_for = None;
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("x-forwarded-for") {
                forwarded_for = value
                    .split(',')
                    .next()
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_owned);
            }
        }
    }

    Ok(Request {
        method: (*method).to_owned(),
        path: path.to_owned(),
        query,
        request_line: request_line.to_owned(),
        forwarded_for,
    })
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_owned(), value.to_owned())
        })
        .collect()
}

/// Endpoints served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// `GET /regions_chunk`
    Regions,
    /// `GET /mapdata`
    MapData,
    /// `GET /map`
    LiveMap,
    /// `GET /biome`, `/clouds`, `/elevation`
    Tile(TileLayer),
}

impl Route {
    /// Exact match on method and path.
    #[must_use]
    pub fn resolve(method: &str, path: &str) -> Option<Self> {
        if method != "GET" {
            return None;
        }
        match path {
            "/regions_chunk" => Some(Self::Regions),
            "/mapdata" => Some(Self::MapData),
            "/map" => Some(Self::LiveMap),
            "/biome" => Some(Self::Tile(TileLayer::Biome)),
            "/clouds" => Some(Self::Tile(TileLayer::Clouds)),
            "/elevation" => Some(Self::Tile(TileLayer::Elevation)),
            _ => None,
        }
    }
}

/// A complete response, written once and followed by close.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    content_type: Option<&'static str>,
    body: Vec<u8>,
}

impl Response {
    /// `200` with a JSON body.
    #[must_use]
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json"),
            body,
        }
    }

    /// `200` with a PNG body.
    #[must_use]
    pub fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: Some("image/png"),
            body,
        }
    }

    /// A status with no body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Writes status line, headers and body.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the writer.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status));
        if let Some(content_type) = self.content_type {
            head.push_str("Content-Type: ");
            head.push_str(content_type);
            head.push_str("\r\n");
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        out.write_all(head.as_bytes())?;
        out.write_all(&self.body)?;
        out.flush()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Request Entity Too Large",
        _ => "Internal Server Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line_and_query() {
        let req = parse_request(b"GET /map?lat_min=1.5&lat_max=2&step HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/map");
        assert_eq!(req.param("lat_min"), Some("1.5"));
        assert_eq!(req.param("lat_max"), Some("2"));
        assert_eq!(req.param("step"), Some(""));
        assert_eq!(req.param("lon_min"), None);
        assert_eq!(req.request_line, "GET /map?lat_min=1.5&lat_max=2&step HTTP/1.1");
    }

    #[test]
    fn test_value_split_on_first_equals() {
        let req = parse_request(b"GET /map?a=b=c HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.param("a"), Some("b=c"));
    }

    #[test]
    fn test_malformed_request_lines() {
        for raw in [&b""[..], b"GET /map\r\n\r\n", b"GET  /map HTTP/1.1\r\n", b"garbage"] {
            assert!(
                matches!(parse_request(raw), Err(ApiError::BadRequest(_))),
                "{:?} should be rejected",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let req = parse_request(
            b"GET / HTTP/1.1\r\nx-forwarded-for: 203.0.113.9, 10.0.0.1\r\n\r\n",
        )
        .unwrap();
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(req.client_ip(peer), "203.0.113.9");

        let direct = parse_request(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(direct.client_ip(peer), "127.0.0.1");
    }

    #[test]
    fn test_routes() {
        assert_eq!(Route::resolve("GET", "/map"), Some(Route::LiveMap));
        assert_eq!(Route::resolve("GET", "/clouds"), Some(Route::Tile(TileLayer::Clouds)));
        assert_eq!(Route::resolve("POST", "/map"), None);
        assert_eq!(Route::resolve("GET", "/map/"), None);
    }

    #[test]
    fn test_read_request_stops_at_terminator() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\n\r\ntrailing body";
        let head = read_request(&mut input).unwrap();
        assert!(head.starts_with(b"GET / HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_read_request_caps_size() {
        let big = vec![b'a'; MAX_REQUEST_BYTES * 2];
        let head = read_request(&mut big.as_slice()).unwrap();
        assert_eq!(head.len(), MAX_REQUEST_BYTES);
    }

    #[test]
    fn test_response_bytes() {
        let mut out = Vec::new();
        Response::json(b"{}".to_vec()).write_to(&mut out).unwrap();
        assert_eq!(
            out,
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}"
        );

        let mut out = Vec::new();
        Response::empty(413).write_to(&mut out).unwrap();
        assert_eq!(
            out,
            b"HTTP/1.1 413 Request Entity Too Large\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }
}
