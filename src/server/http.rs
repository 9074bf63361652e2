//! Minimal HTTP/1.1 request parsing and response serialization.

use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HttpError {
    #[error("incomplete request")]
    Incomplete,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("payload too large")]
    PayloadTooLarge,
}

/// Case-insensitive header list, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Headers,
    pub body: Vec<u8>,
}

pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Content-Length from a raw header block; 0 when absent.
pub fn content_length(header_block: &[u8]) -> Result<usize, HttpError> {
    let text = std::str::from_utf8(header_block)
        .map_err(|_| HttpError::Malformed("invalid UTF-8 in headers"))?;
    for line in text.split("\r\n").skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value
                    .trim()
                    .parse()
                    .map_err(|_| HttpError::Malformed("invalid Content-Length"));
            }
        }
    }
    Ok(0)
}

fn parse_request_line(line: &str) -> Result<(String, String, Option<String>), HttpError> {
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or(HttpError::Malformed("missing method"))?;
    let target = parts.next().ok_or(HttpError::Malformed("missing path"))?;
    let version = parts.next().ok_or(HttpError::Malformed("missing version"))?;
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed("unsupported HTTP version"));
    }

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (target.to_string(), None),
    };
    Ok((method.to_ascii_uppercase(), path, query))
}

impl HttpRequest {
    /// Parses a complete request. `max_body` bounds the declared body size.
    pub fn parse(buf: &[u8], max_body: usize) -> Result<Self, HttpError> {
        let headers_end = find_headers_end(buf).ok_or(HttpError::Incomplete)?;
        let header_block = &buf[..headers_end];
        let body_start = headers_end + 4;

        let length = content_length(header_block)?;
        if length > max_body {
            return Err(HttpError::PayloadTooLarge);
        }
        if buf.len() < body_start + length {
            return Err(HttpError::Incomplete);
        }

        let text = std::str::from_utf8(header_block)
            .map_err(|_| HttpError::Malformed("invalid UTF-8 in headers"))?;
        let mut lines = text.split("\r\n");
        let request_line = lines.next().ok_or(HttpError::Malformed("empty request"))?;
        let (method, path, query) = parse_request_line(request_line)?;

        let mut headers = Headers::default();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or(HttpError::Malformed("invalid header line"))?;
            headers.push(name.trim().to_string(), value.trim().to_string());
        }

        Ok(HttpRequest {
            method,
            path,
            query,
            headers,
            body: buf[body_start..body_start + length].to_vec(),
        })
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

pub struct HttpResponse {
    pub status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// `{ "success": false, "message": ... }`
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(
            status,
            &serde_json::json!({ "success": false, "message": message }),
        )
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn build(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());
        buf.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status)).as_bytes(),
        );
        buf.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        buf.extend_from_slice(
            format!(
                "Date: {}\r\n",
                chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
            )
            .as_bytes(),
        );
        for (name, value) in &self.headers {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"Connection: close\r\n\r\n");
        buf.extend_from_slice(&self.body);
        buf
    }
}
