use crate::http::uri::Uri;
use std::fmt;

/// HTTP protocol version from the request line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const HTTP_1_0: Version = Version { major: 1, minor: 0 };
    pub const HTTP_1_1: Version = Version { major: 1, minor: 1 };
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A single header line, stored exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Represents an HTTP request read from a client.
///
/// The parser fills it in incrementally. Header names are neither
/// deduplicated nor case-normalised and keep their arrival order. Header and
/// request-line text is held as ISO-8859-1: each received octet is one `char`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) uri: Uri,
    pub(crate) version: Version,
    pub(crate) headers: Vec<Header>,
    pub(crate) body: Vec<u8>,
}

/// Builder for constructing Request objects.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    uri: Option<Uri>,
    version: Option<Version>,
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<Uri>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn version(mut self, major: u32, minor: u32) -> Self {
        self.version = Some(Version { major, minor });
        self
    }

    /// Appends a header; existing headers with the same name are kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            uri: self.uri.ok_or("uri missing")?,
            version: self.version.unwrap_or(Version::HTTP_1_0),
            headers: self.headers,
            body: self.body,
        })
    }
}

impl Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Value of the first header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// The declared body length.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Reassembles the request as wire bytes.
    pub fn raw(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());

        push_text(&mut out, &self.method);
        out.push(b' ');
        push_text(&mut out, self.uri.raw());
        out.extend_from_slice(format!(" HTTP/{}\r\n", self.version).as_bytes());

        for header in &self.headers {
            push_text(&mut out, &header.name);
            out.extend_from_slice(b": ");
            push_text(&mut out, &header.value);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Writes ISO-8859-1 text back as single octets; anything outside that
/// range (only possible through the builder) falls back to UTF-8.
fn push_text(out: &mut Vec<u8>, text: &str) {
    for c in text.chars() {
        match u8::try_from(c) {
            Ok(byte) => out.push(byte),
            Err(_) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
