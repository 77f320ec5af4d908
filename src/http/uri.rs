use std::collections::HashMap;
use std::fmt;

/// Query arguments keyed by name.
pub type Query = HashMap<String, String>;

/// A request target kept exactly as received.
///
/// All views (`query`, `absolute_path`, `parent`, `segments`) are computed on
/// demand from the raw string and are not percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    raw: String,
}

impl Uri {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut String {
        &mut self.raw
    }

    /// Decodes `%XX` escapes and `+` (as a space).
    ///
    /// Returns `None` for a truncated or non-hex escape, or when the decoded
    /// bytes are not UTF-8.
    ///
    /// ```
    /// # use warden::http::uri::Uri;
    /// assert_eq!(Uri::decode("a%20b+c").as_deref(), Some("a b c"));
    /// assert_eq!(Uri::decode("bad%2"), None);
    /// ```
    pub fn decode(input: &str) -> Option<String> {
        let bytes = input.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'%' => {
                    let hex = bytes.get(i + 1..i + 3)?;
                    let hi = (hex[0] as char).to_digit(16)?;
                    let lo = (hex[1] as char).to_digit(16)?;
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                }
                b'+' => {
                    out.push(b' ');
                    i += 1;
                }
                b => {
                    out.push(b);
                    i += 1;
                }
            }
        }

        String::from_utf8(out).ok()
    }

    fn query_str(&self) -> Option<&str> {
        self.raw.split_once('?').map(|(_, query)| query)
    }

    /// Arguments after the first `?`, split on `&` and then on the first `=`.
    ///
    /// A name without `=` maps to an empty value; empty pairs are skipped.
    /// Later duplicates win.
    pub fn query(&self) -> Query {
        let Some(query) = self.query_str() else {
            return Query::new();
        };

        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect()
    }

    /// Like [`query`](Uri::query) but with form-urlencoded decoding applied.
    pub fn decoded_query(&self) -> Query {
        match self.query_str() {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Query::new(),
        }
    }

    /// The path without the query string.
    pub fn absolute_path(&self) -> Uri {
        match self.raw.split_once('?') {
            Some((path, _)) => Uri::new(path),
            None => self.clone(),
        }
    }

    /// The enclosing directory: `/foo/bar/` gives `/foo/bar`, `/foo/bar`
    /// gives `/foo`. The root is its own parent.
    pub fn parent(&self) -> Uri {
        let path = self.absolute_path().raw;

        if path.len() > 1 && path.ends_with('/') {
            return Uri::new(&path[..path.len() - 1]);
        }

        match path.rfind('/') {
            Some(0) | None => Uri::new("/"),
            Some(idx) => Uri::new(&path[..idx]),
        }
    }

    /// The non-empty `/`-separated components of the absolute path.
    pub fn segments(&self) -> Vec<String> {
        self.absolute_path()
            .raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<&str> for Uri {
    fn from(raw: &str) -> Self {
        Uri::new(raw)
    }
}

impl From<String> for Uri {
    fn from(raw: String) -> Self {
        Uri::new(raw)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
