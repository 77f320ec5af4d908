use crate::http::request::{Header, Request};

/// Outcome of feeding input to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    /// Request line and headers are complete.
    Good,
    /// The input is malformed. Stays `Bad` until [`RequestParser::reset`].
    Bad,
    /// More input is needed.
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MethodStart,
    Method,
    Uri,
    VersionH,
    VersionT1,
    VersionT2,
    VersionP,
    VersionSlash,
    VersionMajorStart,
    VersionMajor,
    VersionMinorStart,
    VersionMinor,
    ExpectingNewline1,
    HeaderLineStart,
    HeaderLws,
    HeaderName,
    SpaceBeforeHeaderValue,
    HeaderValue,
    ExpectingNewline2,
    ExpectingNewline3,
    Complete,
    Failed,
}

/// Incremental HTTP/1.0 request-line and header parser.
///
/// Input is consumed one octet at a time, so a request split across any
/// number of reads produces the same result as one delivered whole. The
/// body is not parsed here; see [`RequestParser::fill`].
#[derive(Debug, Clone)]
pub struct RequestParser {
    state: State,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: State::MethodStart,
        }
    }

    /// Prepares the parser for a new request.
    pub fn reset(&mut self) {
        self.state = State::MethodStart;
    }

    /// Feeds bytes until the header section completes or fails.
    ///
    /// Returns the result together with the number of bytes consumed. On
    /// `Good` the remaining bytes belong to the body.
    pub fn parse(&mut self, input: &[u8], request: &mut Request) -> (ParseResult, usize) {
        for (idx, &byte) in input.iter().enumerate() {
            match self.consume(byte, request) {
                ParseResult::Indeterminate => continue,
                result => return (result, idx + 1),
            }
        }
        (ParseResult::Indeterminate, input.len())
    }

    /// Appends body bytes until `Content-Length` octets have been collected.
    ///
    /// Returns `true` once the body is complete. Bytes past the declared
    /// length are ignored.
    pub fn fill(&self, input: &[u8], request: &mut Request) -> bool {
        let wanted = request.content_length();
        let missing = wanted.saturating_sub(request.body.len());
        let take = missing.min(input.len());
        request.body.extend_from_slice(&input[..take]);
        request.body.len() >= wanted
    }

    /// Advances the state machine by one octet.
    pub fn consume(&mut self, input: u8, request: &mut Request) -> ParseResult {
        use ParseResult::{Bad, Good, Indeterminate};

        let c = char::from(input);
        let (next, result) = match self.state {
            State::Complete => return Good,
            State::Failed => return Bad,

            State::MethodStart if is_token(input) => {
                request.method.push(c);
                (State::Method, Indeterminate)
            }
            State::Method if input == b' ' => (State::Uri, Indeterminate),
            State::Method if is_token(input) => {
                request.method.push(c);
                (State::Method, Indeterminate)
            }

            State::Uri if input == b' ' => (State::VersionH, Indeterminate),
            State::Uri if !is_control(input) => {
                request.uri.raw_mut().push(c);
                (State::Uri, Indeterminate)
            }

            State::VersionH if input == b'H' => (State::VersionT1, Indeterminate),
            State::VersionT1 if input == b'T' => (State::VersionT2, Indeterminate),
            State::VersionT2 if input == b'T' => (State::VersionP, Indeterminate),
            State::VersionP if input == b'P' => (State::VersionSlash, Indeterminate),
            State::VersionSlash if input == b'/' => {
                request.version.major = 0;
                request.version.minor = 0;
                (State::VersionMajorStart, Indeterminate)
            }

            State::VersionMajorStart if input.is_ascii_digit() => {
                request.version.major = u32::from(input - b'0');
                (State::VersionMajor, Indeterminate)
            }
            State::VersionMajor if input == b'.' => (State::VersionMinorStart, Indeterminate),
            State::VersionMajor if input.is_ascii_digit() => {
                match accumulate(request.version.major, input) {
                    Some(major) => {
                        request.version.major = major;
                        (State::VersionMajor, Indeterminate)
                    }
                    None => (State::Failed, Bad),
                }
            }

            State::VersionMinorStart if input.is_ascii_digit() => {
                request.version.minor = u32::from(input - b'0');
                (State::VersionMinor, Indeterminate)
            }
            State::VersionMinor if input == b'\r' => (State::ExpectingNewline1, Indeterminate),
            State::VersionMinor if input.is_ascii_digit() => {
                match accumulate(request.version.minor, input) {
                    Some(minor) => {
                        request.version.minor = minor;
                        (State::VersionMinor, Indeterminate)
                    }
                    None => (State::Failed, Bad),
                }
            }

            State::ExpectingNewline1 if input == b'\n' => (State::HeaderLineStart, Indeterminate),

            State::HeaderLineStart if input == b'\r' => (State::ExpectingNewline3, Indeterminate),
            State::HeaderLineStart
                if !request.headers.is_empty() && (input == b' ' || input == b'\t') =>
            {
                (State::HeaderLws, Indeterminate)
            }
            State::HeaderLineStart if is_token(input) => {
                request.headers.push(Header {
                    name: c.to_string(),
                    value: String::new(),
                });
                (State::HeaderName, Indeterminate)
            }

            State::HeaderLws if input == b'\r' => (State::ExpectingNewline2, Indeterminate),
            State::HeaderLws if input == b' ' || input == b'\t' => (State::HeaderLws, Indeterminate),
            State::HeaderLws if !is_control(input) => {
                push_value(request, c);
                (State::HeaderValue, Indeterminate)
            }

            State::HeaderName if input == b':' => (State::SpaceBeforeHeaderValue, Indeterminate),
            State::HeaderName if is_token(input) => {
                if let Some(header) = request.headers.last_mut() {
                    header.name.push(c);
                }
                (State::HeaderName, Indeterminate)
            }

            State::SpaceBeforeHeaderValue if input == b' ' => (State::HeaderValue, Indeterminate),

            State::HeaderValue if input == b'\r' => (State::ExpectingNewline2, Indeterminate),
            State::HeaderValue if !is_control(input) => {
                push_value(request, c);
                (State::HeaderValue, Indeterminate)
            }

            State::ExpectingNewline2 if input == b'\n' => (State::HeaderLineStart, Indeterminate),
            State::ExpectingNewline3 if input == b'\n' => (State::Complete, Good),

            _ => (State::Failed, Bad),
        };

        self.state = next;
        result
    }
}

fn push_value(request: &mut Request, c: char) {
    if let Some(header) = request.headers.last_mut() {
        header.value.push(c);
    }
}

fn accumulate(value: u32, digit: u8) -> Option<u32> {
    value.checked_mul(10)?.checked_add(u32::from(digit - b'0'))
}

fn is_char(c: u8) -> bool {
    c <= 127
}

fn is_control(c: u8) -> bool {
    c <= 31 || c == 127
}

fn is_special(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')'
            | b'<'
            | b'>'
            | b'@'
            | b','
            | b';'
            | b':'
            | b'\\'
            | b'"'
            | b'/'
            | b'['
            | b']'
            | b'?'
            | b'='
            | b'{'
            | b'}'
            | b' '
            | b'\t'
    )
}

fn is_token(c: u8) -> bool {
    is_char(c) && !is_control(c) && !is_special(c)
}
