//! STOMP 1.2 frame encoding and incremental decoding.
//!
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body^@
//! ```
//!
//! A lone EOL between frames is a heart-beat. One WebSocket message may
//! carry several frames, and a frame may in principle be split across
//! messages, so [`FrameDecoder`] keeps unconsumed input between pushes.

use std::fmt;
use std::str::FromStr;

use crate::error::{LinkError, Result};

/// Upper bound on buffered, not-yet-complete input (16 MiB).
const MAX_BUFFERED_BYTES: usize = 16 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are never escaped (STOMP 1.0 compat).
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => {
                return Err(LinkError::ProtocolError(format!("Unknown STOMP command '{}'", other)))
            },
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP frame with a text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Serialize the frame, adding `content-length` for non-empty bodies.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Unit produced by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Frame(Frame),
    Heartbeat,
}

/// Incremental decoder over text chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every complete unit it finished.
    ///
    /// An error means the stream is no longer in sync and must be abandoned.
    pub fn push(&mut self, chunk: &str) -> Result<Vec<Incoming>> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        loop {
            if self.buffer.starts_with('\n') {
                self.buffer.drain(..1);
                out.push(Incoming::Heartbeat);
                continue;
            }
            if self.buffer.starts_with("\r\n") {
                self.buffer.drain(..2);
                out.push(Incoming::Heartbeat);
                continue;
            }
            if self.buffer.is_empty() || self.buffer == "\r" {
                break;
            }

            match parse_frame(&self.buffer)? {
                Some((frame, consumed)) => {
                    self.buffer.drain(..consumed);
                    out.push(Incoming::Frame(frame));
                },
                None => break,
            }
        }

        if self.buffer.len() > MAX_BUFFERED_BYTES {
            return Err(LinkError::ProtocolError(format!(
                "Incomplete STOMP frame exceeds {} bytes",
                MAX_BUFFERED_BYTES
            )));
        }
        Ok(out)
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Parse one frame from the start of `input`. `Ok(None)` means incomplete.
fn parse_frame(input: &str) -> Result<Option<(Frame, usize)>> {
    let mut pos = 0;

    let command_line = match next_line(input, pos) {
        Some((line, next)) => {
            pos = next;
            line
        },
        None => return Ok(None),
    };
    let command: Command = command_line.parse()?;
    let escaped = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, next) = match next_line(input, pos) {
            Some(found) => found,
            None => return Ok(None),
        };
        pos = next;
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            LinkError::ProtocolError(format!("Malformed STOMP header line '{}'", line))
        })?;
        if escaped {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value.trim().parse::<usize>().map_err(|_| {
                LinkError::ProtocolError(format!("Invalid content-length '{}'", value))
            })
        })
        .transpose()?;

    let (body, consumed) = match content_length {
        Some(len) => {
            if len > MAX_BUFFERED_BYTES {
                return Err(LinkError::ProtocolError(format!(
                    "content-length {} exceeds {} bytes",
                    len, MAX_BUFFERED_BYTES
                )));
            }
            let end = pos.checked_add(len).ok_or_else(|| {
                LinkError::ProtocolError(format!("content-length {} overflows the frame", len))
            })?;
            if input.len() <= end {
                return Ok(None);
            }
            if input.as_bytes()[end] != 0 {
                return Err(LinkError::ProtocolError(
                    "STOMP body is not terminated by NUL after content-length bytes".to_string(),
                ));
            }
            let body = input.get(pos..end).ok_or_else(|| {
                LinkError::ProtocolError("content-length splits a UTF-8 character".to_string())
            })?;
            (body.to_string(), end + 1)
        },
        None => match input[pos..].find('\0') {
            Some(offset) => (input[pos..pos + offset].to_string(), pos + offset + 1),
            None => return Ok(None),
        },
    };

    Ok(Some((
        Frame {
            command,
            headers,
            body,
        },
        consumed,
    )))
}

/// Next line starting at `pos`, without its EOL, plus the index after the EOL.
fn next_line(input: &str, pos: usize) -> Option<(&str, usize)> {
    let rest = &input[pos..];
    let newline = rest.find('\n')?;
    let line = rest[..newline].strip_suffix('\r').unwrap_or(&rest[..newline]);
    Some((line, pos + newline + 1))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(LinkError::ProtocolError(format!(
                    "Invalid STOMP header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_frame(items: Vec<Incoming>) -> Frame {
        let frames: Vec<Frame> = items
            .into_iter()
            .filter_map(|item| match item {
                Incoming::Frame(frame) => Some(frame),
                Incoming::Heartbeat => None,
            })
            .collect();
        assert_eq!(frames.len(), 1, "expected exactly one frame");
        frames.into_iter().next().unwrap()
    }

    #[test]
    fn test_encode_subscribe() {
        let frame = Frame::new(Command::Subscribe)
            .header("id", "sub-0")
            .header("destination", "/user/u1/queue/notifications")
            .header("ack", "auto");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/user/u1/queue/notifications\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_encode_adds_content_length_in_bytes() {
        let frame = Frame::new(Command::Send).header("destination", "/app/x").body("héllo");
        let encoded = frame.encode();
        assert!(encoded.contains("content-length:6\n"), "{}", encoded);
        assert!(encoded.ends_with("héllo\0"));
    }

    #[test]
    fn test_connect_headers_are_not_escaped() {
        let frame = Frame::new(Command::Connect).header("host", "localhost:8080");
        assert_eq!(frame.encode(), "CONNECT\nhost:localhost:8080\n\n\0");
    }

    #[test]
    fn test_decode_message_frame() {
        let mut decoder = FrameDecoder::new();
        let items = decoder
            .push("MESSAGE\nsubscription:sub-0\nmessage-id:1\ndestination:/user/u1/queue/notifications\ncontent-type:application/json\n\n{\"id\":1}\0")
            .unwrap();
        let frame = only_frame(items);
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{\"id\":1}");
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_heartbeats_between_frames() {
        let mut decoder = FrameDecoder::new();
        let items = decoder.push("\n\r\nRECEIPT\nreceipt-id:7\n\n\0\n").unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Incoming::Heartbeat);
        assert_eq!(items[1], Incoming::Heartbeat);
        assert!(matches!(items[2], Incoming::Frame(ref f) if f.command == Command::Receipt));
        assert_eq!(items[3], Incoming::Heartbeat);
    }

    #[test]
    fn test_decode_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push("MESSAGE\nsubscription:sub-1\n").unwrap().is_empty());
        assert!(decoder.push("\n{\"title\":").unwrap().is_empty());
        let frame = only_frame(decoder.push("\"hi\"}\0").unwrap());
        assert_eq!(frame.body, "{\"title\":\"hi\"}");
    }

    #[test]
    fn test_decode_multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let chunk = "MESSAGE\nsubscription:a\n\nfirst\0MESSAGE\nsubscription:a\n\nsecond\0";
        let bodies: Vec<String> = decoder
            .push(chunk)
            .unwrap()
            .into_iter()
            .filter_map(|item| match item {
                Incoming::Frame(frame) => Some(frame.body),
                Incoming::Heartbeat => None,
            })
            .collect();
        assert_eq!(bodies, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_decode_content_length_allows_embedded_nul() {
        let mut decoder = FrameDecoder::new();
        let frame = only_frame(decoder.push("MESSAGE\nsubscription:a\ncontent-length:3\n\na\0b\0").unwrap());
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn test_decode_content_length_waits_for_full_body() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push("MESSAGE\nsubscription:a\ncontent-length:5\n\nab").unwrap().is_empty());
        let frame = only_frame(decoder.push("cde\0").unwrap());
        assert_eq!(frame.body, "abcde");
    }

    #[test]
    fn test_header_escaping_round_trip() {
        let frame = Frame::new(Command::Message)
            .header("subscription", "sub-0")
            .header("note", "a:b\\c\nd");
        let mut decoder = FrameDecoder::new();
        let decoded = only_frame(decoder.push(&frame.encode()).unwrap());
        assert_eq!(decoded.get("note"), Some("a:b\\c\nd"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let frame = only_frame(decoder.push("CONNECTED\r\nversion:1.2\r\nheart-beat:0,0\r\n\r\n\0").unwrap());
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.get("version"), Some("1.2"));
    }

    #[test]
    fn test_repeated_header_keeps_first() {
        let mut decoder = FrameDecoder::new();
        let frame = only_frame(decoder.push("MESSAGE\nfoo:first\nfoo:second\n\n\0").unwrap());
        assert_eq!(frame.get("foo"), Some("first"));
    }

    #[test]
    fn test_decode_errors() {
        assert!(FrameDecoder::new().push("BOGUS\n\n\0").is_err());
        assert!(FrameDecoder::new().push("MESSAGE\nnocolon\n\n\0").is_err());
        assert!(FrameDecoder::new().push("MESSAGE\nbad:\\x\n\n\0").is_err());
        assert!(FrameDecoder::new().push("MESSAGE\ncontent-length:1\n\nab\0").is_err());
        assert!(FrameDecoder::new().push("MESSAGE\ncontent-length:x\n\n\0").is_err());
    }

    #[test]
    fn test_oversized_content_length_rejected_up_front() {
        let huge = format!("MESSAGE\nsubscription:sub-0\ncontent-length:{}\n\nx\0", usize::MAX);
        let err = FrameDecoder::new().push(&huge).unwrap_err();
        assert!(matches!(err, LinkError::ProtocolError(_)), "{:?}", err);

        // Just over the cap fails before the body arrives.
        let over = format!("MESSAGE\ncontent-length:{}\n\nab", MAX_BUFFERED_BYTES + 1);
        assert!(FrameDecoder::new().push(&over).is_err());
    }
}
