//! STOMP heart-beat negotiation.
//!
//! Each side advertises `heart-beat:<can-send>,<wants-to-receive>` in
//! milliseconds. The effective interval per direction is the larger of
//! the two values, or disabled when either side says `0`.

use std::time::Duration;

use crate::error::{LinkError, Result};

/// Missing this many expected intervals in a row counts as a dead link.
pub const HEARTBEAT_GRACE_FACTOR: u32 = 2;

/// One side's advertised heart-beat header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval this side can send at (0 = never).
    pub send_ms: u64,
    /// Interval this side wants to receive at (0 = not needed).
    pub receive_ms: u64,
}

impl HeartBeat {
    pub fn new(send_ms: u64, receive_ms: u64) -> Self {
        Self { send_ms, receive_ms }
    }

    /// Parse a `heart-beat` header value such as `"10000,10000"`.
    pub fn parse(value: &str) -> Result<Self> {
        let (send, receive) = value.split_once(',').ok_or_else(|| {
            LinkError::ProtocolError(format!("Malformed heart-beat header '{}'", value))
        })?;
        let parse = |part: &str| {
            part.trim().parse::<u64>().map_err(|_| {
                LinkError::ProtocolError(format!("Malformed heart-beat header '{}'", value))
            })
        };
        Ok(Self::new(parse(send)?, parse(receive)?))
    }

    pub fn header_value(&self) -> String {
        format!("{},{}", self.send_ms, self.receive_ms)
    }
}

/// Effective intervals after negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// How often the client must write something, if at all.
    pub send_every: Option<Duration>,
    /// How often the server promised to write something, if at all.
    pub expect_every: Option<Duration>,
}

impl Negotiated {
    /// Silence longer than this means the server is gone.
    pub fn receive_timeout(&self) -> Option<Duration> {
        self.expect_every.map(|every| every * HEARTBEAT_GRACE_FACTOR)
    }
}

pub fn negotiate(client: HeartBeat, server: HeartBeat) -> Negotiated {
    let combine = |sender: u64, receiver: u64| {
        if sender == 0 || receiver == 0 {
            None
        } else {
            Some(Duration::from_millis(sender.max(receiver)))
        }
    };
    Negotiated {
        send_every: combine(client.send_ms, server.receive_ms),
        expect_every: combine(server.send_ms, client.receive_ms),
    }
}
