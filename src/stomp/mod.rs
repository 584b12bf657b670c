//! STOMP 1.2 client pieces: frame codec, heart-beat negotiation and the
//! WebSocket-backed [`StompTransport`].

pub mod frame;
pub mod heartbeat;
mod session;

pub use session::{resolve_ws_url, StompSession, StompTransport};
