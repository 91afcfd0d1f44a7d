//! The socket seam between the session controller and the network.
//!
//! A [`Connector`] turns a URL into a [`Socket`] handle immediately (before
//! the handshake finishes) and reports everything that happens afterwards as
//! [`SocketEvent`]s on the channel it was given. The handle only ever writes;
//! reading is the event channel's job.

use reqwest::Url;
use tokio::sync::mpsc;

use super::frame::Frame;

/// Lifecycle and data events delivered by a socket, in arrival order.
#[derive(Debug)]
pub enum SocketEvent {
    /// Handshake completed.
    Open,
    /// One inbound message.
    Frame(Frame),
    /// Transport-level failure. A `Closed` event normally follows.
    Error(String),
    /// The socket is gone, whoever closed it.
    Closed { code: Option<u16>, reason: String },
}

/// Sender half handed to a connector for one connect attempt.
pub type EventSender = mpsc::UnboundedSender<SocketEvent>;

/// Write side of an attach socket.
pub trait Socket {
    /// Queue `payload` as one text message. Returns immediately.
    fn send(&mut self, payload: String) -> Result<(), String>;

    /// Start closing. Calling it again, or on a socket that is already
    /// closing, does nothing.
    fn close(&mut self);
}

/// Opens sockets.
pub trait Connector {
    type Socket: Socket;

    fn open(&mut self, url: &Url, events: EventSender) -> Self::Socket;
}
