//! Interactive container attach.
//!
//! Opens a WebSocket to the server's attach endpoint, feeds every inbound
//! frame through decode → escape stripping → scrollback, and writes user
//! lines back out.
//!
//! ## Layout
//!
//! ```text
//! ansi.rs        — strip(): terminal escape-sequence removal
//! frame.rs       — Frame (Text | Bytes | Deferred) and decode()
//! scrollback.rs  — append-only output buffer
//! session.rs     — Session state machine (Idle/Connecting/Open/Closed)
//! params.rs      — attach URL from credentials + target
//! transport.rs   — Socket / Connector traits, SocketEvent
//! ws.rs          — tokio-tungstenite Connector
//! controller.rs  — SessionController: drives a Session from socket events
//! dispatch.rs    — command dispatch with local echo
//! ```
//!
//! Everything here runs on one task. The only concurrency is the socket I/O
//! pump and deferred-frame decoding, both of which report back over channels.

pub mod ansi;
pub mod controller;
pub mod dispatch;
pub mod frame;
pub mod params;
pub mod scrollback;
pub mod session;
pub mod transport;
pub mod ws;

use std::time::Duration;

pub use controller::{Notice, SessionController};
pub use frame::Frame;
pub use scrollback::{Cursor, Scrollback};
pub use session::{AttachTarget, SessionState};
pub use transport::{Connector, Socket, SocketEvent};
pub use ws::WsConnector;

/// User-visible failures of the attach subsystem.
///
/// Each one ends the operation it came from; none of them ends the process,
/// and none is retried.
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    /// Required attach parameters are missing. No socket was created.
    #[error("cannot attach: {0}")]
    Configuration(String),
    /// The socket did not open in time and has been closed.
    #[error("connection timed out after {}ms", .0.as_millis())]
    ConnectionTimeout(Duration),
    /// Socket-level error. The session stays up until a close event.
    #[error("connection error: {0}")]
    Transport(String),
    /// A line was sent while the session was not open. It was dropped.
    #[error("not connected")]
    NotConnected,
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stand-ins for the socket seam.

    use std::sync::{Arc, Mutex};

    use reqwest::Url;

    use super::transport::{Connector, EventSender, Socket, SocketEvent};

    #[derive(Default)]
    struct Inner {
        urls: Vec<Url>,
        senders: Vec<EventSender>,
        sent: Vec<String>,
        close_calls: usize,
    }

    /// Shared log of everything the fake sockets were asked to do.
    #[derive(Clone, Default)]
    pub struct Recorder {
        inner: Arc<Mutex<Inner>>,
    }

    impl Recorder {
        pub fn socket(&self) -> RecordingSocket {
            RecordingSocket {
                recorder: self.clone(),
            }
        }

        pub fn connector(&self) -> RecordingConnector {
            RecordingConnector {
                recorder: self.clone(),
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.inner.lock().unwrap().sent.clone()
        }

        pub fn close_calls(&self) -> usize {
            self.inner.lock().unwrap().close_calls
        }

        pub fn opened(&self) -> usize {
            self.inner.lock().unwrap().urls.len()
        }

        pub fn url(&self, attempt: usize) -> Url {
            self.inner.lock().unwrap().urls[attempt].clone()
        }

        /// Deliver `event` on the given attempt's channel. Returns `false` if
        /// the controller no longer listens to that attempt.
        pub fn emit(&self, attempt: usize, event: SocketEvent) -> bool {
            self.inner.lock().unwrap().senders[attempt].send(event).is_ok()
        }

        /// Simulate the I/O pump going away without a close event.
        pub fn drop_senders(&self) {
            self.inner.lock().unwrap().senders.clear();
        }
    }

    pub struct RecordingSocket {
        recorder: Recorder,
    }

    impl Socket for RecordingSocket {
        fn send(&mut self, payload: String) -> Result<(), String> {
            self.recorder.inner.lock().unwrap().sent.push(payload);
            Ok(())
        }

        fn close(&mut self) {
            self.recorder.inner.lock().unwrap().close_calls += 1;
        }
    }

    pub struct RecordingConnector {
        recorder: Recorder,
    }

    impl Connector for RecordingConnector {
        type Socket = RecordingSocket;

        fn open(&mut self, url: &Url, events: EventSender) -> RecordingSocket {
            let mut inner = self.recorder.inner.lock().unwrap();
            inner.urls.push(url.clone());
            inner.senders.push(events);
            drop(inner);
            self.recorder.socket()
        }
    }
}
