//! Drives a [`Session`] from socket events.
//!
//! [`SessionController`] owns the session, the connector, and the current
//! connect attempt. Callers alternate between user actions (`attach`, `send`,
//! `detach`, dispatch) and awaiting [`SessionController::next_notice`], which
//! waits for the next socket event, deferred-frame completion, or connection
//! timeout and applies it.
//!
//! Each attempt gets its own event channel. `detach` drops it, so events from
//! a socket that is still shutting down can never reach a later session.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ansi::strip;
use super::frame::{self, Decoded, FrameDecoder};
use super::params::ConnectionParams;
use super::scrollback::Scrollback;
use super::session::{AttachTarget, Session, SessionState};
use super::transport::{Connector, SocketEvent};
use super::TerminalError;
use crate::credentials::Credentials;

/// Something the user should see, returned by [`SessionController::next_notice`].
#[derive(Debug)]
pub enum Notice {
    /// The socket opened; input is accepted from now on.
    Opened,
    /// New text was appended to the scrollback.
    Output,
    /// The socket closed.
    Closed { code: Option<u16>, reason: String },
    /// A failure to report.
    Error(TerminalError),
}

/// Per-attempt channels and the timeout deadline.
struct Attempt {
    events: mpsc::UnboundedReceiver<SocketEvent>,
    events_done: bool,
    deferred_tx: mpsc::UnboundedSender<String>,
    deferred_rx: mpsc::UnboundedReceiver<String>,
    pending_deferred: usize,
    decoder: FrameDecoder,
    /// Armed while connecting.
    deadline: Option<Instant>,
}

impl Attempt {
    fn new(events: mpsc::UnboundedReceiver<SocketEvent>, deadline: Instant) -> Self {
        let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();
        Self {
            events,
            events_done: false,
            deferred_tx,
            deferred_rx,
            pending_deferred: 0,
            decoder: FrameDecoder::default(),
            deadline: Some(deadline),
        }
    }
}

enum Wake {
    Event(Option<SocketEvent>),
    Deferred(Option<String>),
    Timeout,
}

/// Owns the attach session and its socket.
pub struct SessionController<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    session: Session<C::Socket>,
    attempt: Option<Attempt>,
}

impl<C: Connector> SessionController<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            session: Session::new(),
            attempt: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn scrollback(&self) -> &Scrollback {
        self.session.scrollback()
    }

    pub fn session(&self) -> &Session<C::Socket> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<C::Socket> {
        &mut self.session
    }

    /// Start connecting to `target`.
    ///
    /// Fails with [`TerminalError::Configuration`] before any socket exists if
    /// the server address, ids, or token are missing. A session that is
    /// still connecting or open is detached first.
    pub fn attach(
        &mut self,
        credentials: &Credentials,
        target: AttachTarget,
    ) -> Result<(), TerminalError> {
        let params = ConnectionParams::build(credentials, &target)?;

        if self.session.has_socket() {
            debug!("Attach requested while {}, detaching first", self.state().as_str());
            self.detach();
        }

        info!(
            "Attaching to container {} in environment {} at {}://{}",
            target.container_id,
            target.environment_id,
            params.url.scheme(),
            params.url.host_str().unwrap_or("?"),
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let socket = self.connector.open(&params.url, events_tx);
        self.session.connecting(target, socket);
        self.attempt = Some(Attempt::new(events_rx, Instant::now() + self.connect_timeout));
        Ok(())
    }

    /// Leave the session from any state: close the socket if there is one,
    /// cancel the timeout, and reset to idle with an empty buffer.
    pub fn detach(&mut self) {
        if self.session.state() != SessionState::Idle {
            info!("Detaching ({})", self.state().as_str());
        }
        self.session.detach();
        self.attempt = None;
    }

    /// Send `line` plus a newline. Fire-and-forget.
    pub fn send(&mut self, line: &str) -> Result<(), TerminalError> {
        self.session.send(line)
    }

    /// Wait for and apply the next thing that happens to the session.
    ///
    /// Returns `None` when there is nothing left to wait for: no attempt, or
    /// the socket's event stream has ended and no deferred frames are
    /// outstanding.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        loop {
            let wake = {
                let attempt = self.attempt.as_mut()?;
                let events_open = !attempt.events_done;
                let deferred_pending = attempt.pending_deferred > 0;
                if !events_open && !deferred_pending {
                    return None;
                }
                let deadline = attempt.deadline;

                tokio::select! {
                    event = attempt.events.recv(), if events_open => Wake::Event(event),
                    text = attempt.deferred_rx.recv(), if deferred_pending => Wake::Deferred(text),
                    () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                        if deadline.is_some() => Wake::Timeout,
                }
            };

            let notice = match wake {
                Wake::Event(Some(event)) => self.handle_event(event),
                Wake::Event(None) => self.events_ended(),
                Wake::Deferred(text) => self.deferred_done(text.unwrap_or_default()),
                Wake::Timeout => self.on_timeout(),
            };
            if notice.is_some() {
                return notice;
            }
        }
    }

    /// Apply one socket event. Must be called within a Tokio runtime if the
    /// event carries a deferred frame.
    pub fn handle_event(&mut self, event: SocketEvent) -> Option<Notice> {
        match event {
            SocketEvent::Open => {
                if !self.session.opened() {
                    return None;
                }
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.deadline = None;
                }
                info!("Attach socket open");
                Some(Notice::Opened)
            }
            SocketEvent::Frame(frame) => {
                let decoded = match self.attempt.as_mut() {
                    Some(attempt) => attempt.decoder.decode(frame),
                    None => frame::decode(frame),
                };
                self.apply_decoded(decoded)
            }
            SocketEvent::Error(message) => {
                warn!("Attach socket error: {message}");
                Some(Notice::Error(TerminalError::Transport(message)))
            }
            SocketEvent::Closed { code, reason } => {
                if !self.session.closed() {
                    debug!("Ignoring close event in state {}", self.state().as_str());
                    return None;
                }
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.deadline = None;
                }
                info!("Attach socket closed (code {code:?}, reason {reason:?})");
                Some(Notice::Closed { code, reason })
            }
        }
    }

    /// The connection timeout fired.
    pub fn on_timeout(&mut self) -> Option<Notice> {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.deadline = None;
        }
        if !self.session.timed_out() {
            return None;
        }
        warn!(
            "Attach socket did not open within {}ms",
            self.connect_timeout.as_millis()
        );
        Some(Notice::Error(TerminalError::ConnectionTimeout(
            self.connect_timeout,
        )))
    }

    fn apply_decoded(&mut self, decoded: Decoded) -> Option<Notice> {
        match decoded {
            Decoded::Ready(text) => self.append(&text),
            Decoded::Pending(fut) => {
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.pending_deferred += 1;
                    let tx = attempt.deferred_tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(fut.await);
                    });
                }
                None
            }
        }
    }

    fn events_ended(&mut self) -> Option<Notice> {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.events_done = true;
            attempt.deadline = None;
        }
        // The pump went away without reporting a close.
        if self.session.closed() {
            return Some(Notice::Closed {
                code: None,
                reason: "connection dropped".into(),
            });
        }
        None
    }

    fn deferred_done(&mut self, text: String) -> Option<Notice> {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.pending_deferred = attempt.pending_deferred.saturating_sub(1);
        }
        self.append(&text)
    }

    fn append(&mut self, text: &str) -> Option<Notice> {
        let cleaned = strip(text);
        if cleaned.is_empty() || self.session.state() == SessionState::Idle {
            return None;
        }
        self.session.append_output(&cleaned);
        Some(Notice::Output)
    }
}
