//! Attach session state machine.
//!
//! ```text
//!          attach              open event
//!   Idle ──────────► Connecting ──────────► Open
//!    ▲                  │                     │
//!    │                  │ timeout / close     │ close event
//!    │                  ▼                     ▼
//!    └────detach──── Closed ◄─────────────────┘
//! ```
//!
//! Every mutation goes through one of the transition methods below. The
//! socket handle is held exactly while the state is `Connecting` or `Open`.

use tracing::debug;

use super::scrollback::Scrollback;
use super::transport::Socket;
use super::TerminalError;

/// Text shown while the handshake is in flight. Cleared on open.
pub const CONNECTING_PLACEHOLDER: &str = "Connecting to container...\n$ ";
/// Appended once when the socket closes.
pub const CLOSED_MARKER: &str = "\n[Connection closed]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Which container to attach to, and in which environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachTarget {
    pub environment_id: String,
    pub container_id: String,
}

impl AttachTarget {
    pub fn new(environment_id: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            container_id: container_id.into(),
        }
    }
}

/// One live attach and everything it owns.
pub struct Session<S> {
    state: SessionState,
    socket: Option<S>,
    target: Option<AttachTarget>,
    scrollback: Scrollback,
    input: String,
}

impl<S: Socket> Default for Session<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Socket> Session<S> {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            socket: None,
            target: None,
            scrollback: Scrollback::new(),
            input: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_socket(&self) -> bool {
        self.socket.is_some()
    }

    pub fn target(&self) -> Option<&AttachTarget> {
        self.target.as_ref()
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }

    /// `Idle | Closed → Connecting`, taking ownership of a fresh socket.
    ///
    /// The caller must have detached any previous socket first.
    pub fn connecting(&mut self, target: AttachTarget, socket: S) {
        debug_assert!(self.socket.is_none(), "previous socket still live");
        self.state = SessionState::Connecting;
        self.socket = Some(socket);
        self.target = Some(target);
        self.scrollback.reset();
        self.scrollback.append(CONNECTING_PLACEHOLDER);
    }

    /// `Connecting → Open`. Returns `false` (and changes nothing) otherwise.
    pub fn opened(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            debug!("Ignoring open event in state {}", self.state.as_str());
            return false;
        }
        self.state = SessionState::Open;
        self.scrollback.reset();
        true
    }

    /// `Connecting → Closed` after the handshake took too long.
    ///
    /// Closes the socket and runs the normal close teardown, so the close
    /// event that follows is a no-op.
    pub fn timed_out(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        if let Some(socket) = self.socket.as_mut() {
            socket.close();
        }
        self.closed()
    }

    /// `Connecting | Open → Closed`: append the marker and release the
    /// socket. Returns `false` if already closed or idle.
    pub fn closed(&mut self) -> bool {
        match self.state {
            SessionState::Connecting | SessionState::Open => {
                self.state = SessionState::Closed;
                self.socket = None;
                self.scrollback.append(CLOSED_MARKER);
                true
            }
            SessionState::Idle | SessionState::Closed => false,
        }
    }

    /// Any state `→ Idle`. Closes the socket if one is held, then clears the
    /// buffer, the input line and the target.
    pub fn detach(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            socket.close();
            self.closed();
        }
        self.state = SessionState::Idle;
        self.target = None;
        self.scrollback.reset();
        self.input.clear();
    }

    /// Write `line` plus a newline. Only valid while `Open`.
    pub fn send(&mut self, line: &str) -> Result<(), TerminalError> {
        match (self.state, self.socket.as_mut()) {
            (SessionState::Open, Some(socket)) => socket
                .send(format!("{line}\n"))
                .map_err(TerminalError::Transport),
            _ => Err(TerminalError::NotConnected),
        }
    }

    /// Append decoded, stripped output.
    ///
    /// Ignored while idle: there is no session to show it in.
    pub fn append_output(&mut self, text: &str) {
        if self.state == SessionState::Idle || text.is_empty() {
            return;
        }
        self.scrollback.append(text);
    }

    /// Local echo of a dispatched line.
    pub fn echo(&mut self, line: &str) {
        self.scrollback.append(line);
        self.scrollback.append("\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::testing::{Recorder, RecordingSocket};

    fn open_session(recorder: &Recorder) -> Session<RecordingSocket> {
        let mut session = Session::new();
        session.connecting(AttachTarget::new("5", "c1"), recorder.socket());
        assert!(session.opened());
        session
    }

    #[test]
    fn connecting_shows_placeholder_until_open() {
        let recorder = Recorder::default();
        let mut session = Session::new();
        session.connecting(AttachTarget::new("5", "c1"), recorder.socket());
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.has_socket());
        assert_eq!(session.scrollback().as_str(), CONNECTING_PLACEHOLDER);

        assert!(session.opened());
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.scrollback().is_empty());
    }

    #[test]
    fn open_event_outside_connecting_is_ignored() {
        let recorder = Recorder::default();
        let mut session = open_session(&recorder);
        session.append_output("data");
        assert!(!session.opened());
        assert_eq!(session.scrollback().as_str(), "data");
    }

    #[test]
    fn double_close_appends_marker_once() {
        let recorder = Recorder::default();
        let mut session = open_session(&recorder);
        assert!(session.closed());
        assert!(!session.closed());
        assert_eq!(session.scrollback().as_str(), CLOSED_MARKER);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_socket());
    }

    #[test]
    fn send_requires_open() {
        let recorder = Recorder::default();
        let mut session: Session<RecordingSocket> = Session::new();
        assert!(matches!(session.send("ls"), Err(TerminalError::NotConnected)));

        session.connecting(AttachTarget::new("5", "c1"), recorder.socket());
        assert!(matches!(session.send("ls"), Err(TerminalError::NotConnected)));

        session.opened();
        session.send("ls").unwrap();
        assert_eq!(recorder.sent(), vec!["ls\n".to_string()]);

        session.closed();
        assert!(matches!(session.send("ls"), Err(TerminalError::NotConnected)));
        assert_eq!(recorder.sent().len(), 1);
    }

    #[test]
    fn timeout_closes_socket_and_tears_down() {
        let recorder = Recorder::default();
        let mut session = Session::new();
        session.connecting(AttachTarget::new("5", "c1"), recorder.socket());
        assert!(session.timed_out());
        assert_eq!(recorder.close_calls(), 1);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.scrollback().ends_with(CLOSED_MARKER));

        // The close event caused by our own close() is then a no-op.
        assert!(!session.closed());
        assert!(!session.timed_out());
    }

    #[test]
    fn detach_resets_from_any_state() {
        let recorder = Recorder::default();
        let mut session = open_session(&recorder);
        session.append_output("output");
        session.set_input("half typed");
        session.detach();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_socket());
        assert!(session.scrollback().is_empty());
        assert!(session.input().is_empty());
        assert!(session.target().is_none());
        assert_eq!(recorder.close_calls(), 1);

        // Detaching again touches nothing.
        session.detach();
        assert_eq!(recorder.close_calls(), 1);
    }

    #[test]
    fn detach_after_close_does_not_close_again() {
        let recorder = Recorder::default();
        let mut session = open_session(&recorder);
        session.closed();
        session.detach();
        assert_eq!(recorder.close_calls(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn output_ignored_when_idle() {
        let mut session: Session<RecordingSocket> = Session::new();
        session.append_output("stray");
        assert!(session.scrollback().is_empty());
    }
}
