//! tokio-tungstenite implementation of [`Connector`].
//!
//! Each socket is a spawned I/O pump that owns the WebSocket stream. The
//! [`WsSocket`] handle only feeds it outbound commands over a channel, so
//! `send` and `close` never block and never touch the network directly.

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::frame::Frame;
use super::transport::{Connector, EventSender, Socket, SocketEvent};

enum Outbound {
    Text(String),
    Close,
}

/// Opens attach sockets with `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    /// Binary frames at least this large are decoded off the event loop.
    pub deferred_threshold: usize,
}

impl WsConnector {
    pub fn new(deferred_threshold: usize) -> Self {
        Self { deferred_threshold }
    }
}

impl Connector for WsConnector {
    type Socket = WsSocket;

    /// Must be called from within a Tokio runtime.
    fn open(&mut self, url: &Url, events: EventSender) -> WsSocket {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(
            url.to_string(),
            self.deferred_threshold,
            out_rx,
            events,
        ));
        WsSocket {
            outbound: out_tx,
            closing: false,
        }
    }
}

/// Write handle for one attach socket. Dropping it closes the socket.
pub struct WsSocket {
    outbound: mpsc::UnboundedSender<Outbound>,
    closing: bool,
}

impl Socket for WsSocket {
    fn send(&mut self, payload: String) -> Result<(), String> {
        if self.closing {
            return Err("socket is closing".into());
        }
        self.outbound
            .send(Outbound::Text(payload))
            .map_err(|_| "socket task has ended".to_string())
    }

    fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Resolves once the handle asks to close or goes away. Text queued before
/// the handshake finishes is dropped.
async fn close_requested(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Some(cmd) = outbound.recv().await {
        if matches!(cmd, Outbound::Close) {
            return;
        }
    }
}

fn inbound_frame(bytes: Vec<u8>, threshold: usize) -> Frame {
    if bytes.len() >= threshold {
        Frame::materialize_later(bytes)
    } else {
        Frame::Bytes(bytes)
    }
}

async fn pump(
    url: String,
    deferred_threshold: usize,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: EventSender,
) {
    let emit = |event: SocketEvent| {
        let _ = events.send(event);
    };

    let ws_stream = tokio::select! {
        res = tokio_tungstenite::connect_async(url.as_str()) => match res {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!("Attach socket connect failed: {e}");
                emit(SocketEvent::Error(e.to_string()));
                emit(SocketEvent::Closed { code: None, reason: e.to_string() });
                return;
            }
        },
        () = close_requested(&mut outbound) => {
            debug!("Attach socket closed before the handshake finished");
            emit(SocketEvent::Closed { code: None, reason: "closed while connecting".into() });
            return;
        }
    };

    emit(SocketEvent::Open);
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    emit(SocketEvent::Frame(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    emit(SocketEvent::Frame(inbound_frame(bytes.to_vec(), deferred_threshold)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    debug!("Attach socket closed by server: {code:?} {reason}");
                    emit(SocketEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Attach socket read error: {e}");
                    emit(SocketEvent::Error(e.to_string()));
                    emit(SocketEvent::Closed { code: None, reason: e.to_string() });
                    break;
                }
                None => {
                    emit(SocketEvent::Closed { code: None, reason: "connection ended".into() });
                    break;
                }
            },
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Text(payload)) => {
                    if let Err(e) = sink.send(Message::Text(payload.into())).await {
                        warn!("Attach socket write error: {e}");
                        emit(SocketEvent::Error(e.to_string()));
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    emit(SocketEvent::Closed { code: Some(1000), reason: "closed by client".into() });
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Utf8Bytes;

    use super::*;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<SocketEvent>) -> SocketEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within 5s")
            .expect("event channel open")
    }

    async fn local_listener() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = Url::parse(&format!("ws://{addr}/api/websocket/attach?id=c1")).unwrap();
        (listener, url)
    }

    #[tokio::test]
    async fn frames_flow_both_ways_until_server_close() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text("hi\x1b[0m".to_string().into())).await.unwrap();
            ws.send(Message::Binary(b"ok".to_vec().into())).await.unwrap();
            ws.send(Message::Binary(b"large".to_vec().into())).await.unwrap();
            let received = ws.next().await.unwrap().unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Utf8Bytes::from_static("bye"),
            }))
            .await
            .unwrap();
            received
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut socket = WsConnector::new(4).open(&url, tx);

        assert!(matches!(next_event(&mut rx).await, SocketEvent::Open));
        assert!(matches!(
            next_event(&mut rx).await,
            SocketEvent::Frame(Frame::Text(ref t)) if t == "hi\x1b[0m"
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            SocketEvent::Frame(Frame::Bytes(ref b)) if b == b"ok"
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            SocketEvent::Frame(Frame::Deferred(_))
        ));

        socket.send("ls\n".into()).unwrap();
        assert!(matches!(
            next_event(&mut rx).await,
            SocketEvent::Closed { code: Some(1000), ref reason } if reason == "bye"
        ));

        let received = server.await.unwrap();
        assert_eq!(received.into_text().unwrap().as_str(), "ls\n");
    }

    #[tokio::test]
    async fn close_during_handshake_reports_closed_only() {
        // Accepts TCP (kernel backlog) but never answers the upgrade.
        let (_listener, url) = local_listener().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut socket = WsConnector::new(1024).open(&url, tx);

        socket.close();
        socket.close();
        assert!(socket.send("late".into()).is_err());

        assert!(matches!(
            next_event(&mut rx).await,
            SocketEvent::Closed { code: None, .. }
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        let (listener, url) = local_listener().await;
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _socket = WsConnector::new(1024).open(&url, tx);

        assert!(matches!(next_event(&mut rx).await, SocketEvent::Error(_)));
        assert!(matches!(
            next_event(&mut rx).await,
            SocketEvent::Closed { code: None, .. }
        ));
    }
}
