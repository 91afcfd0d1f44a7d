//! Inbound socket frames and their decoding to text.
//!
//! A frame arrives in one of three shapes:
//!
//! | Variant    | Source                              | Decoding                    |
//! |------------|-------------------------------------|-----------------------------|
//! | `Text`     | WebSocket text message              | passed through              |
//! | `Bytes`    | small WebSocket binary message      | UTF-8, synchronously        |
//! | `Deferred` | large binary message, or any future | awaited, then as above      |
//!
//! Invalid UTF-8 is replaced with U+FFFD rather than dropping the frame.
//! [`FrameDecoder`] also holds back a multi-byte character cut off at the
//! end of a binary frame and completes it with the next one, since attach
//! output is chunked with no regard for character boundaries. A deferred
//! frame that fails to materialize becomes an empty string.

use std::fmt;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::debug;

/// One message delivered by the socket.
pub enum Frame {
    Text(String),
    Bytes(Vec<u8>),
    /// Text that becomes available once the future completes.
    Deferred(BoxFuture<'static, Result<String, DecodeError>>),
}

impl Frame {
    /// Decode `bytes` as UTF-8 on the blocking pool instead of inline.
    ///
    /// Used for large binary payloads so the I/O loop keeps moving.
    pub fn materialize_later(bytes: Vec<u8>) -> Self {
        Frame::Deferred(Box::pin(async move {
            tokio::task::spawn_blocking(move || decode_bytes(bytes))
                .await
                .map_err(|e| DecodeError::Materialize(e.to_string()))
        }))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            Frame::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Frame::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Why a frame could not be turned into text. Never leaves the decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to materialize payload: {0}")]
    Materialize(String),
}

/// Result of [`decode`].
pub enum Decoded {
    Ready(String),
    Pending(BoxFuture<'static, String>),
}

/// Decode a frame to text on its own, with no carry-over between frames.
pub fn decode(frame: Frame) -> Decoded {
    FrameDecoder::default().decode(frame)
}

/// Decodes the frames of one connection in arrival order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Leading bytes of a character split across binary frames.
    partial: Vec<u8>,
}

impl FrameDecoder {
    pub fn decode(&mut self, frame: Frame) -> Decoded {
        match frame {
            Frame::Text(text) if self.partial.is_empty() => Decoded::Ready(text),
            Frame::Text(text) => {
                let mut out = decode_bytes(std::mem::take(&mut self.partial));
                out.push_str(&text);
                Decoded::Ready(out)
            }
            Frame::Bytes(bytes) => Decoded::Ready(self.decode_chunk(bytes)),
            Frame::Deferred(fut) => Decoded::Pending(
                fut.map(|res| {
                    res.unwrap_or_else(|e| {
                        debug!("Dropping deferred frame: {e}");
                        String::new()
                    })
                })
                .boxed(),
            ),
        }
    }

    fn decode_chunk(&mut self, bytes: Vec<u8>) -> String {
        let mut buf = if self.partial.is_empty() {
            bytes
        } else {
            let mut joined = std::mem::take(&mut self.partial);
            joined.extend_from_slice(&bytes);
            joined
        };
        let cut = buf.len() - incomplete_tail(&buf);
        self.partial = buf.split_off(cut);
        decode_bytes(buf)
    }
}

/// Length of a truncated but so far valid character at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let floor = bytes.len().saturating_sub(3);
    for start in (floor..bytes.len()).rev() {
        if bytes[start] & 0xC0 != 0x80 {
            return match std::str::from_utf8(&bytes[start..]) {
                Err(e) if e.valid_up_to() == 0 && e.error_len().is_none() => bytes.len() - start,
                _ => 0,
            };
        }
    }
    0
}

/// UTF-8 decode of a binary payload, replacing invalid sequences with U+FFFD.
pub fn decode_bytes(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| {
        debug!("Binary frame has invalid UTF-8 after byte {}", e.utf8_error().valid_up_to());
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    })
}
