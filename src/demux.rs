//! Docker multiplexed stream decoding.
//!
//! Without a TTY, Docker frames container output (logs, exec) as:
//!
//! ```text
//! [stream: u8][0][0][0][len: u32 BE][payload: len bytes] ...
//! ```
//!
//! where `stream` is 0 (stdin), 1 (stdout) or 2 (stderr). Containers started
//! with a TTY send raw bytes instead, so a body that does not start with a
//! plausible header is passed through untouched.

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

fn header(bytes: &[u8]) -> Option<(StreamKind, usize)> {
    if bytes.len() < HEADER_LEN || bytes[1..4] != [0, 0, 0] {
        return None;
    }
    let kind = StreamKind::from_byte(bytes[0])?;
    let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    Some((kind, len))
}

/// Split a multiplexed body into `(stream, payload)` frames.
///
/// Returns `None` if `bytes` is not multiplexed. A truncated final frame
/// yields whatever payload is present; trailing bytes that do not form a
/// header are returned as one stdout frame.
pub fn frames(bytes: &[u8]) -> Option<Vec<(StreamKind, &[u8])>> {
    header(bytes)?;

    let mut out = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let Some((kind, len)) = header(rest) else {
            out.push((StreamKind::Stdout, rest));
            break;
        };
        let end = (HEADER_LEN + len).min(rest.len());
        out.push((kind, &rest[HEADER_LEN..end]));
        rest = &rest[end..];
    }
    Some(out)
}

/// Stdout and stderr interleaved as text, in stream order.
pub fn to_text(bytes: &[u8]) -> String {
    match frames(bytes) {
        Some(frames) => {
            let joined: Vec<u8> = frames
                .into_iter()
                .filter(|(kind, _)| *kind != StreamKind::Stdin)
                .flat_map(|(_, payload)| payload.iter().copied())
                .collect();
            String::from_utf8_lossy(&joined).into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}
