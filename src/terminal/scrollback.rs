//! Append-only scrollback text for an attach session.
//!
//! Scrollback is a single growing string with no size bound. It lives
//! exactly as long as one attach and is cleared on detach or re-attach.

/// Accumulated terminal output shown to the user.
#[derive(Debug, Default, Clone)]
pub struct Scrollback {
    text: String,
    /// Bumped on every [`reset`](Self::reset) so renderers holding an offset
    /// into the old text know to start over.
    epoch: u64,
}

impl Scrollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate `text` to the end of the buffer.
    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Clear the buffer and start a new epoch.
    pub fn reset(&mut self) {
        self.text.clear();
        self.epoch += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.text.ends_with(suffix)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Text appended since `offset` within the same epoch.
    ///
    /// Returns the whole buffer if `epoch` is stale.
    pub fn since(&self, epoch: u64, offset: usize) -> &str {
        if epoch != self.epoch {
            return &self.text;
        }
        self.text.get(offset..).unwrap_or("")
    }
}

/// A reader's position in a [`Scrollback`], for streaming it out in pieces.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cursor {
    epoch: u64,
    offset: usize,
}

impl Cursor {
    /// Everything appended since the last call, moving the cursor to the end.
    pub fn advance<'a>(&mut self, scrollback: &'a Scrollback) -> &'a str {
        let fresh = scrollback.since(self.epoch, self.offset);
        self.epoch = scrollback.epoch();
        self.offset = scrollback.len();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_concatenates_in_order() {
        let mut sb = Scrollback::new();
        sb.append("a");
        sb.append("bc");
        assert_eq!(sb.as_str(), "abc");
        assert_eq!(sb.len(), 3);
    }

    #[test]
    fn reset_clears_and_bumps_epoch() {
        let mut sb = Scrollback::new();
        sb.append("hello");
        let epoch = sb.epoch();
        sb.reset();
        assert!(sb.is_empty());
        assert_eq!(sb.epoch(), epoch + 1);
    }

    #[test]
    fn since_tracks_offset_within_epoch() {
        let mut sb = Scrollback::new();
        sb.append("abc");
        let (epoch, offset) = (sb.epoch(), sb.len());
        sb.append("def");
        assert_eq!(sb.since(epoch, offset), "def");

        sb.reset();
        sb.append("xyz");
        assert_eq!(sb.since(epoch, offset), "xyz");
    }

    #[test]
    fn cursor_yields_each_piece_once() {
        let mut sb = Scrollback::new();
        let mut cursor = Cursor::default();
        sb.append("Connecting...");
        assert_eq!(cursor.advance(&sb), "Connecting...");
        assert_eq!(cursor.advance(&sb), "");

        sb.reset();
        sb.append("$ ");
        assert_eq!(cursor.advance(&sb), "$ ");
        sb.append("ls\n");
        assert_eq!(cursor.advance(&sb), "ls\n");
    }
}
