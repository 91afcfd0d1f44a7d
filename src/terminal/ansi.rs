//! Terminal escape-sequence stripping.
//!
//! Attach output is rendered as plain text, so everything a terminal would
//! interpret instead of print is dropped:
//!
//! - **CSI** (`ESC [` params… final byte `0x40..=0x7E`): colours, cursor moves
//! - **OSC** (`ESC ]` … `BEL` or `ESC \`): window titles, hyperlinks
//! - **Charset selection** (`ESC (` X, `ESC )` X)
//! - **Two-byte escapes** (`ESC 7`, `ESC =`, `ESC M`, …)
//!
//! A lone `ESC` that starts none of the above is dropped as well. The output
//! therefore never contains `ESC`, which makes [`strip`] idempotent.

const ESC: char = '\u{1b}';
const BEL: char = '\u{07}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Escape,
    Csi,
    Osc,
    /// Inside OSC, saw `ESC`; `\` terminates, anything else aborts the OSC.
    OscEscape,
    Charset,
}

/// Remove terminal control sequences from `text`, keeping printable content.
pub fn strip(text: &str) -> String {
    if !text.contains(ESC) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Text;

    for c in text.chars() {
        state = step(state, c, &mut out);
    }

    out
}

fn step(state: State, c: char, out: &mut String) -> State {
    match state {
        State::Text => {
            if c == ESC {
                State::Escape
            } else {
                out.push(c);
                State::Text
            }
        }
        State::Escape => match c {
            '[' => State::Csi,
            ']' => State::Osc,
            '(' | ')' => State::Charset,
            ESC => State::Escape,
            '0'..='~' => State::Text,
            // Not an escape we know: drop the ESC, keep the character.
            _ => step(State::Text, c, out),
        },
        State::Csi => match c {
            // Parameter and intermediate bytes.
            '\u{20}'..='\u{3f}' => State::Csi,
            '\u{40}'..='\u{7e}' => State::Text,
            // Malformed: end the sequence and treat `c` as ordinary input.
            _ => step(State::Text, c, out),
        },
        State::Osc => match c {
            BEL => State::Text,
            ESC => State::OscEscape,
            _ => State::Osc,
        },
        State::OscEscape => {
            if c == '\\' {
                State::Text
            } else {
                step(State::Escape, c, out)
            }
        }
        // The designator byte. An ESC here starts a new sequence instead.
        State::Charset => {
            if c == ESC {
                State::Escape
            } else {
                State::Text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_untouched() {
        let s = "total 4\ndrwxr-xr-x 2 root root [x] (y)\n";
        assert_eq!(strip(s), s);
    }

    #[test]
    fn removes_csi_colour_codes() {
        assert_eq!(strip("\x1b[1;32mok\x1b[0m done"), "ok done");
        assert_eq!(strip("\x1b[2J\x1b[Hprompt$ "), "prompt$ ");
        assert_eq!(strip("\x1b[?2004hroot@c1:/# "), "root@c1:/# ");
    }

    #[test]
    fn removes_osc_with_either_terminator() {
        assert_eq!(strip("\x1b]0;root@c1: /\x07$ "), "$ ");
        assert_eq!(strip("a\x1b]8;;http://x\x1b\\link\x1b]8;;\x1b\\b"), "alinkb");
    }

    #[test]
    fn removes_charset_selection() {
        assert_eq!(strip("\x1b(Bhello\x1b)0world"), "helloworld");
    }

    #[test]
    fn truncated_charset_does_not_swallow_next_escape() {
        assert_eq!(strip("\x1b(\x1b[31mred"), "red");
        assert_eq!(strip("a\x1b)\x1b]0;t\x07b"), "ab");
    }

    #[test]
    fn keeps_brackets_without_escape() {
        assert_eq!(strip("[ok] (1) ]\x1b[0m["), "[ok] (1) ][");
    }

    #[test]
    fn removes_two_byte_escapes_and_stray_esc() {
        assert_eq!(strip("\x1b7saved\x1b8"), "saved");
        assert_eq!(strip("tail\x1b"), "tail");
        assert_eq!(strip("a\x1b\x1b[31mb"), "ab");
    }

    #[test]
    fn malformed_csi_keeps_following_text() {
        assert_eq!(strip("\x1b[12\nnext"), "\nnext");
    }

    #[test]
    fn interleaved_sequences_leave_text_identical() {
        let pieces = ["ls -la", "\n", "drwx", " 2 root", "[done]"];
        let escapes = ["\x1b[0m", "\x1b]2;title\x07", "\x1b(B", "\x1b[38;5;208m", "\x1b)A"];
        let mut input = String::new();
        let mut expected = String::new();
        for (i, piece) in pieces.iter().enumerate() {
            input.push_str(escapes[i % escapes.len()]);
            input.push_str(piece);
            expected.push_str(piece);
        }
        assert_eq!(strip(&input), expected);
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "\x1b[31mred\x1b[0m",
            "\x1b\x1b[0m[1m",
            "\x1b]0;t\x1b[1mx",
            "\x1b(\x1b[0m",
            "\x1b(\x1b[31mred",
            "no escapes [at] all",
            "\x1b",
        ];
        for input in inputs {
            let once = strip(input);
            assert_eq!(strip(&once), once, "input {input:?}");
            assert!(!once.contains('\x1b'));
        }
    }
}
