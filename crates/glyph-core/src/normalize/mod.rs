//! Output cleanup shared by the interpreter adapters.
//!
//! Every function here is pure. Which ones an adapter applies, and with
//! which [`LineFilter`] rules, is decided by the adapter and its toolchain
//! data.

use serde::{Deserialize, Serialize};

/// Border glyphs that make up the frame of a boxed array rendering.
const BOX_BORDER: &[char] = &['┌', '┐', '└', '┘', '─', '→', '↓'];

/// Length in bytes of the escape sequence at the start of `rest`, if any.
///
/// Recognizes CSI sequences (`ESC [ params letter`, with an optional `?`
/// private marker) and OSC sequences terminated by BEL.
fn escape_len(rest: &[u8]) -> Option<usize> {
    match rest.get(1)? {
        b'[' => {
            let mut i = 2;
            if rest.get(i) == Some(&b'?') {
                i += 1;
            }
            while matches!(rest.get(i), Some(b'0'..=b'9' | b';')) {
                i += 1;
            }
            rest.get(i)
                .filter(|b| b.is_ascii_alphabetic())
                .map(|_| i + 1)
        }
        b']' => rest[2..].iter().position(|&b| b == 0x07).map(|p| p + 3),
        _ => None,
    }
}

/// Remove terminal escape sequences.
pub fn strip_ansi(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            if let Some(len) = escape_len(&bytes[i..]) {
                out.push_str(&text[copied..i]);
                i += len;
                copied = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[copied..]);
    out
}

/// Line-level deny list, matched against each line with surrounding
/// whitespace trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineFilter {
    pub drop_blank: bool,
    pub drop_contains: Vec<String>,
    pub drop_prefixes: Vec<String>,
}

impl LineFilter {
    pub fn is_empty(&self) -> bool {
        !self.drop_blank && self.drop_contains.is_empty() && self.drop_prefixes.is_empty()
    }

    pub fn keeps(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if self.drop_blank && trimmed.is_empty() {
            return false;
        }
        if self.drop_prefixes.iter().any(|p| trimmed.starts_with(p.as_str())) {
            return false;
        }
        !self.drop_contains.iter().any(|s| trimmed.contains(s.as_str()))
    }

    /// Keep the surviving lines, joined with `\n`.
    pub fn apply(&self, text: &str) -> String {
        text.split('\n')
            .filter(|line| self.keeps(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Filters for both output streams of one interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub stdout: LineFilter,
    pub stderr: LineFilter,
}

/// Flatten a box-drawn array rendering.
///
/// Each `│...│` segment becomes one line, trimmed; empty segments and
/// fragments made only of frame glyphs are dropped. Text without `│` is
/// returned unchanged.
pub fn decode_boxed(text: &str) -> String {
    if !text.contains('│') {
        return text.to_owned();
    }
    let parts: Vec<&str> = text.split('│').collect();
    parts
        .iter()
        .enumerate()
        .skip(1)
        .step_by(2)
        .filter(|(i, _)| *i < parts.len() - 1)
        .map(|(_, segment)| segment.trim())
        .filter(|segment| !segment.is_empty() && !segment.chars().all(|c| BOX_BORDER.contains(&c)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove a trailing REPL echo such as J's `exit 0`.
pub fn strip_trailing_echo(text: &str, echo: &str) -> String {
    let trimmed = text.trim_end();
    match trimmed.strip_suffix(echo) {
        Some(rest) => rest.trim_end().to_owned(),
        None => trimmed.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_and_private_mode_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("\x1b[?25lhidden\x1b[?25h"), "hidden");
        assert_eq!(strip_ansi("\x1b]0;title\x07body"), "body");
    }

    #[test]
    fn keeps_text_and_unterminated_escapes() {
        assert_eq!(strip_ansi("⟨1 2⟩ plain"), "⟨1 2⟩ plain");
        assert_eq!(strip_ansi("a\x1b[12"), "a\x1b[12");
        assert_eq!(strip_ansi("\x1b[1m┌─┐\x1b[0m"), "┌─┐");
    }

    #[test]
    fn line_filter_drops_noise() {
        let filter = LineFilter {
            drop_blank: true,
            drop_contains: vec!["glX".into(), "]boxing".into()],
            drop_prefixes: vec!["Was ".into()],
        };
        let text = "glXChooseVisual failed\n\n  ]boxing on\nWas OFF\nDOMAIN ERROR";
        assert_eq!(filter.apply(text), "DOMAIN ERROR");
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = LineFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn decodes_a_boxed_vector() {
        assert_eq!(decode_boxed("┌→────┐\n│1 2 3│\n└─────┘"), "1 2 3");
    }

    #[test]
    fn decodes_each_boxed_row() {
        let text = "┌→──┐\n│1 2│\n│3 4│\n└───┘";
        assert_eq!(decode_boxed(text), "1 2\n3 4");
    }

    #[test]
    fn plain_text_passes_through_decoding() {
        assert_eq!(decode_boxed("1 2 3"), "1 2 3");
    }

    #[test]
    fn strips_the_exit_echo() {
        assert_eq!(strip_trailing_echo("1 2 3\n   exit 0\n", "exit 0"), "1 2 3");
        assert_eq!(strip_trailing_echo("1 2 3\n", "exit 0"), "1 2 3");
    }
}
