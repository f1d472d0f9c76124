//! Rope helpers shared by the document store and the worker mirrors.

use lsp_types::Position;
use ropey::{Rope, RopeSlice};

use super::ModelContentChange;

/// Picks the dominant line ending of `text`.
pub fn detect_eol(text: &str) -> &'static str {
    if text.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Number of characters in `line` excluding its terminator.
fn content_len(line: RopeSlice<'_>) -> usize {
    let mut len = line.len_chars();
    if len > 0 && line.char(len - 1) == '\n' {
        len -= 1;
    }
    if len > 0 && line.char(len - 1) == '\r' {
        len -= 1;
    }
    len
}

/// Converts a position to a char offset in the rope.
///
/// Lines past the end map to the end of the text; columns past the end of a
/// line clamp to the line's last character before its terminator.
pub fn position_to_char(text: &Rope, position: &Position) -> usize {
    let line = position.line as usize;
    if line >= text.len_lines() {
        return text.len_chars();
    }
    let start = text.line_to_char(line);
    start + (position.character as usize).min(content_len(text.line(line)))
}

/// Applies a single range replacement in place.
pub fn apply_change(text: &mut Rope, change: &ModelContentChange) {
    let start = position_to_char(text, &change.range.start);
    let end = position_to_char(text, &change.range.end).max(start);
    if end > start {
        text.remove(start..end);
    }
    if !change.text.is_empty() {
        text.insert(start, &change.text);
    }
}

/// Splits the rope into lines without their terminators.
pub fn lines(text: &Rope) -> Vec<String> {
    text.lines()
        .map(|line| {
            let len = content_len(line);
            line.slice(..len).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Range;

    fn change(start: (u32, u32), end: (u32, u32), text: &str) -> ModelContentChange {
        ModelContentChange {
            range: Range {
                start: Position { line: start.0, character: start.1 },
                end: Position { line: end.0, character: end.1 },
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn test_single_line_replace() {
        let mut text = Rope::from_str("hello world");
        apply_change(&mut text, &change((0, 6), (0, 11), "there"));
        assert_eq!(text.to_string(), "hello there");
    }

    #[test]
    fn test_multi_line_replace() {
        let mut text = Rope::from_str("foo\nbar\nbaz");
        apply_change(&mut text, &change((0, 2), (2, 1), "X"));
        assert_eq!(text.to_string(), "foXaz");
    }

    #[test]
    fn test_out_of_range_positions_clamp() {
        let mut text = Rope::from_str("foo\nbar");
        // Column past the end of line 0 stops before the newline
        apply_change(&mut text, &change((0, 99), (0, 99), "!"));
        assert_eq!(text.to_string(), "foo!\nbar");

        // Line past the end appends
        apply_change(&mut text, &change((7, 0), (9, 0), "\nqux"));
        assert_eq!(text.to_string(), "foo!\nbar\nqux");
    }

    #[test]
    fn test_lines_strip_terminators() {
        let text = Rope::from_str("a\r\nb\r\n");
        assert_eq!(lines(&text), vec!["a", "b", ""]);
        assert_eq!(detect_eol("a\r\nb"), "\r\n");
        assert_eq!(detect_eol("a\nb"), "\n");
    }
}
