// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Atoms: the indivisible tokens of a parsed document

use compact_str::CompactString;
use smallvec::SmallVec;

use super::position::{Position, Range};

/// First characters that always make a token primitive
const PRIMITIVE_GLYPHS: [u8; 5] = [b'\'', b'(', b')', b'.', b';'];

/// A single token: symbol, number, string literal, comment or structural glyph
///
/// Atoms are created once by the tree builder. Only the two annotation fields
/// (`comment_links`, `has_export_flag`) are written afterwards, by the export
/// annotator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub(crate) symbol: CompactString,
    pub(crate) line: u32,
    pub(crate) column: u32,
    pub(crate) flat_index: usize,
    pub(crate) comment_links: SmallVec<[usize; 2]>,
    pub(crate) has_export_flag: bool,
}

impl Atom {
    /// Create an atom at the given position and flat index
    pub fn new(symbol: &str, line: u32, column: u32, flat_index: usize) -> Self {
        Self {
            symbol: CompactString::from(symbol),
            line,
            column,
            flat_index,
            comment_links: SmallVec::new(),
            has_export_flag: false,
        }
    }

    /// The token text, including delimiters for strings and comments
    #[inline]
    pub fn symbol(&self) -> &str {
        self.symbol.as_str()
    }

    /// Zero-based start line
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Zero-based start column
    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Dense position in the document's flat atom array
    #[inline]
    pub fn flat_index(&self) -> usize {
        self.flat_index
    }

    /// Flat indices of comments linked to this atom by the export annotator
    #[inline]
    pub fn comment_links(&self) -> &[usize] {
        &self.comment_links
    }

    /// Whether an adjacent `@Global` comment marks this atom as exported
    #[inline]
    pub fn has_export_flag(&self) -> bool {
        self.has_export_flag
    }

    /// Start position
    pub fn start(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Number of characters in the token text
    pub fn len(&self) -> usize {
        self.symbol.chars().count()
    }

    /// Whether the token text is empty
    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty()
    }

    /// Start or last line of the atom
    ///
    /// With `last` set, multi-line atoms (block comments, strings spanning
    /// lines) report the line their text ends on.
    pub fn symb_line(&self, last: bool) -> u32 {
        if last {
            self.line + newline_count(self.symbol()) as u32
        } else {
            self.line
        }
    }

    /// Full range of the atom, following embedded line breaks
    pub fn range(&self) -> Range {
        Range::new(self.start(), end_position(self.symbol(), self.start()))
    }

    /// Whether this atom encloses `position`, ends inclusive
    pub fn contains(&self, position: Position) -> bool {
        self.range().contains(position)
    }

    /// Any comment form
    #[inline]
    pub fn is_comment(&self) -> bool {
        self.symbol.starts_with(';')
    }

    /// A `;|...|;` block comment
    #[inline]
    pub fn is_block_comment(&self) -> bool {
        self.symbol.starts_with(";|")
    }

    /// A `;` comment running to the end of its line
    #[inline]
    pub fn is_line_comment(&self) -> bool {
        self.is_comment() && !self.is_block_comment()
    }

    /// The structural `(` glyph
    #[inline]
    pub fn is_left_paren(&self) -> bool {
        self.symbol == "("
    }

    /// The structural `)` glyph
    #[inline]
    pub fn is_right_paren(&self) -> bool {
        self.symbol == ")"
    }

    /// The standalone quote glyph
    #[inline]
    pub fn is_quote(&self) -> bool {
        self.symbol == "'"
    }

    /// A double-quoted string literal
    #[inline]
    pub fn is_string(&self) -> bool {
        self.symbol.starts_with('"')
    }

    /// An integer, real or exponent literal
    pub fn is_number(&self) -> bool {
        is_number_text(self.symbol())
    }

    /// Literal or syntax token that never names a user symbol
    pub fn is_primitive(&self) -> bool {
        is_primitive_text(self.symbol())
    }
}

/// Count `\n` characters; `\r\n` endings count once
pub(crate) fn newline_count(text: &str) -> usize {
    memchr::memchr_iter(b'\n', text.as_bytes()).count()
}

/// Position reached after writing `text` starting at `start`
pub(crate) fn end_position(text: &str, start: Position) -> Position {
    match memchr::memrchr(b'\n', text.as_bytes()) {
        Some(last) => Position::new(
            start.line + newline_count(text) as u32,
            text[last + 1..].chars().count() as u32,
        ),
        None => Position::new(start.line, start.character + text.chars().count() as u32),
    }
}

/// Whether `text` is a primitive token
///
/// Primitives are structural glyphs, comments, strings (terminated or not),
/// `T`/`nil` in either case with an optional leading quote, and numbers.
pub fn is_primitive_text(text: &str) -> bool {
    let bytes = text.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };
    if PRIMITIVE_GLYPHS.contains(&first) || first == b'"' {
        return true;
    }
    text.eq_ignore_ascii_case("t") || text.eq_ignore_ascii_case("nil") || is_number_text(text)
}

/// Matches `-?\d+`, `-?\d+\.\d+`, `-?\d+[eE][+-]?\d+` and `-?\d+\.\d+[eE][+-]?\d+`
pub fn is_number_text(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut pos = usize::from(bytes.first() == Some(&b'-'));

    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let whole = digits(pos);
    if whole == 0 {
        return false;
    }
    pos += whole;

    if bytes.get(pos) == Some(&b'.') {
        let fraction = digits(pos + 1);
        if fraction == 0 {
            return false;
        }
        pos += 1 + fraction;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        let exponent = digits(pos);
        if exponent == 0 {
            return false;
        }
        pos += exponent;
    }

    pos == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_classification() {
        for text in [
            "(", ")", "'", ".", "; note", ";|block|;", "\"str\"", "\"open", "T", "t", "nil",
            "NIL", "'nil", "'t", "42", "-42", "3.14", "-0.5", "1e10", "1E-3", "2.5e+4",
        ] {
            assert!(is_primitive_text(text), "{text} should be primitive");
        }
        for text in ["", "pt", "c:dostuff", "1+", "-", "+", "tt", "nil2", "1.", "1e"] {
            assert!(!is_primitive_text(text), "{text} should not be primitive");
        }
    }

    #[test]
    fn test_number_grammar() {
        assert!(is_number_text("0"));
        assert!(is_number_text("-10"));
        assert!(is_number_text("10.25"));
        assert!(is_number_text("7e3"));
        assert!(!is_number_text("-"));
        assert!(!is_number_text("1.2.3"));
        assert!(!is_number_text("+5"));
        assert!(!is_number_text("12abc"));
    }

    #[test]
    fn test_atom_range_single_line() {
        let atom = Atom::new("setq", 2, 4, 0);
        assert_eq!(
            atom.range(),
            Range::new(Position::new(2, 4), Position::new(2, 8))
        );
        assert!(atom.contains(Position::new(2, 8)));
        assert!(!atom.contains(Position::new(2, 9)));
    }

    #[test]
    fn test_atom_range_multi_line() {
        let atom = Atom::new(";|line one\nline two|;", 5, 3, 0);
        assert_eq!(atom.symb_line(true), 6);
        assert_eq!(atom.symb_line(false), 5);
        assert_eq!(
            atom.range(),
            Range::new(Position::new(5, 3), Position::new(6, 10))
        );
    }

    #[test]
    fn test_comment_kinds() {
        let line = Atom::new("; hello", 0, 0, 0);
        let block = Atom::new(";|hello|;", 0, 0, 1);
        assert!(line.is_comment() && line.is_line_comment() && !line.is_block_comment());
        assert!(block.is_comment() && block.is_block_comment() && !block.is_line_comment());
    }
}
