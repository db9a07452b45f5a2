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

//! Single-pass tokenizer and tree builder
//!
//! One forward scan over the input produces the flat atom array, the nested
//! container tree and the raw symbol table together. Nesting is tracked with an
//! explicit container stack, so pathological input cannot exhaust the call
//! stack.
//!
//! ## Lexical rules
//!
//! - `(` opens a container whose first item is the `(` atom; `'(` opens a
//!   container whose first two items are `'` and `(`
//! - `)` closes the innermost container; at the top level it is kept as a
//!   plain atom
//! - a standalone `'` is always its own atom
//! - `"` starts a string; a backslash escapes the next character
//! - `;|` starts a block comment ending at the first `|;`, any other `;` starts
//!   a line comment ending before the line break
//! - whitespace separates symbols and is not kept
//!
//! Unterminated strings and comments run to the end of input. Containers still
//! open at the end of input are closed there.

use smallvec::SmallVec;
use std::time::Instant;

use super::keywords::KeywordOracle;
use crate::ast::{Atom, Container, Document, LineFeed, Node, SymbolTable, is_primitive_text};

/// Builds a [`Document`] from source text
pub struct TreeBuilder<'input, 'k> {
    input: &'input str,
    pos: usize,
    line: u32,
    column: u32,
    /// Byte offset, line and column where the pending bare symbol started
    pending: Option<(usize, u32, u32)>,
    atoms: Vec<Atom>,
    stack: SmallVec<[Container; 16]>,
    symbol_table: SymbolTable,
    oracle: &'k dyn KeywordOracle,
}

impl<'input, 'k> TreeBuilder<'input, 'k> {
    /// Create a builder over `input` using `oracle` to exclude native keywords
    pub fn new(input: &'input str, oracle: &'k dyn KeywordOracle) -> Self {
        let mut stack = SmallVec::new();
        stack.push(Container::open(0));
        Self {
            input,
            pos: 0,
            line: 0,
            column: 0,
            pending: None,
            atoms: Vec::with_capacity(input.len() / 4),
            stack,
            symbol_table: SymbolTable::default(),
            oracle,
        }
    }

    /// Scan the whole input; export flags are not annotated
    pub fn build(mut self) -> Document {
        let started = Instant::now();
        let input = self.input;
        let bytes = input.as_bytes();

        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'(' => {
                    self.flush_pending();
                    self.open_container();
                    self.emit_until(self.pos + 1);
                }
                b')' => {
                    self.flush_pending();
                    self.emit_until(self.pos + 1);
                    if self.stack.len() > 1 {
                        self.close_container();
                    }
                }
                b'\'' => {
                    self.flush_pending();
                    if bytes.get(self.pos + 1) == Some(&b'(') {
                        self.open_container();
                        self.emit_until(self.pos + 1);
                    }
                    self.emit_until(self.pos + 1);
                }
                b'"' => {
                    self.flush_pending();
                    let end = self.string_end();
                    self.emit_until(end);
                }
                b';' => {
                    self.flush_pending();
                    let end = self.comment_end();
                    self.emit_until(end);
                }
                b'\n' => {
                    self.flush_pending();
                    self.pos += 1;
                    self.line += 1;
                    self.column = 0;
                }
                b' ' | b'\t' | b'\r' | 0x0B | 0x0C => {
                    self.flush_pending();
                    self.pos += 1;
                    self.column += 1;
                }
                byte if byte >= 0x80 => {
                    let ch = input[self.pos..]
                        .chars()
                        .next()
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    if ch.is_whitespace() {
                        self.flush_pending();
                    } else {
                        self.mark_pending();
                    }
                    self.pos += ch.len_utf8();
                    self.column += 1;
                }
                _ => {
                    self.mark_pending();
                    self.pos += 1;
                    self.column += 1;
                }
            }
        }

        self.flush_pending();
        while self.stack.len() > 1 {
            self.close_container();
        }
        let mut root = self.stack.pop().unwrap_or_default();
        root.first = 0;
        root.end = self.atoms.len();

        log::debug!(
            "parsed {} atoms, {} symbol keys in {:?}",
            self.atoms.len(),
            self.symbol_table.len(),
            started.elapsed()
        );

        Document {
            linefeed: LineFeed::detect(self.input),
            atoms: self.atoms,
            root,
            symbol_table: self.symbol_table,
        }
    }

    #[inline]
    fn mark_pending(&mut self) {
        if self.pending.is_none() {
            self.pending = Some((self.pos, self.line, self.column));
        }
    }

    #[inline]
    fn flush_pending(&mut self) {
        if let Some((start, line, column)) = self.pending.take() {
            self.push_atom(start, self.pos, line, column);
        }
    }

    /// Emit `input[pos..end]` at the cursor and move past it
    fn emit_until(&mut self, end: usize) {
        self.push_atom(self.pos, end, self.line, self.column);
        self.advance_to(end);
    }

    fn push_atom(&mut self, start: usize, end: usize, line: u32, column: u32) {
        let input = self.input;
        let text = &input[start..end];
        let flat_index = self.atoms.len();

        if !is_primitive_text(text) {
            let lower = text.to_lowercase();
            if !self.oracle.is_native(&lower) {
                self.symbol_table.entry(lower).or_default().push(flat_index);
            }
        }

        self.atoms.push(Atom::new(text, line, column, flat_index));
        if let Some(current) = self.stack.last_mut() {
            current.items.push(Node::Atom(flat_index));
        }
    }

    /// Move the cursor to `end`, following line breaks inside the skipped text
    fn advance_to(&mut self, end: usize) {
        let skipped = &self.input.as_bytes()[self.pos..end];
        match memchr::memrchr(b'\n', skipped) {
            Some(last) => {
                self.line += memchr::memchr_iter(b'\n', skipped).count() as u32;
                self.column = char_count(&skipped[last + 1..]);
            }
            None => self.column += char_count(skipped),
        }
        self.pos = end;
    }

    fn open_container(&mut self) {
        self.stack.push(Container::open(self.atoms.len()));
    }

    fn close_container(&mut self) {
        if let Some(mut child) = self.stack.pop() {
            child.end = self.atoms.len();
            if let Some(parent) = self.stack.last_mut() {
                parent.items.push(Node::Container(child));
            }
        }
    }

    /// End of the string starting at the cursor, closing quote included
    fn string_end(&self) -> usize {
        let bytes = self.input.as_bytes();
        let mut escaping = false;
        for (offset, &byte) in bytes[self.pos + 1..].iter().enumerate() {
            if escaping {
                escaping = false;
            } else if byte == b'\\' {
                escaping = true;
            } else if byte == b'"' {
                return self.pos + 1 + offset + 1;
            }
        }
        bytes.len()
    }

    /// End of the comment starting at the cursor
    ///
    /// Block comments include their closing `|;`. Line comments stop before
    /// the line break so it is counted by the main loop.
    fn comment_end(&self) -> usize {
        let bytes = self.input.as_bytes();
        if bytes.get(self.pos + 1) == Some(&b'|') {
            // searched from the `|` of the opener, so `;|;` is a closed comment
            memchr::memmem::find(&bytes[self.pos + 1..], b"|;")
                .map_or(bytes.len(), |offset| self.pos + 1 + offset + 2)
        } else {
            memchr::memchr2(b'\r', b'\n', &bytes[self.pos..])
                .map_or(bytes.len(), |offset| self.pos + offset)
        }
    }
}

/// Unicode scalar count of a UTF-8 byte slice
#[inline]
fn char_count(bytes: &[u8]) -> u32 {
    bytes.iter().filter(|&&byte| (byte & 0xC0) != 0x80).count() as u32
}
