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

//! The parsed document: flat atom array, tree and symbol table

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::atom::{Atom, newline_count};
use super::container::{Container, ContainerRef, Fragment};
use super::position::{LineFeed, Position};

/// Lowercased user symbol name to the flat indices of its occurrences
pub type SymbolTable = FxHashMap<String, SmallVec<[usize; 4]>>;

/// A parsed AutoLISP document
///
/// Holds the dense flat atom array, the root container whose tree indexes into
/// it, the raw symbol table and the detected line ending.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub(crate) atoms: Vec<Atom>,
    pub(crate) root: Container,
    pub(crate) symbol_table: SymbolTable,
    pub(crate) linefeed: LineFeed,
}

impl Document {
    /// View of the root container
    pub fn root(&self) -> ContainerRef<'_> {
        ContainerRef::new(&self.atoms, &self.root, true)
    }

    /// Top-level items in source order
    pub fn items(&self) -> impl Iterator<Item = Fragment<'_>> {
        self.root().items()
    }

    /// Every atom in document order; `flatten()[i].flat_index() == i`
    pub fn flatten(&self) -> &[Atom] {
        &self.atoms
    }

    /// Atom at a flat index
    pub fn atom(&self, flat_index: usize) -> Option<&Atom> {
        self.atoms.get(flat_index)
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    /// Number of atoms
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the document has no atoms
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The raw symbol table
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    /// Flat indices recorded for `key`, matched case-insensitively
    pub fn occurrences(&self, key: &str) -> &[usize] {
        let found = match self.symbol_table.get(key) {
            Some(found) => Some(found),
            None => self.symbol_table.get(&key.to_lowercase()),
        };
        found.map(|indices| indices.as_slice()).unwrap_or_default()
    }

    /// Line ending detected in the source text
    pub fn linefeed(&self) -> LineFeed {
        self.linefeed
    }

    /// Deepest atom enclosing `position`
    pub fn atom_at(&self, position: Position) -> Option<&Atom> {
        self.root().atom_at(position)
    }

    /// Deepest container enclosing `position`, or its parent
    pub fn container_at(&self, position: Position, parent: bool) -> Option<ContainerRef<'_>> {
        self.root().container_at(position, parent)
    }

    /// The container directly holding `child`
    pub fn parent_of(&self, child: &Fragment<'_>) -> Option<ContainerRef<'_>> {
        self.root().parent_of(child)
    }

    /// Containers whose head atom satisfies `predicate`
    pub fn find_children<P>(&self, predicate: P, recursive: bool) -> Vec<ContainerRef<'_>>
    where
        P: FnMut(&Atom) -> bool,
    {
        self.root().find_children(predicate, recursive)
    }

    /// Rebuild source text from the recorded atom positions
    ///
    /// Gaps are filled with the detected line ending and spaces, so the output
    /// matches the input except for whitespace between atoms: each tab there
    /// is written back as a single space, and trailing whitespace is dropped.
    /// Tabs inside strings and comments are kept.
    pub fn to_text(&self) -> String {
        let linefeed = self.linefeed.as_str();
        let mut out = String::with_capacity(self.atoms.iter().map(|a| a.symbol().len() + 1).sum());
        let mut line = 0u32;
        let mut column = 0u32;

        for atom in &self.atoms {
            while line < atom.line() {
                out.push_str(linefeed);
                line += 1;
                column = 0;
            }
            while column < atom.column() {
                out.push(' ');
                column += 1;
            }
            out.push_str(atom.symbol());

            let breaks = newline_count(atom.symbol()) as u32;
            if breaks > 0 {
                line += breaks;
                let tail = atom.symbol().rsplit('\n').next().unwrap_or_default();
                column = tail.chars().count() as u32;
            } else {
                column += atom.len() as u32;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Position;
    use crate::parser::parse;

    #[test]
    fn test_round_trip() {
        let text = "(defun c:test (/ a)\n  ; comment\n  (setq a \"two\nlines\")\n  ;|block\n  comment|; (princ a)\n)\n";
        let doc = parse(text);
        assert_eq!(doc.to_text(), text.trim_end());
    }

    #[test]
    fn test_round_trip_writes_tabs_as_spaces() {
        let text = "(defun c:t ()\n\t(setq a \"x\ty\")\t; a\tnote\n)";
        let doc = parse(text);
        assert_eq!(
            doc.to_text(),
            "(defun c:t ()\n (setq a \"x\ty\") ; a\tnote\n)"
        );
    }

    #[test]
    fn test_deep_document_clones() {
        let depth = 20_000;
        let text = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        let doc = parse(&text);
        let copy = doc.clone();
        drop(doc);
        assert_eq!(copy.to_text(), text);
        assert!(format!("{:?}", copy.root()).contains("is_root: true"));
        let innermost = copy.atom_at(Position::new(0, depth as u32 + 1)).unwrap();
        assert_eq!(innermost.symbol(), "x");
    }

    #[test]
    fn test_round_trip_crlf() {
        let text = "(setq a 1)\r\n\r\n(setq b 2)";
        let doc = parse(text);
        assert_eq!(doc.to_text(), text);
    }

    #[test]
    fn test_occurrences_case_insensitive() {
        let doc = parse("(setq Foo 1) (princ FOO)");
        assert_eq!(doc.occurrences("foo").len(), 2);
        assert_eq!(doc.occurrences("FOO").len(), 2);
        assert!(doc.occurrences("bar").is_empty());
    }

    #[test]
    fn test_document_lookups() {
        let doc = parse("(setq a (list 1 2))");
        assert_eq!(doc.atom_at(Position::new(0, 6)).unwrap().symbol(), "a");
        let list = doc.container_at(Position::new(0, 10), false).unwrap();
        assert_eq!(list.type_name(), "list");
        assert!(doc.atom(100).is_none());
    }
}
