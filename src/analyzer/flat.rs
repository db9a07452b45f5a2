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

//! Flat-array services and the export flag annotator
//!
//! These helpers work on the dense atom array alone, scanning backwards over
//! balanced parentheses instead of walking the tree. The annotator resolves
//! every enclosing `(` in one forward pass first, then marks binding names
//! that carry an adjacent `@Global` comment.

use smallvec::SmallVec;

use crate::ast::{Atom, Document};

/// Marker that flags a binding as deliberately exported
pub const EXPORT_MARKER: &str = "@GLOBAL";

const DEFUN_HEADS: &[&str] = &["defun", "defun-q"];
const SETQ_HEADS: &[&str] = &["setq"];

/// Comments adjacent to a binding name and whether they export it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportContext {
    /// Flat indices of the inline comment ahead and the comment behind the form
    pub comment_links: SmallVec<[usize; 2]>,
    /// Whether either comment contains the export marker
    pub exported: bool,
}

/// Flat index of the `(` enclosing the atom at `index`
pub fn enclosing_left_paren(atoms: &[Atom], index: usize) -> Option<usize> {
    let mut balance = 1usize;
    for i in (0..index.min(atoms.len())).rev() {
        if atoms[i].is_right_paren() {
            balance += 1;
        } else if atoms[i].is_left_paren() {
            balance -= 1;
            if balance == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// First non-comment atom after `index`
pub fn next_non_comment(atoms: &[Atom], index: usize) -> Option<usize> {
    (index + 1..atoms.len()).find(|&i| !atoms[i].is_comment())
}

/// Last non-comment atom before `index`
pub fn previous_non_comment(atoms: &[Atom], index: usize) -> Option<usize> {
    (0..index.min(atoms.len())).rev().find(|&i| !atoms[i].is_comment())
}

/// The head atom of the form enclosing `index`
pub fn parent_root_atom(atoms: &[Atom], index: usize) -> Option<usize> {
    parent_root_in(&Scan(atoms), index)
}

/// Whether the atom at `index` sits where a function name is expected
///
/// That is right after an unquoted `(`, after `'`, or after `defun`/`defun-q`.
pub fn is_possible_function_reference(atoms: &[Atom], index: usize) -> bool {
    let Some(atom) = atoms.get(index) else {
        return false;
    };
    if atom.is_primitive() {
        return false;
    }
    let Some(previous_index) = previous_non_comment(atoms, index) else {
        return false;
    };
    let previous = &atoms[previous_index];
    if previous.is_left_paren() {
        // `'(a b)` is a quoted list, not a call
        return previous_index == 0 || !atoms[previous_index - 1].is_quote();
    }
    previous.is_quote()
        || previous.symbol().eq_ignore_ascii_case("defun")
        || previous.symbol().eq_ignore_ascii_case("defun-q")
}

/// Head atom of the enclosing `defun`/`defun-q` form
pub fn defun_parent(atoms: &[Atom], index: usize) -> Option<usize> {
    defun_parent_in(&Scan(atoms), index)
}

/// Head atom of the enclosing `setq` form, when `index` is a variable slot
///
/// A variable slot follows either `setq` itself or the end of the previous
/// value, which must then be a primitive. A setq whose value is a bare
/// variable cannot be told apart from its name slot.
pub fn setq_parent(atoms: &[Atom], index: usize) -> Option<usize> {
    setq_parent_in(&Scan(atoms), index)
}

/// Locate comments adjacent to the binding at `source` inside the form
/// headed by `parent`
pub fn export_context(atoms: &[Atom], source: usize, parent: usize) -> ExportContext {
    export_context_in(&Scan(atoms), source, parent)
}

/// Export context of a `defun` name; `None` unless `index` is the name slot
pub fn verify_defun_globalized(atoms: &[Atom], index: usize) -> Option<ExportContext> {
    verify_defun_in(&Scan(atoms), index)
}

/// Export context of a `setq` variable; `None` unless `index` is a name slot
pub fn verify_setq_globalized(atoms: &[Atom], index: usize) -> Option<ExportContext> {
    verify_setq_in(&Scan(atoms), index)
}

/// Whether the occurrence at `index` is an exported binding
///
/// `is_definition` selects the `defun` name check, otherwise the `setq` one.
/// Occurrences directly after `(` are calls and never exported.
pub fn has_export_context(atoms: &[Atom], index: usize, is_definition: bool) -> bool {
    if index == 0 || index >= atoms.len() || atoms[index - 1].is_left_paren() {
        return false;
    }
    let context = if is_definition {
        verify_defun_globalized(atoms, index)
    } else {
        verify_setq_globalized(atoms, index)
    };
    context.is_some_and(|context| context.exported)
}

/// Annotate export flags and comment links on every symbol table candidate
///
/// Returns the number of atoms flagged as exported. Runs in time linear in
/// the atom count plus the symbol table size.
pub fn annotate(document: &mut Document) -> usize {
    let forms = FormIndex::new(document.flatten());
    let atoms = forms.atoms;
    let mut updates: Vec<(usize, ExportContext)> = Vec::new();

    for &index in document.symbol_table().values().flatten() {
        if index == 0 || atoms[index - 1].is_left_paren() {
            continue;
        }
        let context =
            verify_defun_in(&forms, index).or_else(|| verify_setq_in(&forms, index));
        match context {
            Some(context) if !context.comment_links.is_empty() => updates.push((index, context)),
            _ => {}
        }
    }

    let mut flagged = 0;
    let atoms = document.atoms_mut();
    for (index, context) in updates {
        let atom = &mut atoms[index];
        atom.comment_links = context.comment_links;
        atom.has_export_flag = context.exported;
        flagged += usize::from(context.exported);
    }
    log::debug!("annotated {flagged} exported bindings");
    flagged
}

/// Form lookups the export checks rely on
trait FormLookup {
    fn atoms(&self) -> &[Atom];

    /// Flat index of the `(` enclosing `index`
    fn enclosing(&self, index: usize) -> Option<usize>;

    /// First comment after `index` on the same line
    fn comment_ahead(&self, index: usize) -> Option<usize>;
}

/// Answers each lookup by scanning the atom array
struct Scan<'a>(&'a [Atom]);

impl FormLookup for Scan<'_> {
    fn atoms(&self) -> &[Atom] {
        self.0
    }

    fn enclosing(&self, index: usize) -> Option<usize> {
        enclosing_left_paren(self.0, index)
    }

    fn comment_ahead(&self, index: usize) -> Option<usize> {
        let atoms = self.0;
        let line = atoms[index].line();
        atoms[index + 1..]
            .iter()
            .take_while(|atom| atom.line() == line)
            .find(|atom| atom.is_comment())
            .map(Atom::flat_index)
    }
}

/// Every lookup resolved up front, so each query is constant time
struct FormIndex<'a> {
    atoms: &'a [Atom],
    enclosing: Vec<Option<usize>>,
    comment_ahead: Vec<Option<usize>>,
}

impl<'a> FormIndex<'a> {
    fn new(atoms: &'a [Atom]) -> Self {
        let mut open: Vec<usize> = Vec::new();
        let enclosing = atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                let parent = open.last().copied();
                if atom.is_left_paren() {
                    open.push(i);
                } else if atom.is_right_paren() {
                    open.pop();
                }
                parent
            })
            .collect();

        let mut comment_ahead = vec![None; atoms.len()];
        for i in (0..atoms.len().saturating_sub(1)).rev() {
            let next = &atoms[i + 1];
            if next.line() == atoms[i].line() {
                comment_ahead[i] = if next.is_comment() {
                    Some(i + 1)
                } else {
                    comment_ahead[i + 1]
                };
            }
        }

        Self {
            atoms,
            enclosing,
            comment_ahead,
        }
    }
}

impl FormLookup for FormIndex<'_> {
    fn atoms(&self) -> &[Atom] {
        self.atoms
    }

    fn enclosing(&self, index: usize) -> Option<usize> {
        self.enclosing.get(index).copied().flatten()
    }

    fn comment_ahead(&self, index: usize) -> Option<usize> {
        self.comment_ahead.get(index).copied().flatten()
    }
}

fn parent_root_in(forms: &impl FormLookup, index: usize) -> Option<usize> {
    let paren = forms.enclosing(index)?;
    next_non_comment(forms.atoms(), paren)
}

fn parent_root_of_type(forms: &impl FormLookup, index: usize, names: &[&str]) -> Option<usize> {
    let root = parent_root_in(forms, index)?;
    let symbol = forms.atoms()[root].symbol();
    names
        .iter()
        .any(|name| symbol.eq_ignore_ascii_case(name))
        .then_some(root)
}

fn defun_parent_in(forms: &impl FormLookup, index: usize) -> Option<usize> {
    parent_root_of_type(forms, index, DEFUN_HEADS)
}

fn setq_parent_in(forms: &impl FormLookup, index: usize) -> Option<usize> {
    let root = parent_root_of_type(forms, index, SETQ_HEADS)?;
    let previous = forms.atoms().get(index.checked_sub(1)?)?;
    let valid = !previous.is_quote()
        && (previous.is_primitive() || previous.symbol().eq_ignore_ascii_case("setq"));
    valid.then_some(root)
}

fn export_context_in(forms: &impl FormLookup, source: usize, parent: usize) -> ExportContext {
    let atoms = forms.atoms();
    let ahead = forms.comment_ahead(source);
    let behind = forms
        .enclosing(parent)
        .and_then(|paren| comment_behind_form(atoms, paren));

    let comment_links: SmallVec<[usize; 2]> = ahead.into_iter().chain(behind).collect();
    let exported = comment_links
        .iter()
        .any(|&i| contains_marker(atoms[i].symbol()));
    ExportContext {
        comment_links,
        exported,
    }
}

fn verify_defun_in(forms: &impl FormLookup, index: usize) -> Option<ExportContext> {
    let parent = defun_parent_in(forms, index)?;
    // only the name, not body symbols that happen to share the form
    if next_non_comment(forms.atoms(), parent)? != index {
        return None;
    }
    Some(export_context_in(forms, index, parent))
}

fn verify_setq_in(forms: &impl FormLookup, index: usize) -> Option<ExportContext> {
    let parent = setq_parent_in(forms, index)?;
    Some(export_context_in(forms, index, parent))
}

/// A comment ending on the line right before the `(` at `paren`
fn comment_behind_form(atoms: &[Atom], paren: usize) -> Option<usize> {
    if paren == 0 {
        return None;
    }
    let previous = &atoms[paren - 1];
    (previous.is_comment() && previous.symb_line(true) + 1 == atoms[paren].line())
        .then_some(paren - 1)
}

fn contains_marker(text: &str) -> bool {
    let marker = EXPORT_MARKER.as_bytes();
    text.as_bytes()
        .windows(marker.len())
        .any(|window| window.eq_ignore_ascii_case(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{builtin_keywords, build, parse};

    fn index_of(doc: &Document, symbol: &str) -> usize {
        doc.flatten()
            .iter()
            .position(|atom| atom.symbol() == symbol)
            .unwrap()
    }

    #[test]
    fn test_enclosing_left_paren() {
        let doc = parse("(a (b c) d)");
        let atoms = doc.flatten();
        assert_eq!(enclosing_left_paren(atoms, index_of(&doc, "d")), Some(0));
        assert_eq!(enclosing_left_paren(atoms, index_of(&doc, "c")), Some(2));
        assert_eq!(enclosing_left_paren(atoms, 0), None);
        assert_eq!(parent_root_atom(atoms, index_of(&doc, "c")), Some(3));
    }

    #[test]
    fn test_form_index_matches_backward_scan() {
        let text = ") (a ; note\n (b c) ;| x |; d)\n) e (f (g\n h) i";
        let doc = parse(text);
        let atoms = doc.flatten();
        let forms = FormIndex::new(atoms);
        let scan = Scan(atoms);
        for index in 0..atoms.len() {
            assert_eq!(forms.enclosing(index), scan.enclosing(index), "enclosing {index}");
            assert_eq!(forms.comment_ahead(index), scan.comment_ahead(index), "comment {index}");
        }
    }

    #[test]
    fn test_wide_setq_annotates_every_pair() {
        let pairs: String = (0..2_000).map(|i| format!(" v{i} {i}")).collect();
        let text = format!(";|@Global|;\n(setq{pairs})");
        let doc = parse(&text);
        let flagged = doc
            .flatten()
            .iter()
            .filter(|atom| atom.has_export_flag())
            .count();
        assert_eq!(flagged, 2_000);
    }

    #[test]
    fn test_function_reference_positions() {
        let doc = parse("(foo 'bar (defun baz ()) '(qux))");
        let atoms = doc.flatten();
        assert!(is_possible_function_reference(atoms, index_of(&doc, "foo")));
        assert!(is_possible_function_reference(atoms, index_of(&doc, "bar")));
        assert!(is_possible_function_reference(atoms, index_of(&doc, "baz")));
        assert!(!is_possible_function_reference(atoms, index_of(&doc, "qux")));
    }

    #[test]
    fn test_setq_slots() {
        let doc = parse("(setq a 1 b (foo) c d e 2)");
        let atoms = doc.flatten();
        assert!(setq_parent(atoms, index_of(&doc, "a")).is_some());
        assert!(setq_parent(atoms, index_of(&doc, "b")).is_some());
        assert!(setq_parent(atoms, index_of(&doc, "c")).is_some());
        assert!(setq_parent(atoms, index_of(&doc, "d")).is_none());
        assert!(setq_parent(atoms, index_of(&doc, "foo")).is_none());
    }

    #[test]
    fn test_inline_export_comment() {
        let doc = parse("(setq gVar 1) ; @global\n\n(setq other 2)");
        let atoms = doc.flatten();
        let g = index_of(&doc, "gVar");
        assert!(atoms[g].has_export_flag());
        assert_eq!(atoms[g].comment_links(), &[5]);
        assert!(!atoms[index_of(&doc, "other")].has_export_flag());
    }

    #[test]
    fn test_comment_links_without_marker() {
        let doc = parse(";|Describes foo|;\n(defun foo () 1)");
        let atom = &doc.flatten()[3];
        assert!(!atom.has_export_flag());
        assert_eq!(atom.comment_links(), &[0]);
    }

    #[test]
    fn test_multiline_block_comment_behind() {
        let text = ";|@Global\n  exported helper\n|;\n(defun helper () 1)";
        let doc = parse(text);
        assert!(doc.flatten()[index_of(&doc, "helper")].has_export_flag());
    }

    #[test]
    fn test_body_symbols_not_flagged() {
        let doc = parse(";|@Global|;\n(defun foo (/ x) x)");
        let atoms = doc.flatten();
        let xs: Vec<_> = atoms.iter().filter(|a| a.symbol() == "x").collect();
        assert!(xs.iter().all(|a| !a.has_export_flag()));
        assert!(atoms[index_of(&doc, "foo")].has_export_flag());
    }

    #[test]
    fn test_has_export_context() {
        let text = ";|@Global|;\n(defun foo () (setq bar 1))";
        let doc = build(text, builtin_keywords());
        let atoms = doc.flatten();
        assert!(has_export_context(atoms, index_of(&doc, "foo"), true));
        assert!(!has_export_context(atoms, index_of(&doc, "foo"), false));
        assert!(!has_export_context(atoms, index_of(&doc, "bar"), false));
        assert!(!has_export_context(atoms, 0, false));
    }

    #[test]
    fn test_marker_match_ignores_case() {
        assert!(contains_marker(";|@Global|;"));
        assert!(contains_marker("; exported @GLOBAL"));
        assert!(!contains_marker("; global"));
    }
}
