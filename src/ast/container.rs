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

//! Containers and the borrowed fragment views over them
//!
//! A [`Container`] stores its items as [`Node`]s that index into the owning
//! document's flat atom array. The tree and the flat array therefore share one
//! set of atoms: the tree only records structure. [`ContainerRef`] and
//! [`Fragment`] pair that structure with the atoms to provide navigation.

use std::fmt;
use std::ops::Range as FlatRange;

use super::atom::Atom;
use super::position::{Position, Range};

/// One item of a container
#[derive(Debug, Clone)]
pub enum Node {
    /// An atom, by flat index
    Atom(usize),
    /// A nested parenthesized form
    Container(Container),
}

/// An ordered sequence of items forming one parenthesized form
///
/// The leading `(` (preceded by `'` for quoted forms) and the trailing `)` are
/// ordinary atom items. The document root is a container without parens.
///
/// `Clone`, `Debug` and `Drop` never recurse, so arbitrarily deep nesting is
/// safe. `Debug` prints the span and item count rather than the subtree.
#[derive(Default)]
pub struct Container {
    pub(crate) items: Vec<Node>,
    pub(crate) first: usize,
    pub(crate) end: usize,
}

impl Container {
    pub(crate) fn open(first: usize) -> Self {
        Self {
            items: Vec::new(),
            first,
            end: first,
        }
    }

    /// Raw items of this container
    pub fn nodes(&self) -> &[Node] {
        &self.items
    }

    /// Flat indices of every atom inside this container, nested ones included
    pub fn flat_range(&self) -> FlatRange<usize> {
        self.first..self.end
    }

    fn holds_index(&self, flat_index: usize) -> bool {
        self.first <= flat_index && flat_index < self.end
    }
}

impl Clone for Container {
    fn clone(&self) -> Self {
        let shell = |source: &Container| Container {
            items: Vec::with_capacity(source.items.len()),
            first: source.first,
            end: source.end,
        };
        let mut stack: Vec<(&Container, usize, Container)> = vec![(self, 0, shell(self))];
        let mut cloned = None;
        while let Some((source, next, built)) = stack.last_mut() {
            let source: &Container = *source;
            let position = *next;
            *next += 1;
            match source.items.get(position) {
                Some(Node::Atom(index)) => built.items.push(Node::Atom(*index)),
                Some(Node::Container(child)) => stack.push((child, 0, shell(child))),
                None => {
                    let finished = stack.pop().map(|(_, _, container)| container);
                    match (stack.last_mut(), finished) {
                        (Some((_, _, parent)), Some(done)) => {
                            parent.items.push(Node::Container(done))
                        }
                        (_, done) => cloned = done,
                    }
                }
            }
        }
        cloned.unwrap_or_default()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("first", &self.first)
            .field("end", &self.end)
            .field("items", &self.items.len())
            .finish()
    }
}

impl Drop for Container {
    // Deeply nested input must not overflow the stack on drop
    fn drop(&mut self) {
        let mut pending: Vec<Container> = Vec::new();
        let take_nested = |items: &mut Vec<Node>, pending: &mut Vec<Container>| {
            pending.extend(items.drain(..).filter_map(|node| match node {
                Node::Container(container) => Some(container),
                Node::Atom(_) => None,
            }));
        };
        take_nested(&mut self.items, &mut pending);
        while let Some(mut container) = pending.pop() {
            take_nested(&mut container.items, &mut pending);
        }
    }
}

/// Either an atom or a container, borrowed from a document
#[derive(Debug, Clone, Copy)]
pub enum Fragment<'a> {
    /// A single token
    Atom(&'a Atom),
    /// A parenthesized form
    Container(ContainerRef<'a>),
}

impl<'a> Fragment<'a> {
    /// Zero-based start line
    pub fn line(&self) -> u32 {
        match self {
            Fragment::Atom(atom) => atom.line(),
            Fragment::Container(container) => container.line(),
        }
    }

    /// Zero-based start column
    pub fn column(&self) -> u32 {
        match self {
            Fragment::Atom(atom) => atom.column(),
            Fragment::Container(container) => container.column(),
        }
    }

    /// Flat index of the atom, or of the first atom of the container
    pub fn flat_index(&self) -> usize {
        match self {
            Fragment::Atom(atom) => atom.flat_index(),
            Fragment::Container(container) => container.flat_index(),
        }
    }

    /// Token text for atoms; empty for containers
    pub fn symbol(&self) -> &'a str {
        match self {
            Fragment::Atom(atom) => atom.symbol(),
            Fragment::Container(_) => "",
        }
    }

    /// Start or last line, see [`Atom::symb_line`]
    pub fn symb_line(&self, last: bool) -> u32 {
        match self {
            Fragment::Atom(atom) => atom.symb_line(last),
            Fragment::Container(container) => container.symb_line(last),
        }
    }

    /// Full range of the fragment
    pub fn range(&self) -> Range {
        match self {
            Fragment::Atom(atom) => atom.range(),
            Fragment::Container(container) => container.range(),
        }
    }

    /// Whether the fragment encloses `position`, ends inclusive
    pub fn contains(&self, position: Position) -> bool {
        self.range().contains(position)
    }

    /// Character count of the fragment's tokens, whitespace excluded
    pub fn text_len(&self) -> usize {
        match self {
            Fragment::Atom(atom) => atom.len(),
            Fragment::Container(container) => container.text_len(),
        }
    }

    /// Primitive atoms only; containers are never primitive
    pub fn is_primitive(&self) -> bool {
        matches!(self, Fragment::Atom(atom) if atom.is_primitive())
    }

    /// Comment atoms only
    pub fn is_comment(&self) -> bool {
        matches!(self, Fragment::Atom(atom) if atom.is_comment())
    }

    /// The atom, if this fragment is one
    pub fn as_atom(&self) -> Option<&'a Atom> {
        match self {
            Fragment::Atom(atom) => Some(atom),
            Fragment::Container(_) => None,
        }
    }

    /// The container, if this fragment is one
    pub fn as_container(&self) -> Option<ContainerRef<'a>> {
        match self {
            Fragment::Atom(_) => None,
            Fragment::Container(container) => Some(*container),
        }
    }
}

/// A container paired with the flat atom array it indexes
#[derive(Clone, Copy)]
pub struct ContainerRef<'a> {
    atoms: &'a [Atom],
    container: &'a Container,
    is_root: bool,
}

impl<'a> ContainerRef<'a> {
    pub(crate) fn new(atoms: &'a [Atom], container: &'a Container, is_root: bool) -> Self {
        Self {
            atoms,
            container,
            is_root,
        }
    }

    fn child(&self, container: &'a Container) -> Self {
        Self::new(self.atoms, container, false)
    }

    fn fragment(&self, node: &'a Node) -> Fragment<'a> {
        match node {
            Node::Atom(index) => Fragment::Atom(&self.atoms[*index]),
            Node::Container(container) => Fragment::Container(self.child(container)),
        }
    }

    /// The underlying container
    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// Whether this is the document root
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Items in source order
    pub fn items(&self) -> impl Iterator<Item = Fragment<'a>> + use<'a> {
        let this = *self;
        self.container.items.iter().map(move |node| this.fragment(node))
    }

    /// Item at `index`
    pub fn item(&self, index: usize) -> Option<Fragment<'a>> {
        self.container.items.get(index).map(|node| self.fragment(node))
    }

    /// Nested containers among the direct items
    pub fn child_containers(&self) -> impl Iterator<Item = ContainerRef<'a>> + use<'a> {
        let this = *self;
        self.container.items.iter().filter_map(move |node| match node {
            Node::Container(container) => Some(this.child(container)),
            Node::Atom(_) => None,
        })
    }

    /// Number of direct items
    pub fn len(&self) -> usize {
        self.container.items.len()
    }

    /// Whether the container has no items
    pub fn is_empty(&self) -> bool {
        self.container.items.is_empty()
    }

    /// Every atom of this container in order, nested ones included
    pub fn flatten(&self) -> &'a [Atom] {
        &self.atoms[self.container.flat_range()]
    }

    /// Sum of the atoms' character counts, whitespace excluded
    pub fn text_len(&self) -> usize {
        self.flatten().iter().map(Atom::len).sum()
    }

    /// Flat index of the first atom
    pub fn flat_index(&self) -> usize {
        self.container.first
    }

    /// First atom, at any depth
    pub fn first_atom(&self) -> Option<&'a Atom> {
        self.flatten().first()
    }

    /// Last atom, at any depth
    pub fn last_atom(&self) -> Option<&'a Atom> {
        self.flatten().last()
    }

    /// Start line; the document root always reports 0
    pub fn line(&self) -> u32 {
        if self.is_root {
            return 0;
        }
        self.first_atom().map_or(0, Atom::line)
    }

    /// Start column; the document root always reports 0
    pub fn column(&self) -> u32 {
        if self.is_root {
            return 0;
        }
        self.first_atom().map_or(0, Atom::column)
    }

    /// Start line, or the line the last atom ends on
    pub fn symb_line(&self, last: bool) -> u32 {
        if last {
            self.last_atom().map_or(0, |atom| atom.symb_line(true))
        } else {
            self.line()
        }
    }

    /// From the start of the first atom to the end of the last one
    pub fn range(&self) -> Range {
        match (self.first_atom(), self.last_atom()) {
            (Some(first), Some(last)) => Range::new(first.start(), last.range().end),
            _ => Range::default(),
        }
    }

    /// Whether the container encloses `position`, ends inclusive
    pub fn contains(&self, position: Position) -> bool {
        !self.is_empty() && self.range().contains(position)
    }

    /// Deepest atom enclosing `position`
    pub fn atom_at(&self, position: Position) -> Option<&'a Atom> {
        if !self.contains(position) {
            return None;
        }
        let mut current = *self;
        'descend: loop {
            for item in current.items() {
                if !item.contains(position) {
                    continue;
                }
                match item {
                    Fragment::Atom(atom) => return Some(atom),
                    Fragment::Container(container) => {
                        current = container;
                        continue 'descend;
                    }
                }
            }
            return None;
        }
    }

    /// Deepest nested container enclosing `position`, or its parent when
    /// `parent` is set
    ///
    /// Only nested containers are candidates: a position that no nested
    /// container encloses yields `None`.
    pub fn container_at(&self, position: Position, parent: bool) -> Option<ContainerRef<'a>> {
        if !self.contains(position) {
            return None;
        }
        let mut current = *self;
        let mut enclosing: Option<ContainerRef<'a>> = None;
        loop {
            // later siblings win when ranges touch
            let next = current
                .child_containers()
                .filter(|child| child.contains(position))
                .last();
            match next {
                Some(child) => {
                    enclosing = Some(current);
                    current = child;
                }
                None => break,
            }
        }
        let found = enclosing?;
        if parent { Some(found) } else { Some(current) }
    }

    /// The container directly holding the atom at `flat_index`
    pub fn parent_of_index(&self, flat_index: usize) -> Option<ContainerRef<'a>> {
        if !self.container.holds_index(flat_index) {
            return None;
        }
        let mut current = *self;
        while let Some(child) = current
            .child_containers()
            .find(|child| child.container.holds_index(flat_index))
        {
            current = child;
        }
        Some(current)
    }

    /// The container directly holding `child`
    pub fn parent_of(&self, child: &Fragment<'_>) -> Option<ContainerRef<'a>> {
        let target = match child {
            Fragment::Atom(atom) => return self.parent_of_index(atom.flat_index()),
            Fragment::Container(container) => container.container,
        };
        if target.items.is_empty() || !self.container.holds_index(target.first) {
            return None;
        }
        let mut current = *self;
        loop {
            let next = current
                .child_containers()
                .find(|candidate| candidate.container.holds_index(target.first))?;
            if next.container.first == target.first && next.container.end == target.end {
                return Some(current);
            }
            current = next;
        }
    }

    /// The first meaningful atom: skips the opening glyphs and comments
    pub fn head_atom(&self) -> Option<&'a Atom> {
        let skip = usize::from(!self.is_root);
        for node in self.container.items.iter().skip(skip) {
            match node {
                Node::Atom(index) => {
                    let atom = &self.atoms[*index];
                    if atom.is_comment() || atom.is_left_paren() || atom.is_quote() {
                        continue;
                    }
                    return Some(atom);
                }
                Node::Container(_) => return None,
            }
        }
        None
    }

    /// Lowercased head symbol, or `*primitive*`, `*invalid*` or `*unknown*`
    pub fn type_name(&self) -> String {
        let skip = usize::from(!self.is_root);
        let head = self.container.items.iter().skip(skip).find_map(|node| match node {
            Node::Atom(index) => {
                let atom = &self.atoms[*index];
                let structural = atom.is_comment() || atom.is_left_paren() || atom.is_quote();
                (!structural).then_some(Some(atom))
            }
            Node::Container(_) => Some(None),
        });
        match head {
            Some(Some(atom)) if atom.is_empty() => "*invalid*".to_string(),
            Some(Some(atom)) if atom.is_primitive() => "*primitive*".to_string(),
            Some(Some(atom)) => atom.symbol().to_lowercase(),
            Some(None) => "*invalid*".to_string(),
            None => "*unknown*".to_string(),
        }
    }

    /// The `n`th significant item after the first one
    ///
    /// Comments and the `'`, `(`, `)`, `.` glyphs are skipped. For a form such
    /// as `(defun name (args) ...)`, `n = 0` is `defun`, `1` is `name` and `2`
    /// the argument list.
    pub fn nth_key_atom(&self, n: usize) -> Option<Fragment<'a>> {
        self.nth_key_index(n).and_then(|index| self.item(index))
    }

    /// Item index of [`nth_key_atom`](Self::nth_key_atom)
    pub fn nth_key_index(&self, n: usize) -> Option<usize> {
        self.items()
            .enumerate()
            .skip(1)
            .filter(|(_, item)| match item {
                Fragment::Atom(atom) => {
                    !atom.is_comment()
                        && !matches!(atom.symbol(), "'" | "(" | ")" | ".")
                        && !atom.symbol().trim().is_empty()
                }
                Fragment::Container(_) => true,
            })
            .nth(n)
            .map(|(index, _)| index)
    }

    /// Containers whose head atom satisfies `predicate`, in source order
    ///
    /// When `recursive` is false the search does not descend into a matching
    /// container; non-matching containers are always searched.
    pub fn find_children<P>(&self, mut predicate: P, recursive: bool) -> Vec<ContainerRef<'a>>
    where
        P: FnMut(&Atom) -> bool,
    {
        let mut result = Vec::new();
        let mut pending: Vec<ContainerRef<'a>> = Vec::new();

        let push_children = |pending: &mut Vec<ContainerRef<'a>>, parent: &ContainerRef<'a>| {
            let start = pending.len();
            pending.extend(parent.child_containers());
            pending[start..].reverse();
        };

        if self.is_root {
            push_children(&mut pending, self);
        } else {
            pending.push(*self);
        }

        while let Some(current) = pending.pop() {
            let matched = current.head_atom().is_some_and(&mut predicate);
            if matched {
                result.push(current);
                if !recursive {
                    continue;
                }
            }
            push_children(&mut pending, &current);
        }
        result
    }
}

impl fmt::Debug for ContainerRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRef")
            .field("flat_range", &self.container.flat_range())
            .field("items", &self.container.items.len())
            .field("is_root", &self.is_root)
            .finish()
    }
}

impl PartialEq for ContainerRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.container, other.container)
    }
}
