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

//! Lexical scope tree
//!
//! The tree branches only at localizing forms: `defun`, `defun-q`, `lambda`,
//! `foreach` and `vlax-for`. Ordinary parenthesized forms are flattened into
//! the nearest enclosing host. Hosts and references live in two arenas on the
//! [`ScopeTree`] and point at each other by index.

use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ast::{Atom, Container, ContainerRef, Document, Fragment, Node, Range};
use crate::parser::KeywordOracle;

/// Index of a host in its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(usize);

impl HostId {
    /// Arena index
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a reference in its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(usize);

impl ReferenceId {
    /// Arena index
    pub fn index(self) -> usize {
        self.0
    }
}

/// The form that created a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// The document itself
    Root,
    /// `(defun name (args / locals) ...)`
    Defun,
    /// `(defun-q name (args / locals) ...)`
    DefunQ,
    /// `(lambda (args) ...)`
    Lambda,
    /// `(foreach var list ...)`
    Foreach,
    /// `(vlax-for var collection ...)`
    VlaxFor,
}

impl HostKind {
    /// Kind of host a form with this head symbol creates
    pub fn from_head(symbol: &str) -> Option<Self> {
        const LOCALIZERS: [(&str, HostKind); 5] = [
            ("defun", HostKind::Defun),
            ("defun-q", HostKind::DefunQ),
            ("lambda", HostKind::Lambda),
            ("foreach", HostKind::Foreach),
            ("vlax-for", HostKind::VlaxFor),
        ];
        LOCALIZERS
            .iter()
            .find(|(name, _)| symbol.eq_ignore_ascii_case(name))
            .map(|(_, kind)| *kind)
    }

    /// Function definitions carry a name reference
    pub fn is_named(self) -> bool {
        matches!(self, HostKind::Defun | HostKind::DefunQ)
    }
}

/// An entry of a host, in source order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeItem {
    /// A symbol occurrence
    Reference(ReferenceId),
    /// A nested localizing form
    Host(HostId),
}

/// One named occurrence of a user symbol
#[derive(Debug, Clone)]
pub struct SymbolReference {
    id: String,
    flat_index: usize,
    range: Range,
    is_definition: bool,
    is_localization: bool,
    parent: HostId,
    file_path: Arc<str>,
}

impl SymbolReference {
    /// Lowercased symbol name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Flat index of the atom
    pub fn flat_index(&self) -> usize {
        self.flat_index
    }

    /// Range of the atom
    pub fn range(&self) -> Range {
        self.range
    }

    /// The name of a `defun`/`defun-q`
    pub fn is_definition(&self) -> bool {
        self.is_definition
    }

    /// Declared in a localization header
    pub fn is_localization(&self) -> bool {
        self.is_localization
    }

    /// Owning host; a definition is owned by the host it names
    pub fn parent(&self) -> HostId {
        self.parent
    }

    /// Source file
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl PartialEq for SymbolReference {
    fn eq(&self, other: &Self) -> bool {
        self.file_path == other.file_path && self.flat_index == other.flat_index
    }
}

impl Eq for SymbolReference {}

/// A lexical scope created by one localizing form
#[derive(Debug, Clone)]
pub struct SymbolHost {
    kind: HostKind,
    parent: Option<HostId>,
    items: Vec<ScopeItem>,
    named: Option<ReferenceId>,
    range: Range,
    file_path: Arc<str>,
}

impl SymbolHost {
    /// Form that created the host
    pub fn kind(&self) -> HostKind {
        self.kind
    }

    /// Enclosing host; `None` for the root
    pub fn parent(&self) -> Option<HostId> {
        self.parent
    }

    /// References and nested hosts in source order
    pub fn items(&self) -> &[ScopeItem] {
        &self.items
    }

    /// Name reference of a function definition
    pub fn named(&self) -> Option<ReferenceId> {
        self.named
    }

    /// Range of the form, or of the whole document for the root
    pub fn range(&self) -> Range {
        self.range
    }

    /// Source file
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Whether this is the document root host
    pub fn is_root(&self) -> bool {
        self.kind == HostKind::Root
    }
}

impl PartialEq for SymbolHost {
    fn eq(&self, other: &Self) -> bool {
        self.file_path == other.file_path && self.range == other.range
    }
}

impl Eq for SymbolHost {}

/// Walk state: a container being read into a host
struct Frame<'a> {
    container: &'a Container,
    next: usize,
    host: HostId,
}

/// Scope hosts and symbol references of one document
///
/// References are stored in flat-index order.
#[derive(Debug)]
pub struct ScopeTree {
    file_path: Arc<str>,
    hosts: Vec<SymbolHost>,
    references: Vec<SymbolReference>,
    valid: AtomicBool,
}

impl ScopeTree {
    const ROOT: HostId = HostId(0);

    /// Build the scope tree of `document`
    pub fn build(file_path: &str, document: &Document, oracle: &dyn KeywordOracle) -> Self {
        let file_path: Arc<str> = Arc::from(file_path);
        let root = document.root();
        let mut builder = ScopeBuilder {
            atoms: document.flatten(),
            oracle,
            tree: ScopeTree {
                hosts: vec![SymbolHost {
                    kind: HostKind::Root,
                    parent: None,
                    items: Vec::new(),
                    named: None,
                    range: root.range(),
                    file_path: Arc::clone(&file_path),
                }],
                references: Vec::new(),
                file_path,
                valid: AtomicBool::new(true),
            },
        };
        builder.walk(root.container());
        let tree = builder.tree;
        log::debug!(
            "built scope tree for {}: {} hosts, {} references",
            tree.file_path,
            tree.hosts.len(),
            tree.references.len()
        );
        tree
    }

    /// Source file the tree was built for
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// The document root host
    pub fn root(&self) -> HostId {
        Self::ROOT
    }

    /// Host by id
    pub fn host(&self, id: HostId) -> Option<&SymbolHost> {
        self.hosts.get(id.0)
    }

    /// Reference by id
    pub fn reference(&self, id: ReferenceId) -> Option<&SymbolReference> {
        self.references.get(id.0)
    }

    /// Every host, root first
    pub fn hosts(&self) -> impl Iterator<Item = (HostId, &SymbolHost)> {
        self.hosts.iter().enumerate().map(|(i, host)| (HostId(i), host))
    }

    /// Every reference in flat-index order
    pub fn references(&self) -> impl Iterator<Item = (ReferenceId, &SymbolReference)> {
        self.references
            .iter()
            .enumerate()
            .map(|(i, reference)| (ReferenceId(i), reference))
    }

    /// Number of hosts, root included
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Number of references
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Reference created for the atom at `flat_index`
    pub fn reference_at(&self, flat_index: usize) -> Option<ReferenceId> {
        self.references
            .binary_search_by_key(&flat_index, |reference| reference.flat_index)
            .ok()
            .map(ReferenceId)
    }

    /// Name of a function definition host
    pub fn host_name(&self, id: HostId) -> Option<&str> {
        let named = self.host(id)?.named?;
        self.reference(named).map(SymbolReference::id)
    }

    /// Nearest host, starting at `host`, that localizes `key`
    ///
    /// Walks parent links only, so the cost follows the nesting of localizing
    /// forms. The root ends the walk and is returned when nothing localizes
    /// the key. `key` is matched case-insensitively.
    pub fn find_localizing_parent(&self, host: HostId, key: &str) -> HostId {
        let key = key.to_lowercase();
        let mut current = host;
        loop {
            let Some(record) = self.host(current) else {
                return Self::ROOT;
            };
            if record.is_root() {
                return current;
            }
            let localizes = record.items.iter().any(|item| match item {
                ScopeItem::Reference(id) => {
                    let reference = &self.references[id.0];
                    reference.is_localization && reference.id == key
                }
                ScopeItem::Host(_) => false,
            });
            if localizes {
                return current;
            }
            match record.parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Host that localizes the reference's symbol
    pub fn reference_localizing_parent(&self, id: ReferenceId) -> Option<HostId> {
        let reference = self.reference(id)?;
        Some(self.find_localizing_parent(reference.parent, &reference.id))
    }

    /// Every reference under `host`, grouped by id in first-seen order
    ///
    /// A named host contributes its name reference ahead of its body.
    pub fn collect_all_symbols(&self, host: HostId) -> IndexMap<String, Vec<ReferenceId>> {
        let mut all: IndexMap<String, Vec<ReferenceId>> = IndexMap::new();
        let push = |all: &mut IndexMap<String, Vec<ReferenceId>>, id: ReferenceId| {
            let key = &self.references[id.0].id;
            match all.get_mut(key.as_str()) {
                Some(list) => list.push(id),
                None => {
                    all.insert(key.clone(), vec![id]);
                }
            }
        };

        if self.host(host).is_none() {
            return all;
        }
        let mut stack = vec![(host, 0usize)];
        while let Some((current, next)) = stack.pop() {
            let Some(item) = self.hosts[current.0].items.get(next).copied() else {
                continue;
            };
            stack.push((current, next + 1));
            match item {
                ScopeItem::Reference(id) => push(&mut all, id),
                ScopeItem::Host(child) => {
                    if let Some(named) = self.hosts[child.0].named {
                        push(&mut all, named);
                    }
                    stack.push((child, 0));
                }
            }
        }
        all
    }

    /// Whether the tree is still current; false once disposed
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Mark the tree stale for every holder
    pub fn dispose(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

struct ScopeBuilder<'a> {
    atoms: &'a [Atom],
    oracle: &'a dyn KeywordOracle,
    tree: ScopeTree,
}

impl<'a> ScopeBuilder<'a> {
    fn walk(&mut self, root: &'a Container) {
        let mut stack = vec![Frame {
            container: root,
            next: 0,
            host: ScopeTree::ROOT,
        }];

        while let Some(frame) = stack.last_mut() {
            let (container, next, host) = (frame.container, frame.next, frame.host);
            frame.next += 1;
            let Some(node) = container.items.get(next) else {
                stack.pop();
                continue;
            };
            match node {
                Node::Atom(index) => {
                    if self.is_tracked(*index) {
                        self.add_reference(host, *index, false, false);
                    }
                }
                Node::Container(child) => {
                    let view = ContainerRef::new(self.atoms, child, false);
                    let kind = view
                        .head_atom()
                        .and_then(|head| HostKind::from_head(head.symbol()));
                    match kind {
                        Some(kind) => {
                            let (child_host, body_start) = self.open_host(host, view, kind);
                            stack.push(Frame {
                                container: child,
                                next: body_start,
                                host: child_host,
                            });
                        }
                        None => stack.push(Frame {
                            container: child,
                            next: 0,
                            host,
                        }),
                    }
                }
            }
        }
    }

    /// Create the host for a localizing form; returns it and the item index
    /// where its body starts
    fn open_host(
        &mut self,
        parent: HostId,
        form: ContainerRef<'a>,
        kind: HostKind,
    ) -> (HostId, usize) {
        let id = HostId(self.tree.hosts.len());
        self.tree.hosts.push(SymbolHost {
            kind,
            parent: Some(parent),
            items: Vec::new(),
            named: None,
            range: form.range(),
            file_path: Arc::clone(&self.tree.file_path),
        });
        self.tree.hosts[parent.0].items.push(ScopeItem::Host(id));

        let header_nth = if kind.is_named() {
            if let Some(Fragment::Atom(name)) = form.nth_key_atom(1) {
                let named = self.push_reference(id, name.flat_index(), true, false);
                self.tree.hosts[id.0].named = Some(named);
            }
            2
        } else {
            1
        };

        let Some(header_index) = form.nth_key_index(header_nth) else {
            return (id, form.len());
        };
        match form.item(header_index) {
            Some(Fragment::Atom(atom)) => {
                if self.is_tracked(atom.flat_index()) {
                    self.add_reference(id, atom.flat_index(), false, true);
                }
            }
            Some(Fragment::Container(list)) => {
                for atom in list.items().filter_map(|item| item.as_atom()) {
                    if self.is_tracked(atom.flat_index()) {
                        self.add_reference(id, atom.flat_index(), false, true);
                    }
                }
            }
            None => {}
        }
        (id, header_index + 1)
    }

    fn is_tracked(&self, flat_index: usize) -> bool {
        let atom = &self.atoms[flat_index];
        !atom.is_primitive() && !self.oracle.is_native(&atom.symbol().to_lowercase())
    }

    fn push_reference(
        &mut self,
        parent: HostId,
        flat_index: usize,
        is_definition: bool,
        is_localization: bool,
    ) -> ReferenceId {
        let atom = &self.atoms[flat_index];
        let id = ReferenceId(self.tree.references.len());
        self.tree.references.push(SymbolReference {
            id: atom.symbol().to_lowercase(),
            flat_index,
            range: atom.range(),
            is_definition,
            is_localization,
            parent,
            file_path: Arc::clone(&self.tree.file_path),
        });
        id
    }

    fn add_reference(
        &mut self,
        host: HostId,
        flat_index: usize,
        is_definition: bool,
        is_localization: bool,
    ) {
        let id = self.push_reference(host, flat_index, is_definition, is_localization);
        self.tree.hosts[host.0].items.push(ScopeItem::Reference(id));
    }
}
