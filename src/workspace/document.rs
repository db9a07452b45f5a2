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

//! Workspace documents and the pools they are tracked in

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::sync::Arc;

use crate::ast::Document;
use crate::error::{ModelError, ModelResult};
use crate::parser::{KeywordOracle, builtin_keywords, parse_with};

/// Replace backslashes so Windows and POSIX spellings share one cache key
pub fn normalize_file_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Document type, by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// `.lsp` or `.mnl`
    Lisp,
    /// `.prj` project file
    Project,
    /// `.dcl` dialog definition
    Dialog,
    /// Anything else
    Other,
}

impl DocumentKind {
    /// Classify a path by its extension, ignoring case
    pub fn from_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("lsp" | "mnl") => DocumentKind::Lisp,
            Some("prj") => DocumentKind::Project,
            Some("dcl") => DocumentKind::Dialog,
            _ => DocumentKind::Other,
        }
    }
}

/// A source file with its parsed model
#[derive(Debug, Clone)]
pub struct LispDocument {
    file_name: String,
    kind: DocumentKind,
    text: String,
    model: Document,
}

impl LispDocument {
    /// Parse `text` with the built-in keyword table
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_oracle(file_name, text, builtin_keywords())
    }

    /// Parse `text` with a custom keyword oracle
    pub fn with_oracle(
        file_name: impl Into<String>,
        text: impl Into<String>,
        oracle: &dyn KeywordOracle,
    ) -> Self {
        let file_name = file_name.into();
        let text = text.into();
        let model = parse_with(&text, oracle);
        Self {
            kind: DocumentKind::from_path(&file_name),
            file_name,
            text,
            model,
        }
    }

    /// Read and parse a file with the built-in keyword table
    pub fn open(path: impl AsRef<Path>) -> ModelResult<Self> {
        Self::open_with(path, builtin_keywords())
    }

    /// Read and parse a file with a custom keyword oracle
    pub fn open_with(path: impl AsRef<Path>, oracle: &dyn KeywordOracle) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        Ok(Self::with_oracle(path.to_string_lossy(), text, oracle))
    }

    /// Replace the text and reparse it
    pub fn update_text(&mut self, text: impl Into<String>, oracle: &dyn KeywordOracle) {
        self.text = text.into();
        self.model = parse_with(&self.text, oracle);
    }

    /// Path as given
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Path with forward slashes
    pub fn normalized_path(&self) -> String {
        normalize_file_path(&self.file_name)
    }

    /// Document type
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Whether this is an AutoLISP source file
    pub fn is_lisp(&self) -> bool {
        self.kind == DocumentKind::Lisp
    }

    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed model
    pub fn model(&self) -> &Document {
        &self.model
    }

    /// Whether the raw symbol table records `lower_key`
    pub fn has_symbol(&self, lower_key: &str) -> bool {
        self.model.symbol_table().contains_key(lower_key)
    }
}

/// Documents known to the workspace, in three pools
///
/// A document may sit in several pools at once: open in an editor, a member
/// of a project and part of the workspace folder.
#[derive(Debug, Clone, Default)]
pub struct DocumentPools {
    opened: IndexMap<String, Arc<LispDocument>>,
    project: IndexMap<String, Arc<LispDocument>>,
    workspace: IndexMap<String, Arc<LispDocument>>,
}

impl DocumentPools {
    /// Create empty pools
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an open document, replacing an earlier version
    pub fn add_opened(&mut self, document: Arc<LispDocument>) {
        self.opened.insert(document.normalized_path(), document);
    }

    /// Track a project member
    pub fn add_project(&mut self, document: Arc<LispDocument>) {
        self.project.insert(document.normalized_path(), document);
    }

    /// Track a workspace file
    pub fn add_workspace(&mut self, document: Arc<LispDocument>) {
        self.workspace.insert(document.normalized_path(), document);
    }

    /// Stop tracking an open document
    pub fn close(&mut self, path: &str) -> Option<Arc<LispDocument>> {
        self.opened.shift_remove(&normalize_file_path(path))
    }

    /// Look a document up by path, open documents first
    pub fn get(&self, path: &str) -> Option<Arc<LispDocument>> {
        let key = normalize_file_path(path);
        self.pools()
            .find_map(|pool| pool.get(&key))
            .map(Arc::clone)
    }

    /// Open documents
    pub fn opened(&self) -> impl Iterator<Item = &Arc<LispDocument>> {
        self.opened.values()
    }

    /// Project members
    pub fn project(&self) -> impl Iterator<Item = &Arc<LispDocument>> {
        self.project.values()
    }

    /// Workspace files
    pub fn workspace(&self) -> impl Iterator<Item = &Arc<LispDocument>> {
        self.workspace.values()
    }

    /// Documents whose symbol table records `id`
    ///
    /// Searches open, then project, then workspace documents; each path is
    /// reported once, from the first pool it appears in.
    pub fn find_documents_sharing_identifier(&self, id: &str) -> Vec<Arc<LispDocument>> {
        let key = id.to_lowercase();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut found = Vec::new();
        for pool in self.pools() {
            for (path, document) in pool {
                if document.has_symbol(&key) && seen.insert(path.as_str()) {
                    found.push(Arc::clone(document));
                }
            }
        }
        found
    }

    fn pools(&self) -> impl Iterator<Item = &IndexMap<String, Arc<LispDocument>>> {
        [&self.opened, &self.project, &self.workspace].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, text: &str) -> Arc<LispDocument> {
        Arc::new(LispDocument::new(path, text))
    }

    #[test]
    fn test_document_kind() {
        assert_eq!(DocumentKind::from_path("c:/a/B.LSP"), DocumentKind::Lisp);
        assert_eq!(DocumentKind::from_path("menu.mnl"), DocumentKind::Lisp);
        assert_eq!(DocumentKind::from_path("x.prj"), DocumentKind::Project);
        assert_eq!(DocumentKind::from_path("C:\\ui\\dialog.dcl"), DocumentKind::Dialog);
        assert_eq!(DocumentKind::from_path("notes.txt"), DocumentKind::Other);
        assert_eq!(DocumentKind::from_path("noext"), DocumentKind::Other);
    }

    #[test]
    fn test_normalize_file_path() {
        assert_eq!(normalize_file_path("C:\\work\\a.lsp"), "C:/work/a.lsp");
        assert_eq!(normalize_file_path("/tmp/a.lsp"), "/tmp/a.lsp");
    }

    #[test]
    fn test_find_documents_sharing_identifier() {
        let mut pools = DocumentPools::new();
        pools.add_workspace(doc("c:/w/one.lsp", "(setq shared 1)"));
        pools.add_project(doc("c:/w/two.lsp", "(princ Shared)"));
        pools.add_opened(doc("c:\\w\\one.lsp", "(setq shared 2)"));
        pools.add_workspace(doc("c:/w/three.lsp", "(setq other 3)"));

        let found = pools.find_documents_sharing_identifier("SHARED");
        let paths: Vec<_> = found.iter().map(|d| d.normalized_path()).collect();
        assert_eq!(paths, vec!["c:/w/one.lsp", "c:/w/two.lsp"]);
        assert_eq!(found[0].text(), "(setq shared 2)");

        assert!(pools.find_documents_sharing_identifier("missing").is_empty());
    }

    #[test]
    fn test_get_prefers_open_documents() {
        let mut pools = DocumentPools::new();
        pools.add_workspace(doc("c:/w/a.lsp", "(setq a 1)"));
        pools.add_opened(doc("c:/w/a.lsp", "(setq a 2)"));
        assert_eq!(pools.get("c:\\w\\a.lsp").unwrap().text(), "(setq a 2)");
        assert!(pools.close("c:/w/a.lsp").is_some());
        assert_eq!(pools.get("c:/w/a.lsp").unwrap().text(), "(setq a 1)");
    }

    #[test]
    fn test_update_text() {
        let mut document = LispDocument::new("a.lsp", "(setq a 1)");
        assert!(document.has_symbol("a"));
        document.update_text("(setq b 1)", builtin_keywords());
        assert!(!document.has_symbol("a"));
        assert!(document.has_symbol("b"));
    }
}
