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

//! AutoLISP source model
//!
//! Parses AutoLISP text into a flat atom array shared with a nested container
//! tree, indexes user symbols, annotates `@Global` export comments and builds
//! lexical scope trees that a cross-document broker caches.
//!
//! ```
//! use autolisp_model::{ScopeTree, parse};
//!
//! let document = parse("(defun c:hello (/ msg) (setq msg \"hi\") (princ msg))");
//! assert_eq!(document.root().len(), 1);
//!
//! let tree = ScopeTree::build("hello.lsp", &document, autolisp_model::builtin_keywords());
//! assert_eq!(tree.host_count(), 2);
//! ```

#![warn(missing_docs)]

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod parser;
pub mod workspace;

// Re-export main types
pub use analyzer::{HostId, HostKind, LispDocs, ReferenceId, ScopeTree, SymbolHost, SymbolReference};
pub use ast::{Atom, ContainerRef, Document, Fragment, LineFeed, Position, Range};
pub use config::{CacheConfig, KeywordSource, ModelConfig};
pub use error::{ModelError, ModelResult};
pub use parser::{KeywordOracle, NativeKeywords, builtin_keywords, parse, parse_with};
pub use workspace::{BrokerStats, DocumentKind, DocumentPools, LispDocument, SymbolBroker};
