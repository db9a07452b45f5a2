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

//! Source analysis: export flags, scope trees and documentation comments

pub mod docs;
pub mod flat;
pub mod scope;

pub use docs::{DocPair, LispDocs, block_comment_param_name_range, parse_documentation};
pub use flat::{
    EXPORT_MARKER, ExportContext, annotate, enclosing_left_paren, has_export_context,
    is_possible_function_reference, parent_root_atom, verify_defun_globalized,
    verify_setq_globalized,
};
pub use scope::{HostId, HostKind, ReferenceId, ScopeItem, ScopeTree, SymbolHost, SymbolReference};
