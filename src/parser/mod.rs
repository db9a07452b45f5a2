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

//! AutoLISP parser: tree builder and native keyword oracle

pub mod keywords;
pub mod tokenizer;

pub use keywords::{KeywordOracle, NativeKeywords, builtin_keywords};
pub use tokenizer::TreeBuilder;

use crate::analyzer::annotate;
use crate::ast::Document;

/// Parse `text` with the built-in keyword table and annotate export flags
pub fn parse(text: &str) -> Document {
    parse_with(text, builtin_keywords())
}

/// Parse `text` with a custom keyword oracle and annotate export flags
pub fn parse_with(text: &str, oracle: &dyn KeywordOracle) -> Document {
    let mut document = build(text, oracle);
    annotate(&mut document);
    document
}

/// Build the flat array, tree and symbol table without annotating
pub fn build(text: &str, oracle: &dyn KeywordOracle) -> Document {
    TreeBuilder::new(text, oracle).build()
}
