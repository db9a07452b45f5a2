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

//! Source model for AutoLISP documents
//!
//! A parsed [`Document`] offers two views over one set of atoms: the dense
//! flat array in document order and the nested [`Container`] tree. Both are
//! produced in a single pass by the tree builder.

pub mod atom;
pub mod container;
pub mod document;
pub mod position;

pub use atom::{Atom, is_number_text, is_primitive_text};
pub use container::{Container, ContainerRef, Fragment, Node};
pub use document::{Document, SymbolTable};
pub use position::{LineFeed, Position, Range};
