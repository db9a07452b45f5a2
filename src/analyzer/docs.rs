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

//! Documentation comments
//!
//! Comments linked to a binding by the export annotator may carry
//! `@Desc`, `@Param`, `@Returns` and `@Remarks` tags. Untagged leading text is
//! taken as the description, and untagged lines continue the previous tag.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::{Atom, Position, Range};
use crate::parser::{build, builtin_keywords};

static DOUBLE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s\s").expect("static pattern"));
static DELIMITERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;|]").expect("static pattern"));
static TAG_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@\s*").expect("static pattern"));

/// One documented facet: a tag name and its text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocPair {
    /// `Description`, `Returns`, `Remarks`, or the parameter name for params
    pub name: String,
    /// Accumulated text
    pub value: String,
}

impl DocPair {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Documentation extracted from a comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LispDocs {
    /// `@Desc`, or the first untagged text
    pub description: Option<DocPair>,
    /// `@Param name text` entries in order
    pub params: Vec<DocPair>,
    /// `@Returns`
    pub returns: Option<DocPair>,
    /// `@Remarks`
    pub remarks: Option<DocPair>,
}

impl LispDocs {
    /// Whether nothing was documented
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.params.is_empty()
            && self.returns.is_none()
            && self.remarks.is_none()
    }
}

#[derive(Clone, Copy)]
enum Active {
    Description,
    Param(usize),
    Returns,
    Remarks,
}

fn normalize_comment(text: &str) -> String {
    let text = text.replace('\t', " ");
    let text = DOUBLE_SPACE.replace_all(&text, " ");
    let text = DELIMITERS.replace_all(&text, "");
    let text = TAG_GAP.replace(&text, "@");
    text.trim().to_string()
}

/// Extract documentation from a comment atom; other atoms yield empty docs
pub fn parse_documentation(atom: &Atom) -> LispDocs {
    let mut docs = LispDocs::default();
    if !atom.is_comment() {
        return docs;
    }

    let mut active: Option<Active> = None;
    for raw in atom.symbol().split('\n') {
        let line = normalize_comment(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(space) = line.find(' ').filter(|_| line.starts_with('@')) {
            let tag = line[..space].to_uppercase();
            let content = line[space..].trim();
            active = if tag.starts_with("@REMARK") {
                docs.remarks = Some(DocPair::new("Remarks", content));
                Some(Active::Remarks)
            } else if tag.starts_with("@DESC") {
                docs.description = Some(DocPair::new("Description", content));
                Some(Active::Description)
            } else if tag.starts_with("@RETURN") {
                docs.returns = Some(DocPair::new("Returns", content));
                Some(Active::Returns)
            } else if tag.starts_with("@PARAM") {
                docs.params.push(DocPair::new("Param", content));
                Some(Active::Param(docs.params.len() - 1))
            } else {
                // unknown tags end the previous tag's text
                None
            };
            continue;
        }

        let has_description = docs.description.is_some();
        let target = match active {
            Some(Active::Description) => docs.description.as_mut(),
            Some(Active::Returns) => docs.returns.as_mut(),
            Some(Active::Remarks) => docs.remarks.as_mut(),
            Some(Active::Param(index)) => docs.params.get_mut(index),
            None => None,
        };
        match target {
            Some(pair) => {
                pair.value.push(' ');
                pair.value.push_str(&line);
            }
            None if !has_description => {
                docs.description = Some(DocPair::new("Description", &line));
                active = Some(Active::Description);
            }
            None => {}
        }
    }

    for param in &mut docs.params {
        let value = normalize_comment(&param.value);
        match value.split_once(' ') {
            Some((name, rest)) => {
                param.name = name.to_string();
                param.value = rest.to_string();
            }
            None => {
                param.name = value;
                param.value.clear();
            }
        }
    }
    docs
}

/// Range of `name` on the `@Param name` line of a block comment
pub fn block_comment_param_name_range(atom: &Atom, name: &str) -> Option<Range> {
    if !atom.is_block_comment() {
        return None;
    }
    let pattern = format!(r"(?i)^[\s|]*@PARAM\s+{}\s[\s\S]*$", regex::escape(name));
    let filter = match Regex::new(&pattern) {
        Ok(filter) => filter,
        Err(err) => {
            log::warn!("cannot search @Param for '{name}': {err}");
            return None;
        }
    };

    let lower = name.to_lowercase();
    for (offset, line) in atom.symbol().split('\n').enumerate() {
        let complete = format!("{line}\n");
        if !filter.is_match(&complete) {
            continue;
        }
        // blank the delimiters so the line tokenizes as plain symbols
        let blanked: String = complete
            .chars()
            .map(|c| if c == ';' || c == '|' { ' ' } else { c })
            .collect();
        let parsed = build(&blanked, builtin_keywords());
        let found = parsed
            .flatten()
            .iter()
            .find(|inner| inner.symbol().to_lowercase() == lower)?;
        let column = found.column();
        let line = atom.line() + offset as u32;
        return Some(Range::new(
            Position::new(line, column),
            Position::new(line, column + found.len() as u32),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const DOCUMENTED: &str = ";|\n  @Desc Draws a marker\n    at the picked point\n  @Param pt The insertion point\n  @Param size\n  @Returns nil\n|;";

    #[test]
    fn test_parse_tagged_documentation() {
        let atom = Atom::new(DOCUMENTED, 0, 0, 0);
        let docs = parse_documentation(&atom);
        assert_eq!(
            docs.description,
            Some(DocPair::new("Description", "Draws a marker at the picked point"))
        );
        assert_eq!(docs.params.len(), 2);
        assert_eq!(docs.params[0], DocPair::new("pt", "The insertion point"));
        assert_eq!(docs.params[1], DocPair::new("size", ""));
        assert_eq!(docs.returns, Some(DocPair::new("Returns", "nil")));
        assert!(docs.remarks.is_none());
    }

    #[test]
    fn test_implied_description() {
        let atom = Atom::new("; Computes the total\t length", 0, 0, 0);
        let docs = parse_documentation(&atom);
        assert_eq!(docs.description.unwrap().value, "Computes the total length");
    }

    #[test]
    fn test_unknown_tag_stops_accumulation() {
        let atom = Atom::new(";|@Remarks first\n@Author someone\ntrailing|;", 0, 0, 0);
        let docs = parse_documentation(&atom);
        assert_eq!(docs.remarks.unwrap().value, "first");
        // untagged text after an unknown tag becomes the description
        assert_eq!(docs.description.unwrap().value, "trailing");
    }

    #[test]
    fn test_non_comment_has_no_docs() {
        let docs = parse_documentation(&Atom::new("setq", 0, 0, 0));
        assert!(docs.is_empty());
    }

    #[test]
    fn test_param_name_range() {
        let text = format!("{DOCUMENTED}\n(defun marker (pt size) pt)");
        let doc = parse(&text);
        let comment = &doc.flatten()[0];
        let range = block_comment_param_name_range(comment, "PT").unwrap();
        assert_eq!(
            range,
            Range::new(Position::new(3, 9), Position::new(3, 11))
        );
        assert!(block_comment_param_name_range(comment, "missing").is_none());
        assert!(block_comment_param_name_range(&Atom::new("; @Param pt", 0, 0, 0), "pt").is_none());
    }

    #[test]
    fn test_param_name_range_on_later_line() {
        let atom = Atom::new(";| marker\n  @Param pt the point|;", 2, 4, 0);
        let range = block_comment_param_name_range(&atom, "pt").unwrap();
        assert_eq!(range, Range::new(Position::new(3, 9), Position::new(3, 11)));

        // the opening line starts with `;|` and never holds a tag
        let opening = Atom::new(";|@Param pt the point|;", 2, 4, 0);
        assert!(block_comment_param_name_range(&opening, "pt").is_none());
    }

    #[test]
    fn test_static_patterns_compile() {
        assert!(DOUBLE_SPACE.is_match("a  b"));
        assert!(DELIMITERS.is_match(";|"));
        assert!(TAG_GAP.is_match("@ Param"));
    }
}
