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

//! Integration tests for the tokenizer, tree builder and source model

use autolisp_model::{Fragment, LineFeed, NativeKeywords, Position, parse, parse_with};
use pretty_assertions::assert_eq;
use rstest::rstest;

const DO_STUFF: &str = "(defun C:DoStuff (/ pt)\n\t(setq pt (getpoint))\n\t(command \".point\" pt)\n\t)";

const MULTI_BINDING: &str =
    "(defun A (/ pt)\n\t(defun b (C) (+ C 1))\n\t(setq pt (getpoint))\n\t(command \".point\" pt)\n\t)";

#[test]
fn test_single_root_form_has_seven_items() {
    let doc = parse(DO_STUFF);
    assert_eq!(doc.root().len(), 1);

    let form = doc.root().item(0).and_then(|f| f.as_container()).unwrap();
    let symbols: Vec<&str> = form.items().map(|f| f.symbol()).collect();
    // nested containers have no token text of their own
    assert_eq!(symbols, vec!["(", "defun", "C:DoStuff", "", "", "", ")"]);
    assert_eq!(form.len(), 7);
    assert_eq!(form.type_name(), "defun");
}

#[test]
fn test_symbol_table_keys() {
    let doc = parse(MULTI_BINDING);
    let mut keys: Vec<&str> = doc.symbol_table().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["a", "b", "c", "pt"]);
    assert_eq!(doc.occurrences("pt").len(), 3);
    assert_eq!(doc.occurrences("C").len(), 2);
}

#[test]
fn test_flat_indices_are_dense() {
    let doc = parse(MULTI_BINDING);
    for (position, atom) in doc.flatten().iter().enumerate() {
        assert_eq!(atom.flat_index(), position);
    }
    let root = doc.root();
    assert_eq!(root.flatten().len(), doc.len());
    for container in doc.find_children(|_| true, true) {
        let first = container.flat_index();
        assert_eq!(container.flatten(), &doc.flatten()[first..first + container.flatten().len()]);
    }
}

#[rstest]
#[case("(setq a 1)\n(setq b 2)", LineFeed::Lf)]
#[case("(setq a 1)\r\n(setq b 2)", LineFeed::CrLf)]
#[case("(setq a 1)", LineFeed::Lf)]
#[case("", LineFeed::Lf)]
fn test_linefeed_detection(#[case] text: &str, #[case] expected: LineFeed) {
    assert_eq!(parse(text).linefeed(), expected);
}

#[rstest]
#[case("(foo \"unterminated")]
#[case("(foo ;| never closed")]
#[case("(((a")]
#[case(")) (b))")]
#[case("")]
#[case("   \n\t  ")]
fn test_malformed_input_never_fails(#[case] text: &str) {
    let doc = parse(text);
    for (position, atom) in doc.flatten().iter().enumerate() {
        assert_eq!(atom.flat_index(), position);
    }
    assert_eq!(doc.root().flatten().len(), doc.len());
}

#[test]
fn test_unterminated_string_runs_to_end() {
    let doc = parse("(princ \"open\n(setq x 1)");
    let last = doc.flatten().last().unwrap();
    assert_eq!(last.symbol(), "\"open\n(setq x 1)");
    assert!(last.is_string());
    assert!(doc.symbol_table().is_empty());
}

#[test]
fn test_round_trip_preserves_layout() {
    let text = "(defun c:demo (/ lst)\n  ;| layered\n     block |;\n  (setq lst '(1 2 3)) ; inline\n  (foreach x lst (princ x))\n)";
    assert_eq!(parse(text).to_text(), text);
}

#[test]
fn test_position_queries() {
    let doc = parse(DO_STUFF);
    let atom = doc.atom_at(Position::new(1, 8)).unwrap();
    assert_eq!(atom.symbol(), "pt");

    let setq = doc.container_at(Position::new(1, 8), false).unwrap();
    assert_eq!(setq.type_name(), "setq");
    let defun = doc.container_at(Position::new(1, 8), true).unwrap();
    assert_eq!(defun.type_name(), "defun");

    assert!(doc.atom_at(Position::new(40, 0)).is_none());
}

#[test]
fn test_parent_navigation() {
    let doc = parse(DO_STUFF);
    let pt = doc.atom(doc.occurrences("pt")[1]).unwrap();
    let parent = doc.parent_of(&Fragment::Atom(pt)).unwrap();
    assert_eq!(parent.type_name(), "setq");
    let grandparent = doc.parent_of(&Fragment::Container(parent)).unwrap();
    assert_eq!(grandparent.type_name(), "defun");
    let top = doc.parent_of(&Fragment::Container(grandparent)).unwrap();
    assert!(top.is_root());
}

#[test]
fn test_find_children_by_head() {
    let doc = parse(MULTI_BINDING);
    let defuns = doc.find_children(|head| head.symbol().eq_ignore_ascii_case("defun"), true);
    assert_eq!(defuns.len(), 2);
    let top_only = doc.find_children(|head| head.symbol().eq_ignore_ascii_case("defun"), false);
    assert_eq!(top_only.len(), 1);
}

#[test]
fn test_custom_keywords_exclude_symbols() {
    let keywords = NativeKeywords::builtin().with_names(["getpoint"]);
    let doc = parse_with("(setq p (getpoint) q (mystery))", &keywords);
    let mut keys: Vec<&str> = doc.symbol_table().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["mystery", "p", "q"]);
}

#[test]
fn test_deep_nesting_is_iterative() {
    let depth = 50_000;
    let mut text = "(".repeat(depth);
    text.push_str("leaf");
    text.push_str(&")".repeat(depth));

    let doc = parse(&text);
    assert_eq!(doc.len(), depth * 2 + 1);
    assert_eq!(doc.root().len(), 1);
    assert_eq!(doc.occurrences("leaf"), &[depth]);

    // column `depth` is also the inclusive end of the innermost `(`
    let boundary = doc.atom_at(Position::new(0, depth as u32)).unwrap();
    assert_eq!(boundary.symbol(), "(");
    let leaf = doc.atom_at(Position::new(0, depth as u32 + 1)).unwrap();
    assert_eq!(leaf.symbol(), "leaf");

    let copy = doc.clone();
    drop(doc);
    assert_eq!(copy.root().len(), 1);
    assert_eq!(copy.to_text(), text);
}
