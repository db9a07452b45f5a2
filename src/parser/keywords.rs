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

//! Native keyword oracle
//!
//! Symbols that name built-in AutoLISP and Visual LISP functions, operators or
//! constants are never tracked as user symbols. The built-in set is a
//! compile-time perfect hash; externally loaded help indexes extend it.

use once_cell::sync::Lazy;
use phf::phf_set;
use rustc_hash::FxHashSet;
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// Answers whether a lowercased symbol is a language-native keyword
pub trait KeywordOracle: Send + Sync {
    /// `lower_key` must already be lowercased
    fn is_native(&self, lower_key: &str) -> bool;
}

/// Operators common enough to check before the full table
const COMMON_SYMBOLS: [&str; 9] = ["+", "-", "/", "*", "<", ">", "<=", ">=", "/="];

/// Built-in function, operator and constant names
static BUILTIN_NATIVES: phf::Set<&'static str> = phf_set! {
    "*", "+", "-", "/", "/=", "1+", "1-", "<", "<=", "=", ">", ">=", "abs", "acad-pop-dbmod",
    "acad-push-dbmod", "acad_colordlg", "acad_helpdlg", "acad_strlsort", "acdimenableupdate",
    "acet-layerp-mark", "acet-layerp-mode", "acet-laytrans", "acet-ms-to-ps", "acet-ps-to-ms",
    "action_tile", "add_list", "alert", "alloc", "and", "angle", "angtof", "angtos", "append",
    "apply", "arx", "arxload", "arxunload", "ascii", "assoc", "atan", "atof", "atoi", "atom",
    "atoms-family", "autoarxload", "autoload", "boole", "boundp", "caaar", "caadr", "caar",
    "cadar", "cadddr", "caddr", "cadr", "car", "cdaar", "cdadr", "cdar", "cddar", "cdddr",
    "cddr", "cdr", "chr", "client_data_tile", "close", "command", "command-s", "cond", "cons",
    "cos", "cvunit", "defun", "defun-q", "defun-q-list-ref", "defun-q-list-set", "dictadd",
    "dictnext", "dictremove", "dictrename", "dictsearch", "dimx_tile", "dimy_tile", "distance",
    "distof", "done_dialog", "end_image", "end_list", "entdel", "entget", "entlast", "entmake",
    "entmakex", "entmod", "entnext", "entsel", "entupd", "eq", "equal", "eval", "exit", "exp",
    "expand", "expt", "fill_image", "findfile", "findtrustedfile", "fix", "float", "foreach",
    "function", "gc", "gcd", "get_attr", "get_tile", "getangle", "getcfg", "getcname",
    "getcorner", "getdist", "getenv", "getfiled", "getint", "getkword", "getorient", "getpoint",
    "getpropertyvalue", "getreal", "getstring", "getvar", "graphscr", "grclear", "grdraw",
    "grread", "grtext", "grvecs", "handent", "help", "if", "initdia", "initget", "inters",
    "isdwgread", "ismnugrouploaded", "itoa", "lambda", "last", "layoutlist", "length", "list",
    "listp", "load", "load_dialog", "log", "logand", "logior", "lsh", "mapcar", "max", "mem",
    "member", "menucmd", "menugroup", "min", "minusp", "mode_tile", "namedobjdict", "nentsel",
    "nentselp", "new_dialog", "nil", "not", "nth", "null", "numberp", "open", "or", "osnap",
    "pi", "polar", "prin1", "princ", "print", "progn", "prompt", "quit", "quote", "read",
    "read-char", "read-line", "redraw", "regapp", "rem", "repeat", "reverse", "rtos", "set",
    "set_tile", "setcfg", "setenv", "setfunhelp", "setpropertyvalue", "setq", "setvar",
    "setview", "sin", "slide_image", "snvalid", "sqrt", "ssadd", "ssdel", "ssget", "ssgetfirst",
    "sslength", "ssmemb", "ssname", "ssnamex", "sssetfirst", "start_dialog", "start_image",
    "start_list", "startapp", "strcase", "strcat", "strlen", "subst", "substr", "t", "tablet",
    "tblnext", "tblobjname", "tblsearch", "term_dialog", "terpri", "textbox", "textpage",
    "textscr", "trace", "trans", "type", "unload_dialog", "untrace", "vector_image", "ver",
    "vl-acad-defun", "vl-acad-undefun", "vl-arx-import", "vl-bb-ref", "vl-bb-set",
    "vl-catch-all-apply", "vl-catch-all-error-message", "vl-catch-all-error-p", "vl-cmdf",
    "vl-consp", "vl-directory-files", "vl-doc-export", "vl-doc-import", "vl-doc-ref",
    "vl-doc-set", "vl-every", "vl-exit-with-error", "vl-exit-with-value", "vl-file-copy",
    "vl-file-delete", "vl-file-directory-p", "vl-file-rename", "vl-file-size",
    "vl-file-systime", "vl-filename-base", "vl-filename-directory", "vl-filename-extension",
    "vl-filename-mktemp", "vl-get-resource", "vl-list*", "vl-list->string",
    "vl-list-exported-functions", "vl-list-length", "vl-list-loaded-vlx", "vl-load-all",
    "vl-load-com", "vl-load-reactors", "vl-member-if", "vl-member-if-not", "vl-mkdir",
    "vl-position", "vl-prin1-to-string", "vl-princ-to-string", "vl-propagate",
    "vl-registry-delete", "vl-registry-descendents", "vl-registry-read", "vl-registry-write",
    "vl-remove", "vl-remove-if", "vl-remove-if-not", "vl-some", "vl-sort", "vl-sort-i",
    "vl-string->list", "vl-string-elt", "vl-string-left-trim", "vl-string-mismatch",
    "vl-string-position", "vl-string-right-trim", "vl-string-search", "vl-string-subst",
    "vl-string-translate", "vl-string-trim", "vl-symbol-name", "vl-symbol-value", "vl-symbolp",
    "vl-unload-vlx", "vl-vbaload", "vl-vbarun", "vl-vlx-loaded-p", "vlax-3d-point",
    "vlax-add-cmd", "vlax-create-object", "vlax-curve-getarea", "vlax-curve-getclosestpointto",
    "vlax-curve-getdistatparam", "vlax-curve-getdistatpoint", "vlax-curve-getendparam",
    "vlax-curve-getendpoint", "vlax-curve-getparamatdist", "vlax-curve-getparamatpoint",
    "vlax-curve-getpointatdist", "vlax-curve-getpointatparam", "vlax-curve-getstartparam",
    "vlax-curve-getstartpoint", "vlax-curve-isclosed", "vlax-curve-isperiodic",
    "vlax-curve-isplanar", "vlax-dump-object", "vlax-ename->vla-object", "vlax-erased-p",
    "vlax-for", "vlax-get", "vlax-get-acad-object", "vlax-get-object",
    "vlax-get-or-create-object", "vlax-get-property", "vlax-import-type-library", "vlax-invoke",
    "vlax-invoke-method", "vlax-ldata-delete", "vlax-ldata-get", "vlax-ldata-list",
    "vlax-ldata-put", "vlax-ldata-test", "vlax-make-safearray", "vlax-make-variant",
    "vlax-map-collection", "vlax-method-applicable-p", "vlax-object-released-p",
    "vlax-product-key", "vlax-property-available-p", "vlax-put", "vlax-put-property",
    "vlax-read-enabled-p", "vlax-release-object", "vlax-remove-cmd", "vlax-safearray->list",
    "vlax-safearray-fill", "vlax-safearray-get-dim", "vlax-safearray-get-element",
    "vlax-safearray-get-l-bound", "vlax-safearray-get-u-bound", "vlax-safearray-put-element",
    "vlax-safearray-type", "vlax-tmatrix", "vlax-typeinfo-available-p",
    "vlax-variant-change-type", "vlax-variant-type", "vlax-variant-value",
    "vlax-vla-object->ename", "vlax-write-enabled-p", "vlisp-compile", "vlr-acdb-reactor",
    "vlr-add", "vlr-added-p", "vlr-beep-reaction", "vlr-command-reactor",
    "vlr-current-reaction-name", "vlr-data", "vlr-data-set", "vlr-deepclone-reactor",
    "vlr-docmanager-reactor", "vlr-dwg-reactor", "vlr-dxf-reactor", "vlr-editor-reactor",
    "vlr-insert-reactor", "vlr-linker-reactor", "vlr-lisp-reactor", "vlr-miscellaneous-reactor",
    "vlr-mouse-reactor", "vlr-notification", "vlr-object-reactor", "vlr-owner-add",
    "vlr-owner-remove", "vlr-owners", "vlr-pers", "vlr-pers-list", "vlr-pers-p",
    "vlr-pers-release", "vlr-reaction-names", "vlr-reaction-set", "vlr-reactions",
    "vlr-reactors", "vlr-remove", "vlr-remove-all", "vlr-set-notification",
    "vlr-sysvar-reactor", "vlr-toolbar-reactor", "vlr-trace-reaction", "vlr-type", "vlr-types",
    "vlr-undo-reactor", "vlr-wblock-reactor", "vlr-window-reactor", "vlr-xref-reactor",
    "vports", "wcmatch", "while", "write-char", "write-line", "xdroom", "xdsize", "zerop", "~",
};

/// Help index keys whose object members name native symbols
const HELP_INDEX_KEYS: [&str; 3] = ["functions", "ambiguousFunctions", "enumerators"];

/// Help index key holding a plain array of native names
const INTERNAL_FUNCS_KEY: &str = "internalLispFuncs";

/// Native keyword set: the built-in table plus loaded extensions
#[derive(Debug, Clone, Default)]
pub struct NativeKeywords {
    extra: FxHashSet<String>,
    without_builtin: bool,
}

impl NativeKeywords {
    /// Only the built-in table
    pub fn builtin() -> Self {
        Self::default()
    }

    /// No native keywords at all; every non-primitive symbol is tracked
    pub fn empty() -> Self {
        Self {
            extra: FxHashSet::default(),
            without_builtin: true,
        }
    }

    /// Add names, lowercasing them
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra
            .extend(names.into_iter().map(|name| name.as_ref().trim().to_lowercase()));
    }

    /// Add names and return self
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend(names);
        self
    }

    /// Extend from a JSON keyword list
    ///
    /// Accepts a plain array of names, or a help index object whose
    /// `functions`, `ambiguousFunctions` and `enumerators` members are keyed by
    /// name and whose `internalLispFuncs` member is an array of names.
    pub fn load_json_str(&mut self, json: &str) -> ModelResult<usize> {
        let value: JsonValue = serde_json::from_str(json)?;
        let before = self.extra.len();
        match &value {
            JsonValue::Array(items) => self.extend_from_array(items),
            JsonValue::Object(map) => {
                let mut recognized = false;
                for key in HELP_INDEX_KEYS {
                    match map.get(key) {
                        Some(JsonValue::Object(members)) => {
                            recognized = true;
                            self.extend(members.keys());
                        }
                        Some(_) => log::warn!("ignoring non-object '{key}' in keyword list"),
                        None => {}
                    }
                }
                match map.get(INTERNAL_FUNCS_KEY) {
                    Some(JsonValue::Array(items)) => {
                        recognized = true;
                        self.extend_from_array(items);
                    }
                    Some(_) => {
                        log::warn!("ignoring non-array '{INTERNAL_FUNCS_KEY}' in keyword list")
                    }
                    None => {}
                }
                if !recognized {
                    return Err(ModelError::keyword_list(
                        "object has none of the recognized keyword members",
                    ));
                }
            }
            _ => {
                return Err(ModelError::keyword_list(
                    "expected an array of names or a help index object",
                ));
            }
        }
        let added = self.extra.len() - before;
        log::debug!("loaded {added} native keywords");
        Ok(added)
    }

    /// Extend from a JSON keyword list on disk
    pub fn load_json_file(&mut self, path: impl AsRef<Path>) -> ModelResult<usize> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        self.load_json_str(&json)
    }

    /// Built-in table extended from a JSON string
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let mut keywords = Self::builtin();
        keywords.load_json_str(json)?;
        Ok(keywords)
    }

    /// Built-in table extended from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let mut keywords = Self::builtin();
        keywords.load_json_file(path)?;
        Ok(keywords)
    }

    /// Number of names known, built-in ones included
    pub fn len(&self) -> usize {
        let builtin = if self.without_builtin {
            0
        } else {
            BUILTIN_NATIVES.len()
        };
        builtin
            + self
                .extra
                .iter()
                .filter(|name| self.without_builtin || !BUILTIN_NATIVES.contains(name.as_str()))
                .count()
    }

    /// Whether no names are known
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn extend_from_array(&mut self, items: &[JsonValue]) {
        for item in items {
            match item.as_str() {
                Some(name) => {
                    self.extra.insert(name.trim().to_lowercase());
                }
                None => log::warn!("ignoring non-string keyword entry: {item}"),
            }
        }
    }
}

impl KeywordOracle for NativeKeywords {
    #[inline]
    fn is_native(&self, lower_key: &str) -> bool {
        if !self.without_builtin
            && (COMMON_SYMBOLS.iter().any(|common| *common == lower_key)
                || BUILTIN_NATIVES.contains(lower_key))
        {
            return true;
        }
        self.extra.contains(lower_key)
    }
}

static BUILTIN_KEYWORDS: Lazy<NativeKeywords> = Lazy::new(NativeKeywords::builtin);

/// Shared built-in keyword oracle
pub fn builtin_keywords() -> &'static NativeKeywords {
    &BUILTIN_KEYWORDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let keywords = NativeKeywords::builtin();
        for name in [
            "defun", "defun-q", "setq", "lambda", "foreach", "vlax-for", "getpoint", "command", "+",
            "/", "1+",
        ] {
            assert!(keywords.is_native(name), "{name} should be native");
        }
        for name in ["pt", "c:dostuff", "a", "myfunc"] {
            assert!(!keywords.is_native(name), "{name} should not be native");
        }
    }

    #[test]
    fn test_load_plain_array() {
        let mut keywords = NativeKeywords::builtin();
        let added = keywords.load_json_str(r#"["My-Func", "other", 5]"#).unwrap();
        assert_eq!(added, 2);
        assert!(keywords.is_native("my-func"));
        assert!(keywords.is_native("other"));
    }

    #[test]
    fn test_load_help_index() {
        let json = r#"{
            "functions": { "custom-fn": {} },
            "ambiguousFunctions": { "vlax-3d-point": [] },
            "enumerators": { "acred": 1 },
            "internalLispFuncs": ["internal-one"]
        }"#;
        let keywords = NativeKeywords::from_json_str(json).unwrap();
        assert!(keywords.is_native("custom-fn"));
        assert!(keywords.is_native("acred"));
        assert!(keywords.is_native("internal-one"));
    }

    #[test]
    fn test_load_rejects_unknown_shapes() {
        let mut keywords = NativeKeywords::builtin();
        assert!(matches!(
            keywords.load_json_str("42"),
            Err(ModelError::KeywordList { .. })
        ));
        assert!(matches!(
            keywords.load_json_str(r#"{"other": 1}"#),
            Err(ModelError::KeywordList { .. })
        ));
        assert!(matches!(keywords.load_json_str("[1,"), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_empty_oracle() {
        let keywords = NativeKeywords::empty().with_names(["defun"]);
        assert!(keywords.is_native("defun"));
        assert!(!keywords.is_native("setq"));
        assert_eq!(keywords.len(), 1);
    }
}
