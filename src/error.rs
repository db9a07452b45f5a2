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

//! Error types for the AutoLISP source model
//!
//! Parsing, annotation and scope analysis are total over arbitrary input and
//! never fail. Errors only surface from the ambient operations around them:
//! reading documents from disk and loading keyword lists or configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for fallible model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Main error type for model operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Reading a file from disk failed
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        /// Path of the file that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A keyword list did not have a recognized shape
    #[error("Invalid keyword list: {message}")]
    KeywordList {
        /// Error message describing the problem
        message: String,
    },

    /// Configuration was rejected
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message describing the problem
        message: String,
    },

    /// JSON input could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a keyword list error
    pub fn keyword_list(message: impl Into<String>) -> Self {
        Self::KeywordList {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ModelError::keyword_list("expected an array or object");
        assert_eq!(
            err.to_string(),
            "Invalid keyword list: expected an array or object"
        );

        let err = ModelError::io(
            "missing/file.lsp",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("missing/file.lsp"));
    }

    #[test]
    fn test_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ModelError = parse_err.into();
        assert!(matches!(err, ModelError::Json(_)));
    }
}
