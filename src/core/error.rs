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

//! Error type shared by every stage of URI parsing and binding

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use super::error_code::*;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, ODataError>;

/// Failure while parsing or binding an OData URI.
///
/// `Syntax` and `Binding` are both user-facing "bad request" failures and differ
/// only by stage. `Internal` marks a state the pipeline asserts cannot occur.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ODataError {
    /// Malformed input text
    #[error("{code}: {message}")]
    Syntax {
        code: ErrorCode,
        message: String,
        /// Character offset into the option text, when known
        position: Option<usize>,
    },

    /// Input that is well-formed but does not fit the model
    #[error("{code}: {message}")]
    Binding { code: ErrorCode, message: String },

    /// Logic defect, never caused by input
    #[error("{code}: internal invariant violated: {message}")]
    Internal { code: ErrorCode, message: String },
}

impl ODataError {
    pub fn syntax(code: ErrorCode, message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            code,
            message: message.into(),
            position: Some(position),
        }
    }

    /// Syntax error without a meaningful position (whole option values)
    pub fn syntax_at_unknown(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Syntax {
            code,
            message: message.into(),
            position: None,
        }
    }

    pub fn binding(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Binding {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: OD0200,
            message: message.into(),
        }
    }

    pub fn depth_exceeded(limit: usize, position: usize) -> Self {
        Self::syntax(
            OD0004,
            format!("the query is nested deeper than the limit of {limit}"),
            position,
        )
    }

    pub fn not_supported(what: impl Into<String>) -> Self {
        Self::binding(
            OD0069,
            format!("{} has no textual form", what.into()),
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Syntax { code, .. } | Self::Binding { code, .. } | Self::Internal { code, .. } => {
                *code
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Syntax { message, .. }
            | Self::Binding { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    /// True for errors caused by the request rather than by this crate
    pub fn is_bad_request(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. } => *position,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = ODataError::syntax(OD0002, "unterminated string literal", 7);
        assert_eq!(err.to_string(), "OD0002: unterminated string literal");
        assert_eq!(err.position(), Some(7));
    }

    #[test]
    fn test_internal_is_not_bad_request() {
        assert!(!ODataError::internal("operator table miss").is_bad_request());
        assert!(ODataError::binding(OD0051, "nope").is_bad_request());
    }
}
