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

//! Error code system for URI parsing (OD0001, OD0002, etc.)
//!
//! Codes are banded by stage: OD0001-OD0049 syntax, OD0050-OD0099 binding,
//! OD0200 and above for internal invariant violations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories for organizing error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Lexer and parser errors (OD0001-OD0049)
    Syntax,
    /// Metadata binding errors (OD0050-OD0099)
    Binding,
    /// Internal invariant violations (OD0200+)
    Internal,
}

/// Error code rendered as `OD0001`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    pub code: u16,
}

impl ErrorCode {
    pub const fn new(code: u16) -> Self {
        Self { code }
    }

    /// Get the full error code string (e.g., "OD0001")
    pub fn code_str(&self) -> String {
        format!("OD{:04}", self.code)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code {
            0..=49 => ErrorCategory::Syntax,
            50..=199 => ErrorCategory::Binding,
            _ => ErrorCategory::Internal,
        }
    }

    /// Short human-readable title for this code
    pub fn title(&self) -> &'static str {
        match self.code {
            1 => "Unexpected character",
            2 => "Unterminated literal",
            3 => "Unexpected token",
            4 => "Recursion depth exceeded",
            5 => "Malformed key predicate",
            6 => "Invalid literal",
            7 => "System token not allowed here",
            8 => "Invalid query option value",
            9 => "Duplicate query option",
            10 => "Unknown system query option",
            11 => "Malformed path",
            51 => "Property not found",
            52 => "Type not found",
            53 => "Incompatible operand types",
            54 => "Filter expression not single value",
            55 => "Query option not applicable",
            56 => "No single function match",
            57 => "Action does not take parameters",
            58 => "Key count mismatch",
            59 => "Open type violation",
            60 => "Non-path in property chain",
            61 => "Invalid type cast",
            62 => "Multiple action overloads",
            63 => "Range variable not in scope",
            64 => "Order-by expression not single value",
            65 => "Invalid segment",
            66 => "Resource not found",
            67 => "Expected collection",
            68 => "Select requires expansion",
            69 => "Not supported",
            70 => "Function not found",
            71 => "Undefined parameter alias",
            72 => "Property access on non-single value",
            200 => "Internal invariant violated",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OD{:04}", self.code)
    }
}

// Syntax errors
pub const OD0001: ErrorCode = ErrorCode::new(1);
pub const OD0002: ErrorCode = ErrorCode::new(2);
pub const OD0003: ErrorCode = ErrorCode::new(3);
pub const OD0004: ErrorCode = ErrorCode::new(4);
pub const OD0005: ErrorCode = ErrorCode::new(5);
pub const OD0006: ErrorCode = ErrorCode::new(6);
pub const OD0007: ErrorCode = ErrorCode::new(7);
pub const OD0008: ErrorCode = ErrorCode::new(8);
pub const OD0009: ErrorCode = ErrorCode::new(9);
pub const OD0010: ErrorCode = ErrorCode::new(10);
pub const OD0011: ErrorCode = ErrorCode::new(11);

// Binding errors
pub const OD0051: ErrorCode = ErrorCode::new(51);
pub const OD0052: ErrorCode = ErrorCode::new(52);
pub const OD0053: ErrorCode = ErrorCode::new(53);
pub const OD0054: ErrorCode = ErrorCode::new(54);
pub const OD0055: ErrorCode = ErrorCode::new(55);
pub const OD0056: ErrorCode = ErrorCode::new(56);
pub const OD0057: ErrorCode = ErrorCode::new(57);
pub const OD0058: ErrorCode = ErrorCode::new(58);
pub const OD0059: ErrorCode = ErrorCode::new(59);
pub const OD0060: ErrorCode = ErrorCode::new(60);
pub const OD0061: ErrorCode = ErrorCode::new(61);
pub const OD0062: ErrorCode = ErrorCode::new(62);
pub const OD0063: ErrorCode = ErrorCode::new(63);
pub const OD0064: ErrorCode = ErrorCode::new(64);
pub const OD0065: ErrorCode = ErrorCode::new(65);
pub const OD0066: ErrorCode = ErrorCode::new(66);
pub const OD0067: ErrorCode = ErrorCode::new(67);
pub const OD0068: ErrorCode = ErrorCode::new(68);
pub const OD0069: ErrorCode = ErrorCode::new(69);
pub const OD0070: ErrorCode = ErrorCode::new(70);
pub const OD0071: ErrorCode = ErrorCode::new(71);
pub const OD0072: ErrorCode = ErrorCode::new(72);

// Internal errors
pub const OD0200: ErrorCode = ErrorCode::new(200);
