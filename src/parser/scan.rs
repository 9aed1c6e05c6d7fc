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

//! Quote- and parenthesis-aware scanning over raw option text

use crate::core::error_code::{OD0002, OD0003, OD0008};
use crate::core::{ODataError, Result};

/// Split `text` on `separator` wherever it appears outside quotes and parentheses.
///
/// Returns each piece together with its byte offset in `text`.
pub fn split_top_level(text: &str, separator: u8) -> Result<Vec<(usize, &str)>> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut quote_start = 0;
    let mut piece_start = 0;

    for (index, &byte) in bytes.iter().enumerate() {
        match byte {
            b'\'' => {
                if !in_quote {
                    quote_start = index;
                }
                in_quote = !in_quote;
            }
            _ if in_quote => {}
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ODataError::syntax(OD0003, format!("unbalanced ')' in '{text}'"), index)
                })?;
            }
            _ if byte == separator && depth == 0 => {
                pieces.push((piece_start, &text[piece_start..index]));
                piece_start = index + 1;
            }
            _ => {}
        }
    }

    if in_quote {
        return Err(ODataError::syntax(
            OD0002,
            format!("unterminated string literal in '{text}'"),
            quote_start,
        ));
    }
    if depth != 0 {
        return Err(ODataError::syntax(
            OD0003,
            format!("unbalanced '(' in '{text}'"),
            text.len(),
        ));
    }
    pieces.push((piece_start, &text[piece_start..]));
    Ok(pieces)
}

/// Index of the `)` matching the `(` at `open`, skipping quoted text
pub fn closing_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    for (index, &byte) in bytes.iter().enumerate().skip(open) {
        match byte {
            b'\'' => in_quote = !in_quote,
            _ if in_quote => {}
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the value of `$top` or `$skip`
pub fn parse_count_option(name: &str, value: &str) -> Result<i64> {
    match value.trim().parse::<i64>() {
        Ok(count) if count >= 0 => Ok(count),
        _ => Err(ODataError::syntax_at_unknown(
            OD0008,
            format!("invalid value '{value}' for {name}: expected a non-negative integer"),
        )),
    }
}
