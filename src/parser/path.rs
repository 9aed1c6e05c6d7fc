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

//! Resource path splitting and parenthesized key/parameter parsing

use super::lexer::{ExpressionLexer, LexerMode, TokenKind};
use super::scan::{closing_paren, split_top_level};
use crate::ast::{ParameterAliasToken, QueryToken, ResourceSegmentToken};
use crate::core::error_code::{OD0005, OD0011};
use crate::core::{ODataError, Result};
use percent_encoding::percent_decode_str;
use smallvec::SmallVec;

/// One entry of `(1)` or `(ID=1,Name='x')`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    /// A literal or a parameter alias
    pub value: QueryToken,
}

pub type NamedValues = SmallVec<[NamedValue; 2]>;

/// Split a resource path into segments.
///
/// `/` inside quotes or parentheses does not separate segments. Each segment is
/// percent-decoded after splitting.
pub fn parse_resource_path(path: &str, max_segments: usize) -> Result<Vec<ResourceSegmentToken>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let pieces = split_top_level(trimmed, b'/')?;
    if pieces.len() > max_segments {
        return Err(ODataError::depth_exceeded(max_segments, pieces[max_segments].0));
    }

    let mut segments = Vec::with_capacity(pieces.len());
    for (offset, raw) in pieces {
        let decoded = percent_decode_str(raw).decode_utf8().map_err(|_| {
            ODataError::syntax(OD0011, format!("segment '{raw}' is not valid UTF-8 once decoded"), offset)
        })?;
        segments.push(split_segment(&decoded, offset)?);
    }
    log::trace!("split resource path '{path}' into {} segments", segments.len());
    Ok(segments)
}

fn split_segment(segment: &str, offset: usize) -> Result<ResourceSegmentToken> {
    let malformed = |detail: &str| {
        ODataError::syntax(OD0011, format!("malformed path segment '{segment}': {detail}"), offset)
    };

    let Some(open) = segment.find('(') else {
        if segment.trim().is_empty() {
            return Err(malformed("empty segment"));
        }
        return Ok(ResourceSegmentToken::new(segment, None));
    };
    // A quoted key-as-segment value may legitimately contain '('
    if segment.starts_with('\'') {
        return Ok(ResourceSegmentToken::new(segment, None));
    }

    let close = closing_paren(segment, open).ok_or_else(|| malformed("missing ')'"))?;
    if close + 1 != segment.len() {
        return Err(malformed("text after ')'"));
    }
    let identifier = &segment[..open];
    if identifier.is_empty() {
        return Err(malformed("missing identifier before '('"));
    }
    Ok(ResourceSegmentToken::new(
        identifier,
        Some(segment[open + 1..close].to_string()),
    ))
}

/// Parse the text between a segment's parentheses.
///
/// Either a single positional value or a list of `name=value` pairs; values
/// are literals or parameter aliases. Empty text yields no values.
pub fn parse_named_values(text: &str) -> Result<NamedValues> {
    let mut values = NamedValues::new();
    let mut lexer = ExpressionLexer::new(text, LexerMode::Expression)?;
    if lexer.at_end() {
        return Ok(values);
    }

    loop {
        let name = match *lexer.current_kind() {
            TokenKind::Identifier(name) if lexer.peek_next_token()?.value.kind == TokenKind::Equal => {
                lexer.next_token()?;
                lexer.next_token()?;
                Some(name.to_string())
            }
            _ => None,
        };
        let value = read_value(&mut lexer, text)?;
        values.push(NamedValue { name, value });

        match lexer.current_kind() {
            TokenKind::Comma => {
                lexer.next_token()?;
            }
            TokenKind::End => break,
            _ => return Err(malformed_values(text, lexer.position())),
        }
    }

    let named = values.iter().filter(|v| v.name.is_some()).count();
    if named != 0 && named != values.len() {
        return Err(malformed_values(text, 0));
    }
    if named == 0 && values.len() > 1 {
        return Err(ODataError::syntax(
            OD0005,
            format!("'({text})' has several unnamed values; name each of them"),
            0,
        ));
    }
    Ok(values)
}

fn read_value(lexer: &mut ExpressionLexer<'_>, text: &str) -> Result<QueryToken> {
    let current = lexer.current().clone();
    let value = match current.value.kind {
        TokenKind::Literal(value) => QueryToken::literal(value, current.value.text),
        TokenKind::ParameterAlias(alias) => QueryToken::ParameterAlias(ParameterAliasToken {
            alias: alias.to_string(),
        }),
        _ => return Err(malformed_values(text, current.start)),
    };
    lexer.next_token()?;
    Ok(value)
}

fn malformed_values(text: &str, position: usize) -> ODataError {
    ODataError::syntax(
        OD0005,
        format!("malformed key or parameter list '({text})'"),
        position,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LiteralValue;
    use crate::core::error_code::OD0004;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_split_path() {
        let segments = parse_resource_path("/Customers('A/B')/Orders(ID=1,Line=2)/Amount/", 800).unwrap();
        assert_eq!(
            segments,
            vec![
                ResourceSegmentToken::new("Customers", Some("'A/B'".to_string())),
                ResourceSegmentToken::new("Orders", Some("ID=1,Line=2".to_string())),
                ResourceSegmentToken::new("Amount", None),
            ]
        );
    }

    #[test]
    fn test_empty_parens_are_kept_distinct() {
        let segments = parse_resource_path("Foo()", 800).unwrap();
        assert_eq!(segments[0].parenthesized.as_deref(), Some(""));
    }

    #[test]
    fn test_percent_decoding() {
        let segments = parse_resource_path("Customers('A%20B')", 800).unwrap();
        assert_eq!(segments[0].parenthesized.as_deref(), Some("'A B'"));
    }

    #[rstest]
    #[case("Customers(1)x")]
    #[case("a//b")]
    #[case("(1)")]
    fn test_malformed_paths(#[case] path: &str) {
        assert_eq!(parse_resource_path(path, 800).unwrap_err().code(), OD0011);
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(parse_resource_path("Customers(1", 800).is_err());
    }

    #[test]
    fn test_segment_limit() {
        let path = vec!["A"; 4].join("/");
        assert_eq!(parse_resource_path(&path, 3).unwrap_err().code(), OD0004);
    }

    #[test]
    fn test_named_values() {
        let values = parse_named_values("ID=1, Name='x'").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].name.as_deref(), Some("ID"));
        assert_eq!(values[1].value, QueryToken::literal(LiteralValue::String("x".into()), "'x'"));

        let single = parse_named_values("5L").unwrap();
        assert_eq!(single[0].name, None);
        assert_eq!(single[0].value, QueryToken::literal(LiteralValue::Int64(5), "5L"));

        assert!(parse_named_values("").unwrap().is_empty());
        assert!(matches!(
            parse_named_values("p=@a").unwrap()[0].value,
            QueryToken::ParameterAlias(_)
        ));
    }

    #[rstest]
    #[case("1,2")]
    #[case("ID=1,2")]
    #[case("ID")]
    #[case("ID=1 Name=2")]
    fn test_malformed_named_values(#[case] text: &str) {
        assert_eq!(parse_named_values(text).unwrap_err().code(), OD0005);
    }
}
