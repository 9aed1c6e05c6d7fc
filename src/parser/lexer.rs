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

//! Lexical analysis for OData expressions and select/expand paths
//!
//! The lexer produces one token at a time. The parser sees the current token
//! and may peek exactly one token ahead.

use super::span::Spanned;
use crate::ast::LiteralValue;
use crate::core::error_code::{OD0001, OD0002, OD0003, OD0006};
use crate::core::{ODataError, Result};
use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Check if a character can start an identifier
pub fn is_identifier_start(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_start(c) || c == '_'
}

/// Check if a character can continue an identifier
pub fn is_identifier_continue(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_continue(c)
}

/// Which grammar the lexer is serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    /// `$filter`, `$orderby`, key predicates, function arguments
    Expression,
    /// `$select`/`$expand` term lists, where `*` is a segment
    SelectExpandPath,
}

/// Kind of a lexed token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'input> {
    Identifier(&'input str),
    /// `@name`
    ParameterAlias(&'input str),
    Literal(LiteralValue),
    OpenParen,
    CloseParen,
    Comma,
    Colon,
    Slash,
    Dot,
    Star,
    Equal,
    Semicolon,
    Minus,
    End,
}

impl TokenKind<'_> {
    pub fn describe(&self) -> String {
        match self {
            Self::Identifier(text) => format!("identifier '{text}'"),
            Self::ParameterAlias(text) => format!("parameter alias '{text}'"),
            Self::Literal(value) => format!("literal {value}"),
            Self::OpenParen => "'('".to_string(),
            Self::CloseParen => "')'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Colon => "':'".to_string(),
            Self::Slash => "'/'".to_string(),
            Self::Dot => "'.'".to_string(),
            Self::Star => "'*'".to_string(),
            Self::Equal => "'='".to_string(),
            Self::Semicolon => "';'".to_string(),
            Self::Minus => "'-'".to_string(),
            Self::End => "end of input".to_string(),
        }
    }
}

/// Token with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionToken<'input> {
    pub kind: TokenKind<'input>,
    pub text: &'input str,
}

/// Literal keywords
static LITERAL_KEYWORDS: Lazy<FxHashMap<&'static str, LiteralValue>> = Lazy::new(|| {
    let mut table = FxHashMap::default();
    table.insert("null", LiteralValue::Null);
    table.insert("true", LiteralValue::Boolean(true));
    table.insert("false", LiteralValue::Boolean(false));
    table.insert("INF", LiteralValue::Double(f64::INFINITY));
    table.insert("NaN", LiteralValue::Double(f64::NAN));
    table
});

/// Prefixes of quoted typed literals, e.g. `guid'...'`
const TYPED_LITERAL_PREFIXES: [&str; 7] = [
    "datetime",
    "datetimeoffset",
    "time",
    "guid",
    "binary",
    "X",
    "x",
];

/// Lexer over a single query option value
#[derive(Debug, Clone)]
pub struct ExpressionLexer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    mode: LexerMode,
    /// Offset just past the current token
    pos: usize,
    current: Spanned<ExpressionToken<'input>>,
}

impl<'input> ExpressionLexer<'input> {
    /// Create a lexer positioned on the first token
    pub fn new(input: &'input str, mode: LexerMode) -> Result<Self> {
        let mut lexer = Self {
            input,
            bytes: input.as_bytes(),
            mode,
            pos: 0,
            current: Spanned::new(
                ExpressionToken {
                    kind: TokenKind::End,
                    text: "",
                },
                0,
                0,
            ),
        };
        lexer.next_token()?;
        Ok(lexer)
    }

    pub fn input(&self) -> &'input str {
        self.input
    }

    pub fn current(&self) -> &Spanned<ExpressionToken<'input>> {
        &self.current
    }

    pub fn current_kind(&self) -> &TokenKind<'input> {
        &self.current.value.kind
    }

    pub fn position(&self) -> usize {
        self.current.start
    }

    /// Advance to the next token
    pub fn next_token(&mut self) -> Result<&Spanned<ExpressionToken<'input>>> {
        self.current = self.scan(self.pos)?;
        self.pos = self.current.end;
        log::trace!("lexed {:?} at {}", self.current.value.kind, self.current.start);
        Ok(&self.current)
    }

    /// Resume lexing at `offset`, discarding the current token
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        self.pos = offset.min(self.input.len());
        self.next_token()?;
        Ok(())
    }

    /// Look at the token after the current one without consuming anything
    pub fn peek_next_token(&self) -> Result<Spanned<ExpressionToken<'input>>> {
        self.scan(self.pos)
    }

    pub fn is_identifier(&self, keyword: &str) -> bool {
        matches!(self.current.value.kind, TokenKind::Identifier(text) if text == keyword)
    }

    pub fn at_end(&self) -> bool {
        self.current.value.kind == TokenKind::End
    }

    /// Current identifier is immediately followed by `(`
    pub fn is_function_call_start(&self) -> bool {
        matches!(self.current.value.kind, TokenKind::Identifier(_))
            && self.bytes.get(self.current.end) == Some(&b'(')
    }

    /// Current identifier is immediately followed by `.`
    pub fn is_dotted_identifier_start(&self) -> bool {
        matches!(self.current.value.kind, TokenKind::Identifier(_))
            && self.bytes.get(self.current.end) == Some(&b'.')
    }

    /// Fail unless the current token has the given kind, then advance
    pub fn expect(&mut self, kind: TokenKind<'static>) -> Result<()> {
        if self.current.value.kind != kind {
            return Err(self.unexpected(&kind.describe()));
        }
        self.next_token()?;
        Ok(())
    }

    /// Consume an identifier and return its text
    pub fn read_identifier(&mut self) -> Result<&'input str> {
        match self.current.value.kind {
            TokenKind::Identifier(text) => {
                self.next_token()?;
                Ok(text)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// Consume `a.b.c` (and a trailing `.*` when `accept_star` is set)
    pub fn read_dotted_identifier(&mut self, accept_star: bool) -> Result<&'input str> {
        let start = self.current.start;
        let mut end = match self.current.value.kind {
            TokenKind::Identifier(_) => self.current.end,
            TokenKind::Star if accept_star => {
                self.next_token()?;
                return Ok("*");
            }
            _ => return Err(self.unexpected("an identifier")),
        };
        while self.bytes.get(end) == Some(&b'.') {
            let after = self.scan(end + 1)?;
            if !after.starts_at(end + 1) {
                break;
            }
            match after.value.kind {
                TokenKind::Identifier(_) => end = after.end,
                TokenKind::Star if accept_star => {
                    end = after.end;
                    break;
                }
                _ => break,
            }
        }
        self.pos = end;
        self.next_token()?;
        Ok(&self.input[start..end])
    }

    /// Build an "unexpected token" error at the current token
    pub fn unexpected(&self, expected: &str) -> ODataError {
        ODataError::syntax(
            OD0003,
            format!(
                "expected {expected} but found {} at position {} in '{}'",
                self.current.value.kind.describe(),
                self.current.start,
                self.input
            ),
            self.current.start,
        )
    }

    fn skip_whitespace(&self, mut pos: usize) -> usize {
        while pos < self.bytes.len() && self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    }

    fn token(&self, kind: TokenKind<'input>, start: usize, end: usize) -> Spanned<ExpressionToken<'input>> {
        Spanned::new(
            ExpressionToken {
                kind,
                text: &self.input[start..end],
            },
            start,
            end,
        )
    }

    /// Scan one token starting at `from`
    fn scan(&self, from: usize) -> Result<Spanned<ExpressionToken<'input>>> {
        let start = self.skip_whitespace(from);
        let Some(&byte) = self.bytes.get(start) else {
            return Ok(self.token(TokenKind::End, start, start));
        };

        let single = |kind| Ok(self.token(kind, start, start + 1));
        match byte {
            b'(' => single(TokenKind::OpenParen),
            b')' => single(TokenKind::CloseParen),
            b',' => single(TokenKind::Comma),
            b':' => single(TokenKind::Colon),
            b'/' => single(TokenKind::Slash),
            b'.' => single(TokenKind::Dot),
            b'=' => single(TokenKind::Equal),
            b';' => single(TokenKind::Semicolon),
            b'*' if self.mode == LexerMode::SelectExpandPath => single(TokenKind::Star),
            b'\'' => {
                let (value, end) = self.scan_quoted(start)?;
                Ok(self.token(TokenKind::Literal(LiteralValue::String(value)), start, end))
            }
            b'-' => match self.bytes.get(start + 1) {
                Some(next) if next.is_ascii_digit() => self.scan_number(start),
                _ if self.input[start + 1..].starts_with("INF") => {
                    Ok(self.token(TokenKind::Literal(LiteralValue::Double(f64::NEG_INFINITY)), start, start + 4))
                }
                _ => single(TokenKind::Minus),
            },
            b'0'..=b'9' => self.scan_number(start),
            b'@' => {
                let end = self.scan_identifier_end(start + 1);
                if end == start + 1 {
                    return Err(self.unexpected_char(start));
                }
                Ok(self.token(TokenKind::ParameterAlias(&self.input[start..end]), start, end))
            }
            _ => {
                let identifier_start = if byte == b'$' { start + 1 } else { start };
                let end = self.scan_identifier_end(identifier_start);
                if end == identifier_start {
                    return Err(self.unexpected_char(start));
                }
                let text = &self.input[start..end];
                if self.bytes.get(end) == Some(&b'\'') && TYPED_LITERAL_PREFIXES.contains(&text) {
                    return self.scan_typed_literal(text, start, end);
                }
                if let Some(value) = LITERAL_KEYWORDS.get(text) {
                    return Ok(self.token(TokenKind::Literal(value.clone()), start, end));
                }
                Ok(self.token(TokenKind::Identifier(text), start, end))
            }
        }
    }

    fn unexpected_char(&self, at: usize) -> ODataError {
        let ch = self.input[at..].chars().next().unwrap_or('\0');
        ODataError::syntax(
            OD0001,
            format!("unexpected character '{ch}' at position {at} in '{}'", self.input),
            at,
        )
    }

    fn scan_identifier_end(&self, start: usize) -> usize {
        let mut chars = self.input[start..].char_indices();
        match chars.next() {
            Some((_, c)) if is_identifier_start(c) => {}
            _ => return start,
        }
        for (offset, c) in chars {
            if !is_identifier_continue(c) {
                return start + offset;
            }
        }
        self.input.len()
    }

    /// Read `'...'` starting at the opening quote; `''` escapes a quote
    fn scan_quoted(&self, quote: usize) -> Result<(String, usize)> {
        let mut value = String::new();
        let mut pos = quote + 1;
        loop {
            let Some(offset) = self.input[pos..].find('\'') else {
                return Err(ODataError::syntax(
                    OD0002,
                    format!("unterminated string literal at position {quote} in '{}'", self.input),
                    quote,
                ));
            };
            value.push_str(&self.input[pos..pos + offset]);
            pos += offset + 1;
            if self.bytes.get(pos) == Some(&b'\'') {
                value.push('\'');
                pos += 1;
            } else {
                return Ok((value, pos));
            }
        }
    }

    fn scan_typed_literal(
        &self,
        prefix: &str,
        start: usize,
        quote: usize,
    ) -> Result<Spanned<ExpressionToken<'input>>> {
        let (body, end) = self.scan_quoted(quote)?;
        let invalid = |detail: &str| {
            ODataError::syntax(
                OD0006,
                format!("invalid {prefix} literal '{body}': {detail}"),
                start,
            )
        };
        let value = match prefix {
            "datetime" => LiteralValue::DateTime(parse_datetime(&body).ok_or_else(|| invalid("expected yyyy-mm-ddThh:mm[:ss[.fffffff]]"))?),
            "datetimeoffset" => LiteralValue::DateTimeOffset(
                DateTime::parse_from_rfc3339(&body).map_err(|e| invalid(&e.to_string()))?,
            ),
            "time" => {
                if !(body.starts_with('P') || body.starts_with("-P")) {
                    return Err(invalid("expected an xsd:duration"));
                }
                LiteralValue::Time(body.clone())
            }
            "guid" => LiteralValue::Guid(Uuid::parse_str(&body).map_err(|e| invalid(&e.to_string()))?),
            _ => LiteralValue::Binary(hex::decode(&body).map_err(|e| invalid(&e.to_string()))?),
        };
        Ok(self.token(TokenKind::Literal(value), start, end))
    }

    fn scan_number(&self, start: usize) -> Result<Spanned<ExpressionToken<'input>>> {
        let digits = |mut pos: usize| {
            while self.bytes.get(pos).is_some_and(u8::is_ascii_digit) {
                pos += 1;
            }
            pos
        };
        let mut pos = if self.bytes[start] == b'-' { start + 1 } else { start };
        pos = digits(pos);
        let mut fractional = false;
        if self.bytes.get(pos) == Some(&b'.') && self.bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
            fractional = true;
            pos = digits(pos + 1);
        }
        if matches!(self.bytes.get(pos), Some(b'e' | b'E')) {
            let mut exp = pos + 1;
            if matches!(self.bytes.get(exp), Some(b'+' | b'-')) {
                exp += 1;
            }
            if self.bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                fractional = true;
                pos = digits(exp);
            }
        }
        let number_end = pos;
        let suffix = self
            .bytes
            .get(pos)
            .copied()
            .filter(|b| matches!(*b, b'L' | b'l' | b'M' | b'm' | b'D' | b'd' | b'F' | b'f'))
            .filter(|_| {
                !self.input[pos + 1..]
                    .chars()
                    .next()
                    .is_some_and(is_identifier_continue)
            });
        let end = if suffix.is_some() { pos + 1 } else { pos };
        let number = &self.input[start..number_end];
        let invalid = || {
            ODataError::syntax(
                OD0006,
                format!("invalid numeric literal '{}'", &self.input[start..end]),
                start,
            )
        };

        let value = match suffix {
            Some(b'L' | b'l') if !fractional => LiteralValue::Int64(number.parse().map_err(|_| invalid())?),
            Some(b'M' | b'm') => LiteralValue::Decimal(
                Decimal::from_str(number)
                    .or_else(|_| Decimal::from_scientific(number))
                    .map_err(|_| invalid())?,
            ),
            Some(b'D' | b'd') => LiteralValue::Double(number.parse().map_err(|_| invalid())?),
            Some(b'F' | b'f') => LiteralValue::Single(number.parse().map_err(|_| invalid())?),
            Some(_) => return Err(invalid()),
            None if fractional => LiteralValue::Double(number.parse().map_err(|_| invalid())?),
            None => match number.parse::<i32>() {
                Ok(value) => LiteralValue::Int32(value),
                Err(_) => LiteralValue::Int64(number.parse().map_err(|_| invalid())?),
            },
        };
        Ok(self.token(TokenKind::Literal(value), start, end))
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn kinds(input: &str, mode: LexerMode) -> Vec<TokenKind<'_>> {
        let mut lexer = ExpressionLexer::new(input, mode).unwrap();
        let mut out = Vec::new();
        while !lexer.at_end() {
            out.push(lexer.current_kind().clone());
            lexer.next_token().unwrap();
        }
        out
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(
            kinds("Price gt 5", LexerMode::Expression),
            vec![
                TokenKind::Identifier("Price"),
                TokenKind::Identifier("gt"),
                TokenKind::Literal(LiteralValue::Int32(5)),
            ]
        );
    }

    #[test]
    fn test_numeric_suffixes() {
        assert_eq!(
            kinds("1L 2.5M 3d 4.5f 1.5 -7 3000000000", LexerMode::Expression),
            vec![
                TokenKind::Literal(LiteralValue::Int64(1)),
                TokenKind::Literal(LiteralValue::Decimal(Decimal::new(25, 1))),
                TokenKind::Literal(LiteralValue::Double(3.0)),
                TokenKind::Literal(LiteralValue::Single(4.5)),
                TokenKind::Literal(LiteralValue::Double(1.5)),
                TokenKind::Literal(LiteralValue::Int32(-7)),
                TokenKind::Literal(LiteralValue::Int64(3_000_000_000)),
            ]
        );
    }

    #[test]
    fn test_string_escape() {
        assert_eq!(
            kinds("'O''Neil'", LexerMode::Expression),
            vec![TokenKind::Literal(LiteralValue::String("O'Neil".into()))]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = ExpressionLexer::new("Name eq 'abc", LexerMode::Expression)
            .and_then(|mut lexer| {
                lexer.next_token()?;
                lexer.next_token()?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.code(), OD0002);
        assert_eq!(err.position(), Some(8));
    }

    #[test]
    fn test_unexpected_character() {
        let err = ExpressionLexer::new("#", LexerMode::Expression).unwrap_err();
        assert_eq!(err.code(), OD0001);
    }

    #[test]
    fn test_star_only_in_path_mode() {
        assert!(ExpressionLexer::new("*", LexerMode::Expression).is_err());
        assert_eq!(kinds("*", LexerMode::SelectExpandPath), vec![TokenKind::Star]);
    }

    #[test]
    fn test_typed_literals() {
        let tokens = kinds(
            "guid'12345678-aaaa-bbbb-cccc-ddddeeeeffff' X'0AFF' datetime'2010-01-02T03:04'",
            LexerMode::Expression,
        );
        assert!(matches!(tokens[0], TokenKind::Literal(LiteralValue::Guid(_))));
        assert_eq!(tokens[1], TokenKind::Literal(LiteralValue::Binary(vec![0x0a, 0xff])));
        assert!(matches!(tokens[2], TokenKind::Literal(LiteralValue::DateTime(_))));
    }

    #[test]
    fn test_dotted_identifier() {
        let mut lexer = ExpressionLexer::new("NS.Special.Type/Name", LexerMode::Expression).unwrap();
        assert!(lexer.is_dotted_identifier_start());
        assert_eq!(lexer.read_dotted_identifier(false).unwrap(), "NS.Special.Type");
        assert_eq!(lexer.current_kind(), &TokenKind::Slash);
    }

    #[test]
    fn test_dotted_star() {
        let mut lexer = ExpressionLexer::new("Container.*", LexerMode::SelectExpandPath).unwrap();
        assert_eq!(lexer.read_dotted_identifier(true).unwrap(), "Container.*");
        assert!(lexer.at_end());
    }

    #[test]
    fn test_function_call_start_and_peek() {
        let lexer = ExpressionLexer::new("substringof('a', Name)", LexerMode::Expression).unwrap();
        assert!(lexer.is_function_call_start());
        assert_eq!(lexer.peek_next_token().unwrap().value.kind, TokenKind::OpenParen);
        assert_eq!(lexer.current_kind(), &TokenKind::Identifier("substringof"));
    }

    #[test]
    fn test_system_identifier_and_alias() {
        assert_eq!(
            kinds("$it @p", LexerMode::Expression),
            vec![TokenKind::Identifier("$it"), TokenKind::ParameterAlias("@p")]
        );
    }
}
