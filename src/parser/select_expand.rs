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

//! `$select` and `$expand` term-list parsers
//!
//! Both expand grammars share [`SelectExpandParser`], which reads
//! slash-separated path chains and tracks its own nesting depth. What may
//! follow a term's path in parentheses is decided by an [`ExpandTermParser`]
//! strategy picked once per top-level value.

use super::lexer::{ExpressionLexer, LexerMode, TokenKind};
use super::pratt::UriQueryExpressionParser;
use super::scan::{closing_paren, parse_count_option, split_top_level};
use crate::ast::{
    ExpandTermToken, ExpandToken, InlineCountKind, PathOrder, PathSegmentToken, SelectToken,
};
use crate::config::ExpandSyntax;
use crate::core::error_code::{OD0003, OD0007, OD0008, OD0009};
use crate::core::stack::with_stack;
use crate::core::{ODataError, Result};

/// Reads what follows an expand term's path
pub trait ExpandTermParser: Sync {
    /// Parse the parenthesized block at the lexer's current `(` into `term`
    fn parse_term_options(
        &self,
        parser: &mut SelectExpandParser<'_>,
        term: ExpandTermToken,
    ) -> Result<ExpandTermToken>;
}

/// `A(B,C/D)`: parentheses hold a nested expand path list
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyExpandTermParser;

/// `A($filter=...;$expand=B)`: parentheses hold query options
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionExpandTermParser;

/// Strategy for a grammar variant
pub fn expand_term_parser(syntax: ExpandSyntax) -> &'static dyn ExpandTermParser {
    match syntax {
        ExpandSyntax::Legacy => &LegacyExpandTermParser,
        ExpandSyntax::Options => &OptionExpandTermParser,
    }
}

/// Base parser over one `$select` or `$expand` value
pub struct SelectExpandParser<'input> {
    lexer: ExpressionLexer<'input>,
    max_depth: usize,
    depth: usize,
    /// Option blocks enclosing this value; bounded by `max_depth` as well
    nesting: usize,
    syntax: ExpandSyntax,
}

impl<'input> SelectExpandParser<'input> {
    pub fn new(text: &'input str, max_depth: usize, syntax: ExpandSyntax) -> Result<Self> {
        Self::nested(text, max_depth, syntax, 0)
    }

    fn nested(text: &'input str, max_depth: usize, syntax: ExpandSyntax, nesting: usize) -> Result<Self> {
        if nesting > max_depth {
            return Err(ODataError::depth_exceeded(max_depth, 0));
        }
        Ok(Self {
            lexer: ExpressionLexer::new(text, LexerMode::SelectExpandPath)?,
            max_depth,
            depth: 0,
            nesting,
            syntax,
        })
    }

    /// Parse a complete `$select` value
    pub fn parse_select(mut self) -> Result<SelectToken> {
        let mut properties = Vec::new();
        if !self.lexer.at_end() {
            loop {
                properties.push(self.parse_path(true)?);
                if !self.skip_comma()? {
                    break;
                }
            }
        }
        self.expect_end()?;
        Ok(SelectToken {
            properties,
            order: PathOrder::InnermostFirst,
        })
    }

    /// Parse a complete `$expand` value
    pub fn parse_expand(mut self) -> Result<ExpandToken> {
        let strategy = expand_term_parser(self.syntax);
        let terms = if self.lexer.at_end() {
            Vec::new()
        } else {
            self.parse_expand_terms(strategy)?
        };
        self.expect_end()?;
        Ok(ExpandToken::new(terms, PathOrder::InnermostFirst))
    }

    fn parse_expand_terms(&mut self, strategy: &dyn ExpandTermParser) -> Result<Vec<ExpandTermToken>> {
        let mut terms = Vec::new();
        loop {
            let mut term = ExpandTermToken::new(self.parse_path(false)?);
            if *self.lexer.current_kind() == TokenKind::OpenParen {
                term = strategy.parse_term_options(self, term)?;
            }
            terms.push(term);
            if !self.skip_comma()? {
                break;
            }
        }
        Ok(terms)
    }

    fn skip_comma(&mut self) -> Result<bool> {
        if *self.lexer.current_kind() == TokenKind::Comma {
            self.lexer.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.lexer.at_end() {
            Ok(())
        } else {
            Err(self.lexer.unexpected("',' or end of input"))
        }
    }

    fn recurse_enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ODataError::depth_exceeded(self.max_depth, self.lexer.position()));
        }
        Ok(())
    }

    fn recurse_leave(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    /// Read `a/NS.T/b`, producing an innermost-first chain
    fn parse_path(&mut self, allow_star: bool) -> Result<PathSegmentToken> {
        self.recurse_enter()?;
        let mut head = PathSegmentToken::non_system(self.read_segment(allow_star)?, None);
        let mut segments = 1;
        while *self.lexer.current_kind() == TokenKind::Slash && !head.identifier.ends_with('*') {
            self.lexer.next_token()?;
            self.recurse_enter()?;
            segments += 1;
            let identifier = self.read_segment(allow_star)?;
            head = PathSegmentToken::non_system(identifier, Some(head));
        }
        self.recurse_leave(segments);
        Ok(head)
    }

    fn read_segment(&mut self, allow_star: bool) -> Result<&'input str> {
        let position = self.lexer.position();
        let identifier = self.lexer.read_dotted_identifier(allow_star)?;
        if identifier.starts_with('$') {
            return Err(ODataError::syntax(
                OD0007,
                format!("system token '{identifier}' is not allowed here"),
                position,
            ));
        }
        Ok(identifier)
    }
}

impl ExpandTermParser for LegacyExpandTermParser {
    fn parse_term_options(
        &self,
        parser: &mut SelectExpandParser<'_>,
        term: ExpandTermToken,
    ) -> Result<ExpandTermToken> {
        parser.lexer.expect(TokenKind::OpenParen)?;
        if *parser.lexer.current_kind() == TokenKind::CloseParen {
            parser.lexer.next_token()?;
            return Ok(term);
        }
        parser.recurse_enter()?;
        let nested = parser.parse_expand_terms(self)?;
        parser.lexer.expect(TokenKind::CloseParen)?;
        parser.recurse_leave(1);
        Ok(term.with_expand(Some(ExpandToken::new(nested, PathOrder::InnermostFirst))))
    }
}

impl ExpandTermParser for OptionExpandTermParser {
    fn parse_term_options(
        &self,
        parser: &mut SelectExpandParser<'_>,
        mut term: ExpandTermToken,
    ) -> Result<ExpandTermToken> {
        let input = parser.lexer.input();
        let open = parser.lexer.position();
        let close = closing_paren(input, open)
            .ok_or_else(|| ODataError::syntax(OD0003, format!("missing ')' in '{input}'"), open))?;
        let block = &input[open + 1..close];
        parser.lexer.seek(close + 1)?;

        let mut seen: Vec<&str> = Vec::new();
        for (offset, clause) in split_top_level(block, b';')? {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let position = open + 1 + offset;
            let Some((name, value)) = clause.split_once('=') else {
                return Err(ODataError::syntax(
                    OD0003,
                    format!("expected 'option=value' but found '{clause}'"),
                    position,
                ));
            };
            let name = name.trim();
            if seen.contains(&name) {
                return Err(ODataError::syntax(
                    OD0009,
                    format!("query option '{name}' is specified more than once"),
                    position,
                ));
            }
            seen.push(name);
            apply_option(parser, &mut term, name, value, position)?;
        }
        Ok(term)
    }
}

fn apply_option(
    parser: &SelectExpandParser<'_>,
    term: &mut ExpandTermToken,
    name: &str,
    value: &str,
    position: usize,
) -> Result<()> {
    let max_depth = parser.max_depth;
    let nesting = parser.nesting + 1;
    match name {
        "$filter" => {
            term.filter_option = Some(UriQueryExpressionParser::new(value, max_depth)?.parse_filter()?);
        }
        "$orderby" => {
            term.order_by_options =
                Some(UriQueryExpressionParser::new(value, max_depth)?.parse_order_by()?);
        }
        "$top" => term.top_option = Some(parse_count_option(name, value)?),
        "$skip" => term.skip_option = Some(parse_count_option(name, value)?),
        "$inlinecount" => {
            term.inline_count_option = Some(InlineCountKind::parse(value.trim()).ok_or_else(|| {
                ODataError::syntax(
                    OD0008,
                    format!("invalid $inlinecount value '{value}': expected 'allpages' or 'none'"),
                    position,
                )
            })?);
        }
        "$select" => {
            term.select_option = Some(with_stack(|| {
                SelectExpandParser::nested(value, max_depth, parser.syntax, nesting)?.parse_select()
            })?);
        }
        "$expand" => {
            term.expand_option = Some(with_stack(|| {
                SelectExpandParser::nested(value, max_depth, parser.syntax, nesting)?.parse_expand()
            })?);
        }
        other if other.starts_with('$') => {
            return Err(ODataError::syntax(
                OD0007,
                format!("system token '{other}' is not allowed inside an expand term"),
                position,
            ));
        }
        other => {
            return Err(ODataError::syntax(
                OD0003,
                format!("unexpected option '{other}' inside an expand term"),
                position,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QueryToken;
    use crate::core::error_code::OD0004;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn expand(text: &str, syntax: ExpandSyntax) -> ExpandToken {
        SelectExpandParser::new(text, 800, syntax)
            .and_then(SelectExpandParser::parse_expand)
            .unwrap()
    }

    fn select(text: &str) -> SelectToken {
        SelectExpandParser::new(text, 800, ExpandSyntax::Options)
            .and_then(SelectExpandParser::parse_select)
            .unwrap()
    }

    #[test]
    fn test_select_paths_are_innermost_first() {
        let token = select("Name, Orders/Amount, NS.Manager/Budget, *");
        let rendered: Vec<_> = token.properties.iter().map(|p| p.hashable_string()).collect();
        assert_eq!(rendered, vec!["Name", "Amount/Orders", "Budget/NS.Manager", "*"]);
        assert_eq!(token.order, PathOrder::InnermostFirst);
    }

    #[test]
    fn test_select_namespace_star() {
        let token = select("NS.*");
        assert_eq!(token.properties[0].identifier, "NS.*");
    }

    #[test]
    fn test_empty_values() {
        assert!(select("").properties.is_empty());
        assert!(expand("  ", ExpandSyntax::Options).expand_terms.is_empty());
    }

    #[test]
    fn test_legacy_nested_paths() {
        let token = expand("A/B,C(D,E)", ExpandSyntax::Legacy);
        assert_eq!(token.expand_terms.len(), 2);
        assert_eq!(token.expand_terms[0].path_to_nav_prop.hashable_string(), "B/A");
        let nested = token.expand_terms[1].expand_option.as_ref().unwrap();
        let names: Vec<_> = nested
            .expand_terms
            .iter()
            .map(|t| t.path_to_nav_prop.identifier.as_str())
            .collect();
        assert_eq!(names, vec!["D", "E"]);
    }

    #[test]
    fn test_legacy_empty_parens() {
        let token = expand("Foo()", ExpandSyntax::Legacy);
        assert_eq!(token.expand_terms[0].expand_option, None);
    }

    #[test]
    fn test_option_block() {
        let token = expand(
            "Orders($filter=Amount gt 5;$orderby=Amount desc;$top=3;$skip=1;$inlinecount=allpages;$select=Amount;$expand=Lines),Manager",
            ExpandSyntax::Options,
        );
        assert_eq!(token.expand_terms.len(), 2);
        let term = &token.expand_terms[0];
        assert!(matches!(term.filter_option, Some(QueryToken::BinaryOperator(_))));
        assert_eq!(term.order_by_options.as_ref().map(Vec::len), Some(1));
        assert_eq!(term.top_option, Some(3));
        assert_eq!(term.skip_option, Some(1));
        assert_eq!(term.inline_count_option, Some(InlineCountKind::AllPages));
        assert_eq!(term.select_option.as_ref().unwrap().properties[0].identifier, "Amount");
        assert_eq!(
            term.expand_option.as_ref().unwrap().expand_terms[0].path_to_nav_prop.identifier,
            "Lines"
        );
        assert_eq!(token.expand_terms[1].path_to_nav_prop.identifier, "Manager");
    }

    #[test]
    fn test_option_block_with_semicolon_in_string() {
        let token = expand("Orders($filter=Note eq 'a;b')", ExpandSyntax::Options);
        assert!(token.expand_terms[0].filter_option.is_some());
    }

    #[rstest]
    #[case("Orders($format=json)", OD0007)]
    #[case("Orders($top=1;$top=2)", OD0009)]
    #[case("Orders($top=-1)", OD0008)]
    #[case("Orders($inlinecount=AllPages)", OD0008)]
    #[case("Orders(filter=x)", OD0003)]
    #[case("$links", OD0007)]
    fn test_option_block_errors(#[case] text: &str, #[case] code: crate::core::ErrorCode) {
        let err = SelectExpandParser::new(text, 800, ExpandSyntax::Options)
            .and_then(SelectExpandParser::parse_expand)
            .unwrap_err();
        assert_eq!(err.code(), code);
    }

    #[test]
    fn test_path_depth_limit() {
        let path = vec!["A"; 6].join("/");
        let err = SelectExpandParser::new(&path, 5, ExpandSyntax::Legacy)
            .and_then(SelectExpandParser::parse_expand)
            .unwrap_err();
        assert_eq!(err.code(), OD0004);
    }

    #[test]
    fn test_option_nesting_depth_limit() {
        let mut text = String::from("A");
        for _ in 0..4 {
            text = format!("A($expand={text})");
        }
        assert!(
            SelectExpandParser::new(&text, 4, ExpandSyntax::Options)
                .and_then(SelectExpandParser::parse_expand)
                .is_ok()
        );
        let deeper = format!("A($expand={text})");
        let err = SelectExpandParser::new(&deeper, 4, ExpandSyntax::Options)
            .and_then(SelectExpandParser::parse_expand)
            .unwrap_err();
        assert_eq!(err.code(), OD0004);
    }
}
