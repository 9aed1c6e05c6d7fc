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

//! Operator-precedence parser for `$filter` and `$orderby` expressions
//!
//! Binary operators are combined by precedence climbing over the static
//! operator table. All operators are left-associative. A depth counter guards
//! every recursive step (nested parentheses, unary chains, path segments and
//! operator chains) so adversarial input fails with a syntax error instead of
//! exhausting the stack.

use super::lexer::{ExpressionLexer, LexerMode, TokenKind};
use crate::ast::{
    BinaryOperatorKind, DottedIdentifierToken, FunctionCallToken, FunctionParameterToken,
    InnerPathToken, LambdaKind, LambdaToken, OrderByDirection, OrderByToken, ParameterAliasToken,
    QueryToken, RangeVariableToken, UnaryOperatorKind,
};
use crate::core::error_code::OD0003;
use crate::core::stack::with_stack;
use crate::core::{ODataError, Result};

/// Name of the implicit range variable
pub const IMPLICIT_RANGE_VARIABLE: &str = "$it";

/// Recursive-descent parser over one expression string
pub struct UriQueryExpressionParser<'input> {
    lexer: ExpressionLexer<'input>,
    max_depth: usize,
    depth: usize,
    /// Range variables in scope, innermost last
    parameters: Vec<String>,
}

impl<'input> UriQueryExpressionParser<'input> {
    pub fn new(input: &'input str, max_depth: usize) -> Result<Self> {
        Ok(Self {
            lexer: ExpressionLexer::new(input, LexerMode::Expression)?,
            max_depth,
            depth: 0,
            parameters: vec![IMPLICIT_RANGE_VARIABLE.to_string()],
        })
    }

    /// Parse a complete `$filter` value
    pub fn parse_filter(mut self) -> Result<QueryToken> {
        let expression = self.parse_expression()?;
        self.expect_end()?;
        Ok(expression)
    }

    /// Parse a complete `$orderby` value
    pub fn parse_order_by(mut self) -> Result<Vec<OrderByToken>> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let direction = if self.lexer.is_identifier("desc") {
                self.lexer.next_token()?;
                OrderByDirection::Descending
            } else {
                if self.lexer.is_identifier("asc") {
                    self.lexer.next_token()?;
                }
                OrderByDirection::Ascending
            };
            items.push(OrderByToken {
                expression,
                direction,
            });
            if *self.lexer.current_kind() != TokenKind::Comma {
                break;
            }
            self.lexer.next_token()?;
        }
        self.expect_end()?;
        Ok(items)
    }

    fn expect_end(&self) -> Result<()> {
        if self.lexer.at_end() {
            Ok(())
        } else {
            Err(self.lexer.unexpected("an operator or end of input"))
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

    /// Parse a full expression at the lowest precedence
    pub fn parse_expression(&mut self) -> Result<QueryToken> {
        self.recurse_enter()?;
        let expression = with_stack(|| self.parse_binary(0))?;
        self.recurse_leave(1);
        Ok(expression)
    }

    /// Binary operator at the current position, if any
    fn current_binary_operator(&self) -> Result<Option<(BinaryOperatorKind, u8)>> {
        let TokenKind::Identifier(text) = self.lexer.current_kind() else {
            return Ok(None);
        };
        match BinaryOperatorKind::from_keyword(text) {
            Some(kind) => Ok(Some((kind, kind.info()?.precedence))),
            None => Ok(None),
        }
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<QueryToken> {
        let mut left = self.parse_unary()?;
        let mut chained = 0;
        while let Some((kind, precedence)) = self.current_binary_operator()? {
            if precedence < min_precedence {
                break;
            }
            self.lexer.next_token()?;
            self.recurse_enter()?;
            chained += 1;
            let right = with_stack(|| self.parse_binary(precedence + 1))?;
            left = QueryToken::binary(kind, left, right);
        }
        self.recurse_leave(chained);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<QueryToken> {
        let kind = match self.lexer.current_kind() {
            TokenKind::Minus => UnaryOperatorKind::Negate,
            TokenKind::Identifier("not") => UnaryOperatorKind::Not,
            _ => return self.parse_primary(),
        };
        self.lexer.next_token()?;
        self.recurse_enter()?;
        let operand = with_stack(|| self.parse_unary())?;
        self.recurse_leave(1);
        Ok(QueryToken::unary(kind, operand))
    }

    fn parse_primary(&mut self) -> Result<QueryToken> {
        let mut expression = self.parse_primary_start()?;
        let mut segments = 0;
        while *self.lexer.current_kind() == TokenKind::Slash {
            self.lexer.next_token()?;
            self.recurse_enter()?;
            segments += 1;
            expression = if (self.lexer.is_identifier("any") || self.lexer.is_identifier("all"))
                && self.lexer.is_function_call_start()
            {
                self.parse_lambda(expression)?
            } else {
                self.parse_segment(Some(expression))?
            };
        }
        self.recurse_leave(segments);
        Ok(expression)
    }

    fn parse_primary_start(&mut self) -> Result<QueryToken> {
        let current = self.lexer.current().clone();
        match current.value.kind {
            TokenKind::Literal(value) => {
                self.lexer.next_token()?;
                Ok(QueryToken::literal(value, current.value.text))
            }
            TokenKind::ParameterAlias(alias) => {
                self.lexer.next_token()?;
                Ok(QueryToken::ParameterAlias(ParameterAliasToken {
                    alias: alias.to_string(),
                }))
            }
            TokenKind::OpenParen => {
                self.lexer.next_token()?;
                let expression = self.parse_expression()?;
                self.lexer.expect(TokenKind::CloseParen)?;
                Ok(expression)
            }
            TokenKind::Identifier(_) => self.parse_segment(None),
            _ => Err(self.lexer.unexpected("an expression")),
        }
    }

    /// One path segment: member, qualified name, function call or range variable
    fn parse_segment(&mut self, parent: Option<QueryToken>) -> Result<QueryToken> {
        let start = self.lexer.position();
        let name = if self.lexer.is_dotted_identifier_start() {
            self.lexer.read_dotted_identifier(false)?
        } else {
            self.lexer.read_identifier()?
        };
        let adjacent_paren = *self.lexer.current_kind() == TokenKind::OpenParen
            && self.lexer.position() == start + name.len();

        if adjacent_paren {
            return self.parse_function_call(name, parent);
        }
        if name.contains('.') {
            return Ok(QueryToken::DottedIdentifier(DottedIdentifierToken {
                identifier: name.to_string(),
                parent: parent.map(Box::new),
            }));
        }
        if parent.is_none() && self.parameters.iter().any(|p| p == name) {
            return Ok(QueryToken::RangeVariable(RangeVariableToken {
                name: name.to_string(),
            }));
        }
        if *self.lexer.current_kind() == TokenKind::Slash {
            Ok(QueryToken::InnerPath(InnerPathToken {
                identifier: name.to_string(),
                parent: parent.map(Box::new),
            }))
        } else {
            Ok(QueryToken::end_path(name, parent))
        }
    }

    fn parse_function_call(&mut self, name: &str, parent: Option<QueryToken>) -> Result<QueryToken> {
        self.lexer.expect(TokenKind::OpenParen)?;
        let mut arguments = Vec::new();
        if *self.lexer.current_kind() != TokenKind::CloseParen {
            loop {
                arguments.push(self.parse_argument()?);
                match self.lexer.current_kind() {
                    TokenKind::Comma => {
                        self.lexer.next_token()?;
                    }
                    TokenKind::CloseParen => break,
                    _ => return Err(self.lexer.unexpected("',' or ')'")),
                }
            }
        }
        self.lexer.expect(TokenKind::CloseParen)?;
        Ok(QueryToken::FunctionCall(FunctionCallToken {
            name: name.to_string(),
            arguments,
            parent: parent.map(Box::new),
        }))
    }

    /// Positional argument or `name=value`
    fn parse_argument(&mut self) -> Result<FunctionParameterToken> {
        if let TokenKind::Identifier(name) = *self.lexer.current_kind() {
            if self.lexer.peek_next_token()?.value.kind == TokenKind::Equal {
                self.lexer.next_token()?;
                self.lexer.next_token()?;
                return Ok(FunctionParameterToken {
                    name: Some(name.to_string()),
                    value: self.parse_expression()?,
                });
            }
        }
        Ok(FunctionParameterToken {
            name: None,
            value: self.parse_expression()?,
        })
    }

    fn parse_lambda(&mut self, parent: QueryToken) -> Result<QueryToken> {
        let kind = if self.lexer.is_identifier("any") {
            LambdaKind::Any
        } else {
            LambdaKind::All
        };
        self.lexer.next_token()?;
        self.lexer.expect(TokenKind::OpenParen)?;

        if *self.lexer.current_kind() == TokenKind::CloseParen {
            if kind == LambdaKind::All {
                return Err(self.lexer.unexpected("a lambda variable for 'all'"));
            }
            self.lexer.next_token()?;
            return Ok(QueryToken::Lambda(LambdaToken {
                kind,
                parent: Box::new(parent),
                parameter: None,
                expression: None,
            }));
        }

        let position = self.lexer.position();
        let parameter = self.lexer.read_identifier()?.to_string();
        if self.parameters.contains(&parameter) {
            return Err(ODataError::syntax(
                OD0003,
                format!("the range variable '{parameter}' is already in scope"),
                position,
            ));
        }
        self.lexer.expect(TokenKind::Colon)?;
        self.parameters.push(parameter.clone());
        let body = self.parse_expression()?;
        self.parameters.pop();
        self.lexer.expect(TokenKind::CloseParen)?;

        Ok(QueryToken::Lambda(LambdaToken {
            kind,
            parent: Box::new(parent),
            parameter: Some(parameter),
            expression: Some(Box::new(body)),
        }))
    }
}
