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

//! Syntactic query tokens
//!
//! Tokens are untyped: identifiers are kept as text and resolved later by the
//! binder. Parent links point toward the start of a path, so `A/B/C` is an
//! end-path `C` whose parent is the inner path `B`, whose parent is `A`.

use super::literal::LiteralValue;
use super::operator::{BinaryOperatorKind, UnaryOperatorKind};
use crate::model::types::EdmPrimitiveTypeKind;
use serde::{Deserialize, Serialize};

/// Any node of a parsed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "token")]
pub enum QueryToken {
    BinaryOperator(BinaryOperatorToken),
    UnaryOperator(UnaryOperatorToken),
    Literal(LiteralToken),
    /// Last segment of a member-access path
    EndPath(EndPathToken),
    /// Non-final segment of a member-access path
    InnerPath(InnerPathToken),
    /// Qualified name used as a type cast, e.g. `NS.Manager`
    DottedIdentifier(DottedIdentifierToken),
    RangeVariable(RangeVariableToken),
    FunctionCall(FunctionCallToken),
    Lambda(LambdaToken),
    /// `@name` reference to another query option
    ParameterAlias(ParameterAliasToken),
    Star,
}

impl QueryToken {
    pub fn binary(kind: BinaryOperatorKind, left: QueryToken, right: QueryToken) -> Self {
        Self::BinaryOperator(BinaryOperatorToken {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(kind: UnaryOperatorKind, operand: QueryToken) -> Self {
        Self::UnaryOperator(UnaryOperatorToken {
            kind,
            operand: Box::new(operand),
        })
    }

    pub fn end_path(identifier: impl Into<String>, parent: Option<QueryToken>) -> Self {
        Self::EndPath(EndPathToken {
            identifier: identifier.into(),
            parent: parent.map(Box::new),
        })
    }

    pub fn literal(value: LiteralValue, original_text: impl Into<String>) -> Self {
        Self::Literal(LiteralToken {
            value,
            original_text: original_text.into(),
        })
    }

    /// Short name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::BinaryOperator(_) => "binary operator",
            Self::UnaryOperator(_) => "unary operator",
            Self::Literal(_) => "literal",
            Self::EndPath(_) => "property access",
            Self::InnerPath(_) => "path segment",
            Self::DottedIdentifier(_) => "qualified name",
            Self::RangeVariable(_) => "range variable",
            Self::FunctionCall(_) => "function call",
            Self::Lambda(_) => "lambda",
            Self::ParameterAlias(_) => "parameter alias",
            Self::Star => "star",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOperatorToken {
    pub kind: BinaryOperatorKind,
    pub left: Box<QueryToken>,
    pub right: Box<QueryToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOperatorToken {
    pub kind: UnaryOperatorKind,
    pub operand: Box<QueryToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralToken {
    pub value: LiteralValue,
    /// Text as written in the URI
    pub original_text: String,
}

impl LiteralToken {
    /// EDM type implied by the literal's syntax; `None` for `null`
    pub fn type_hint(&self) -> Option<EdmPrimitiveTypeKind> {
        self.value.primitive_kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndPathToken {
    pub identifier: String,
    pub parent: Option<Box<QueryToken>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerPathToken {
    pub identifier: String,
    pub parent: Option<Box<QueryToken>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DottedIdentifierToken {
    pub identifier: String,
    pub parent: Option<Box<QueryToken>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeVariableToken {
    pub name: String,
}

/// Argument of a function call, optionally named (`p=1`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameterToken {
    pub name: Option<String>,
    pub value: QueryToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallToken {
    pub name: String,
    pub arguments: Vec<FunctionParameterToken>,
    pub parent: Option<Box<QueryToken>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LambdaKind {
    Any,
    All,
}

impl LambdaKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaToken {
    pub kind: LambdaKind,
    /// Collection the lambda ranges over
    pub parent: Box<QueryToken>,
    pub parameter: Option<String>,
    /// Absent for the empty form `any()`
    pub expression: Option<Box<QueryToken>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAliasToken {
    /// Alias including the leading `@`
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderByDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByToken {
    pub expression: QueryToken,
    pub direction: OrderByDirection,
}
