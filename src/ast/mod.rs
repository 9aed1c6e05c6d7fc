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

//! Syntactic tree for OData URIs
//!
//! Untyped tokens produced by the parser and consumed by the binder.

pub mod literal;
pub mod operator;
pub mod path;
pub mod select_expand;
pub mod syntactic_tree;
pub mod token;

pub use literal::LiteralValue;
pub use operator::{BinaryOperatorKind, OPERATOR_TABLE, OperatorInfo, UnaryOperatorKind};
pub use path::{PathOrder, PathSegmentKind, PathSegmentToken, PathSegmentTokenEqualityComparer};
pub use select_expand::{ExpandTermToken, ExpandToken, InlineCountKind, SelectToken};
pub use syntactic_tree::{CustomQueryOptionToken, ResourceSegmentToken, SyntacticTree};
pub use token::{
    BinaryOperatorToken, DottedIdentifierToken, EndPathToken, FunctionCallToken,
    FunctionParameterToken, InnerPathToken, LambdaKind, LambdaToken, LiteralToken,
    OrderByDirection, OrderByToken, ParameterAliasToken, QueryToken, RangeVariableToken,
    UnaryOperatorToken,
};
