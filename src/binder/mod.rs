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

//! Semantic binding: syntactic tokens to typed nodes
//!
//! [`MetadataBinder`] owns the recursion. Sub-binders receive either
//! already-bound children or a dispatch callback, so none of them needs to
//! know the whole token hierarchy.

pub mod dotted;
pub mod end_path;
pub mod filter;
pub mod function_call;
pub mod function_resolver;
pub mod lambda;
pub mod operator;
pub mod orderby;
pub mod path;
pub mod select_expand;
pub mod state;
pub mod uri;

pub use dotted::DottedIdentifierBinder;
pub use end_path::EndPathBinder;
pub use filter::FilterBinder;
pub use function_call::FunctionCallBinder;
pub use function_resolver::{FunctionOverloadResolver, resolve_function_import};
pub use operator::{BinaryOperatorBinder, UnaryOperatorBinder};
pub use orderby::OrderByBinder;
pub use path::ODataPathBinder;
pub use select_expand::{SelectBinder, SelectExpandBinder, SelectExpandPathBinder, SelectPathSegmentTokenBinder};
pub use state::BindingState;
pub use uri::ODataUriSemanticBinder;

use crate::ast::QueryToken;
use crate::core::error_code::{OD0004, OD0063, OD0069, OD0071};
use crate::core::stack::with_stack;
use crate::core::{ODataError, Result};
use crate::model::EdmModel;
use crate::parser::parse_filter_syntax;
use crate::semantic::{ConstantNode, QueryNode, RangeVariable, SingleValueNode};

/// Dispatch callback handed to sub-binders
pub type BindMethod<'b> = dyn FnMut(&QueryToken) -> Result<QueryNode> + 'b;

/// Binds expression tokens against the model
pub struct MetadataBinder<'m> {
    pub state: BindingState<'m>,
}

impl<'m> MetadataBinder<'m> {
    pub fn new(state: BindingState<'m>) -> Self {
        Self { state }
    }

    pub fn model(&self) -> &'m dyn EdmModel {
        self.state.model
    }

    /// Bind any expression token
    pub fn bind(&mut self, token: &QueryToken) -> Result<QueryNode> {
        with_stack(|| self.bind_token(token))
    }

    fn bind_token(&mut self, token: &QueryToken) -> Result<QueryNode> {
        let model = self.state.model;
        match token {
            QueryToken::Literal(literal) => Ok(QueryNode::Single(SingleValueNode::Constant(ConstantNode::new(
                literal.value.clone(),
                literal.original_text.clone(),
            )))),
            QueryToken::BinaryOperator(binary) => {
                BinaryOperatorBinder::bind_binary_operator(binary, &mut |t: &QueryToken| self.bind(t))
            }
            QueryToken::UnaryOperator(unary) => {
                UnaryOperatorBinder::bind_unary_operator(unary, &mut |t: &QueryToken| self.bind(t))
            }
            QueryToken::EndPath(end_path) => {
                let parent = self.bind_parent(end_path.parent.as_deref())?;
                EndPathBinder::new(model).bind_property_access(&end_path.identifier, parent)
            }
            QueryToken::InnerPath(inner_path) => {
                let parent = self.bind_parent(inner_path.parent.as_deref())?;
                EndPathBinder::new(model).bind_property_access(&inner_path.identifier, parent)
            }
            QueryToken::DottedIdentifier(dotted) => {
                let parent = self.bind_parent(dotted.parent.as_deref())?;
                DottedIdentifierBinder::new(model).bind_dotted_identifier(dotted, parent, &mut |t: &QueryToken| {
                    self.bind(t)
                })
            }
            QueryToken::RangeVariable(variable) => self
                .state
                .find_range_variable(&variable.name)
                .map(|found| QueryNode::Single(found.reference()))
                .ok_or_else(|| {
                    ODataError::binding(
                        OD0063,
                        format!("the range variable '{}' is not in scope", variable.name),
                    )
                }),
            QueryToken::FunctionCall(call) => self.bind_function_call(call),
            QueryToken::Lambda(lambda) => self.bind_lambda(lambda),
            QueryToken::ParameterAlias(alias) => self.bind_parameter_alias(&alias.alias),
            QueryToken::Star => Err(ODataError::binding(
                OD0069,
                "'*' is only valid in $select",
            )),
        }
    }

    /// Bound parent, or a reference to `$it` when there is none
    pub fn bind_parent(&mut self, parent: Option<&QueryToken>) -> Result<QueryNode> {
        match parent {
            Some(token) => self.bind(token),
            None => self.implicit_reference(),
        }
    }

    pub fn implicit_reference(&self) -> Result<QueryNode> {
        self.state
            .implicit_range_variable()
            .map(|variable| QueryNode::Single(variable.reference()))
            .ok_or_else(|| {
                ODataError::binding(OD0063, "the implicit range variable '$it' is not in scope")
            })
    }

    /// Run `f` with `variable` as `$it`, restoring the previous one afterwards
    pub fn with_implicit_range_variable<T>(
        &mut self,
        variable: RangeVariable,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = self.state.replace_implicit_range_variable(Some(variable));
        let result = f(self);
        self.state.replace_implicit_range_variable(previous);
        result
    }

    fn bind_parameter_alias(&mut self, alias: &str) -> Result<QueryNode> {
        let Some(text) = self.state.parameter_alias(alias).map(str::to_string) else {
            return Err(ODataError::binding(
                OD0071,
                format!("the parameter alias '{alias}' is not defined in the query"),
            ));
        };
        if self.state.alias_depth() >= self.state.max_depth {
            return Err(ODataError::syntax_at_unknown(
                OD0004,
                format!(
                    "the parameter alias '{alias}' is nested deeper than the limit of {}",
                    self.state.max_depth
                ),
            ));
        }
        if !self.state.begin_alias(alias) {
            return Err(ODataError::binding(
                OD0071,
                format!("the parameter alias '{alias}' refers to itself"),
            ));
        }
        let result = parse_filter_syntax(&text, self.state.max_depth).and_then(|token| self.bind(&token));
        self.state.end_alias();
        result
    }
}
