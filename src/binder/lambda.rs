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

//! `any` / `all` over collection paths

use super::MetadataBinder;
use crate::ast::{LambdaKind, LambdaToken};
use crate::core::error_code::{OD0054, OD0067};
use crate::core::{ODataError, Result};
use crate::model::EdmTypeReference;
use crate::semantic::{LambdaNode, QueryNode, RangeVariable, SingleValueNode};

impl MetadataBinder<'_> {
    pub(crate) fn bind_lambda(&mut self, lambda: &LambdaToken) -> Result<QueryNode> {
        let source = match self.bind(&lambda.parent)? {
            QueryNode::Collection(collection) => collection,
            QueryNode::Single(single) => {
                return Err(ODataError::binding(
                    OD0067,
                    format!(
                        "'{}' can only be applied to a collection, found {}",
                        lambda.kind.keyword(),
                        single.kind_name()
                    ),
                ));
            }
        };

        let (range_variable, body) = match (&lambda.parameter, &lambda.expression) {
            (Some(parameter), Some(expression)) => {
                let variable = RangeVariable::for_item_type(
                    parameter.clone(),
                    Some(source.item_type().clone()),
                    source.entity_set().map(str::to_string),
                );
                self.state.push_range_variable(variable.clone());
                let body = self.bind(expression);
                self.state.pop_range_variable();
                (Some(variable), Some(Box::new(require_boolean(body?, lambda.kind)?)))
            }
            _ => (None, None),
        };

        let node = LambdaNode {
            kind: lambda.kind,
            source: Box::new(source),
            range_variable,
            body,
            type_ref: EdmTypeReference::boolean(true),
        };
        Ok(QueryNode::Single(match lambda.kind {
            LambdaKind::Any => SingleValueNode::Any(node),
            LambdaKind::All => SingleValueNode::All(node),
        }))
    }
}

fn require_boolean(body: QueryNode, kind: LambdaKind) -> Result<SingleValueNode> {
    match body {
        QueryNode::Single(single) if single.type_reference().is_none_or(EdmTypeReference::is_boolean) => {
            Ok(single)
        }
        other => Err(ODataError::binding(
            OD0054,
            format!("the body of '{}' must be a boolean expression, found {}", kind.keyword(), other.kind_name()),
        )),
    }
}
