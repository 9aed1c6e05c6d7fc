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

//! Binary and unary operator binding with implicit conversions

use super::BindMethod;
use crate::ast::{BinaryOperatorToken, UnaryOperatorToken};
use crate::core::error_code::OD0053;
use crate::core::{ODataError, Result};
use crate::model::{EdmTypeReference, TypePromotion};
use crate::semantic::{BinaryOperatorNode, QueryNode, SingleValueNode, UnaryOperatorNode};

pub struct BinaryOperatorBinder;

impl BinaryOperatorBinder {
    /// Bind both operands, promote them to a common type and build the node
    pub fn bind_binary_operator(token: &BinaryOperatorToken, bind: &mut BindMethod<'_>) -> Result<QueryNode> {
        let operator = token.kind.to_string();
        let left = single_operand(bind(&token.left)?, &operator)?;
        let right = single_operand(bind(&token.right)?, &operator)?;

        let promoted =
            TypePromotion::promote_binary_operands(token.kind, left.type_reference(), right.type_reference())
                .map_err(|err| ODataError::binding(OD0053, err.to_string()))?;

        let (left, right) = match &promoted {
            Some(target) => (convert_typed(left, target), convert_typed(right, target)),
            None => (left, right),
        };
        let type_ref = if token.kind.yields_boolean() {
            Some(EdmTypeReference::boolean(true))
        } else {
            promoted
        };

        Ok(QueryNode::Single(SingleValueNode::BinaryOperator(BinaryOperatorNode {
            kind: token.kind,
            left: Box::new(left),
            right: Box::new(right),
            type_ref,
        })))
    }
}

pub struct UnaryOperatorBinder;

impl UnaryOperatorBinder {
    pub fn bind_unary_operator(token: &UnaryOperatorToken, bind: &mut BindMethod<'_>) -> Result<QueryNode> {
        let operand = single_operand(bind(&token.operand)?, token.kind.text())?;
        let promoted = TypePromotion::promote_unary_operand(token.kind, operand.type_reference())
            .map_err(|err| ODataError::binding(OD0053, err.to_string()))?;
        let operand = match &promoted {
            Some(target) => convert_typed(operand, target),
            None => operand,
        };
        Ok(QueryNode::Single(SingleValueNode::UnaryOperator(UnaryOperatorNode {
            kind: token.kind,
            operand: Box::new(operand),
            type_ref: promoted,
        })))
    }
}

fn single_operand(node: QueryNode, operator: &str) -> Result<SingleValueNode> {
    match node {
        QueryNode::Single(single) => Ok(single),
        QueryNode::Collection(collection) => Err(ODataError::binding(
            OD0053,
            format!(
                "operator '{operator}' requires single-valued operands, but found {}",
                collection.kind_name()
            ),
        )),
    }
}

/// Convert an operand to the promoted type unless it already matches.
///
/// Untyped operands (null, open properties) are converted as well, so the
/// node records the type the operator was resolved with.
fn convert_typed(node: SingleValueNode, target: &EdmTypeReference) -> SingleValueNode {
    let target = match node.type_reference() {
        // Keep the operand's own nullability when only that differs
        Some(current) if current.is_equivalent_to(target) => return node,
        _ => target,
    };
    node.convert_to(target)
}
