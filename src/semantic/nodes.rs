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

//! Typed semantic nodes produced by the binder
//!
//! Every node knows its EDM type. `None` means untyped: an open property or
//! an untyped `null` literal.

use crate::ast::{BinaryOperatorKind, LambdaKind, LiteralValue, UnaryOperatorKind};
use crate::model::EdmTypeReference;
use serde::Serialize;

/// Any bound expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "node", rename_all = "camelCase")]
pub enum QueryNode {
    Single(SingleValueNode),
    Collection(CollectionNode),
}

impl QueryNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Single(node) => node.kind_name(),
            Self::Collection(node) => node.kind_name(),
        }
    }

    pub fn into_single(self) -> Option<SingleValueNode> {
        match self {
            Self::Single(node) => Some(node),
            Self::Collection(_) => None,
        }
    }
}

/// Expression producing one value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SingleValueNode {
    Constant(ConstantNode),
    Convert(ConvertNode),
    BinaryOperator(BinaryOperatorNode),
    UnaryOperator(UnaryOperatorNode),
    /// Reference to a non-entity range variable
    RangeVariableReference(RangeVariableReferenceNode),
    EntityRangeVariableReference(EntityRangeVariableReferenceNode),
    PropertyAccess(SingleValuePropertyAccessNode),
    OpenPropertyAccess(SingleValueOpenPropertyAccessNode),
    SingleNavigation(SingleNavigationNode),
    SingleEntityCast(SingleEntityCastNode),
    FunctionCall(SingleValueFunctionCallNode),
    Any(LambdaNode),
    All(LambdaNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantNode {
    pub value: LiteralValue,
    /// Text as written in the URI
    pub literal_text: String,
    pub type_ref: Option<EdmTypeReference>,
}

impl ConstantNode {
    pub fn new(value: LiteralValue, literal_text: impl Into<String>) -> Self {
        let type_ref = value.type_reference();
        Self {
            value,
            literal_text: literal_text.into(),
            type_ref,
        }
    }
}

/// Implicit conversion inserted by type promotion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertNode {
    pub source: Box<SingleValueNode>,
    pub type_ref: EdmTypeReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryOperatorNode {
    #[serde(rename = "operator")]
    pub kind: BinaryOperatorKind,
    pub left: Box<SingleValueNode>,
    pub right: Box<SingleValueNode>,
    pub type_ref: Option<EdmTypeReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryOperatorNode {
    #[serde(rename = "operator")]
    pub kind: UnaryOperatorKind,
    pub operand: Box<SingleValueNode>,
    pub type_ref: Option<EdmTypeReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeVariableReferenceNode {
    pub name: String,
    pub type_ref: Option<EdmTypeReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRangeVariableReferenceNode {
    pub name: String,
    pub type_ref: EdmTypeReference,
    pub entity_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleValuePropertyAccessNode {
    pub source: Box<SingleValueNode>,
    pub property: String,
    pub type_ref: EdmTypeReference,
}

/// Undeclared property of an open type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleValueOpenPropertyAccessNode {
    pub source: Box<SingleValueNode>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleNavigationNode {
    pub source: Box<SingleValueNode>,
    pub navigation_property: String,
    pub type_ref: EdmTypeReference,
    pub entity_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleEntityCastNode {
    pub source: Box<SingleValueNode>,
    pub type_ref: EdmTypeReference,
    pub entity_set: Option<String>,
}

/// Built-in function or bound service operation returning one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleValueFunctionCallNode {
    pub name: String,
    pub arguments: Vec<FunctionArgument>,
    /// Entity or collection value the operation is bound to
    pub source: Option<Box<QueryNode>>,
    pub type_ref: Option<EdmTypeReference>,
    pub entity_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionArgument {
    /// Set for `name=value` arguments of service operations
    pub name: Option<String>,
    pub value: QueryNode,
}

/// `any` or `all` over a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaNode {
    #[serde(rename = "lambda")]
    pub kind: LambdaKind,
    pub source: Box<CollectionNode>,
    /// `None` for the empty form `any()`
    pub range_variable: Option<RangeVariable>,
    pub body: Option<Box<SingleValueNode>>,
    pub type_ref: EdmTypeReference,
}

impl SingleValueNode {
    pub fn type_reference(&self) -> Option<&EdmTypeReference> {
        match self {
            Self::Constant(node) => node.type_ref.as_ref(),
            Self::Convert(node) => Some(&node.type_ref),
            Self::BinaryOperator(node) => node.type_ref.as_ref(),
            Self::UnaryOperator(node) => node.type_ref.as_ref(),
            Self::RangeVariableReference(node) => node.type_ref.as_ref(),
            Self::EntityRangeVariableReference(node) => Some(&node.type_ref),
            Self::PropertyAccess(node) => Some(&node.type_ref),
            Self::OpenPropertyAccess(_) => None,
            Self::SingleNavigation(node) => Some(&node.type_ref),
            Self::SingleEntityCast(node) => Some(&node.type_ref),
            Self::FunctionCall(node) => node.type_ref.as_ref(),
            Self::Any(node) | Self::All(node) => Some(&node.type_ref),
        }
    }

    /// Entity set of an entity-valued node
    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::EntityRangeVariableReference(node) => node.entity_set.as_deref(),
            Self::SingleNavigation(node) => node.entity_set.as_deref(),
            Self::SingleEntityCast(node) => node.entity_set.as_deref(),
            Self::FunctionCall(node) => node.entity_set.as_deref(),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        self.type_reference().is_some_and(EdmTypeReference::is_entity)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "Constant",
            Self::Convert(_) => "Convert",
            Self::BinaryOperator(_) => "BinaryOperator",
            Self::UnaryOperator(_) => "UnaryOperator",
            Self::RangeVariableReference(_) => "RangeVariableReference",
            Self::EntityRangeVariableReference(_) => "EntityRangeVariableReference",
            Self::PropertyAccess(_) => "SingleValuePropertyAccess",
            Self::OpenPropertyAccess(_) => "SingleValueOpenPropertyAccess",
            Self::SingleNavigation(_) => "SingleNavigationNode",
            Self::SingleEntityCast(_) => "SingleEntityCast",
            Self::FunctionCall(_) => "SingleValueFunctionCall",
            Self::Any(_) => "Any",
            Self::All(_) => "All",
        }
    }

    /// Wrap in a conversion unless already of `target` type
    pub fn convert_to(self, target: &EdmTypeReference) -> Self {
        match self.type_reference() {
            Some(current) if current == target => self,
            _ => Self::Convert(ConvertNode {
                source: Box::new(self),
                type_ref: target.clone(),
            }),
        }
    }
}

/// Expression producing a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CollectionNode {
    CollectionNavigation(CollectionNavigationNode),
    CollectionPropertyAccess(CollectionPropertyAccessNode),
    EntityCollectionCast(EntityCollectionCastNode),
    /// Bound service operation returning a collection
    CollectionFunctionCall(CollectionFunctionCallNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionNavigationNode {
    pub source: Box<SingleValueNode>,
    pub navigation_property: String,
    pub item_type: EdmTypeReference,
    pub entity_set: Option<String>,
}

/// Collection-valued structural property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionPropertyAccessNode {
    pub source: Box<SingleValueNode>,
    pub property: String,
    pub item_type: EdmTypeReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCollectionCastNode {
    pub source: Box<CollectionNode>,
    pub item_type: EdmTypeReference,
    pub entity_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionFunctionCallNode {
    pub name: String,
    pub arguments: Vec<FunctionArgument>,
    pub source: Option<Box<QueryNode>>,
    pub item_type: EdmTypeReference,
    pub entity_set: Option<String>,
}

impl CollectionNode {
    pub fn item_type(&self) -> &EdmTypeReference {
        match self {
            Self::CollectionNavigation(node) => &node.item_type,
            Self::CollectionPropertyAccess(node) => &node.item_type,
            Self::EntityCollectionCast(node) => &node.item_type,
            Self::CollectionFunctionCall(node) => &node.item_type,
        }
    }

    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::CollectionNavigation(node) => node.entity_set.as_deref(),
            Self::CollectionPropertyAccess(_) => None,
            Self::EntityCollectionCast(node) => node.entity_set.as_deref(),
            Self::CollectionFunctionCall(node) => node.entity_set.as_deref(),
        }
    }

    pub fn is_entity_collection(&self) -> bool {
        self.item_type().is_entity()
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::CollectionNavigation(_) => "CollectionNavigationNode",
            Self::CollectionPropertyAccess(_) => "CollectionPropertyAccess",
            Self::EntityCollectionCast(_) => "EntityCollectionCast",
            Self::CollectionFunctionCall(_) => "CollectionFunctionCall",
        }
    }
}

/// Implicit `$it` or a lambda variable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RangeVariable {
    Entity(EntityRangeVariable),
    NonEntity(NonEntityRangeVariable),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRangeVariable {
    pub name: String,
    pub type_ref: EdmTypeReference,
    pub entity_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonEntityRangeVariable {
    pub name: String,
    pub type_ref: Option<EdmTypeReference>,
}

impl RangeVariable {
    /// Variable over items of `item_type`, entity-flavored when it is an entity
    pub fn for_item_type(
        name: impl Into<String>,
        item_type: Option<EdmTypeReference>,
        entity_set: Option<String>,
    ) -> Self {
        let name = name.into();
        match item_type {
            Some(type_ref) if type_ref.is_entity() => Self::Entity(EntityRangeVariable {
                name,
                type_ref,
                entity_set,
            }),
            type_ref => Self::NonEntity(NonEntityRangeVariable { name, type_ref }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Entity(variable) => &variable.name,
            Self::NonEntity(variable) => &variable.name,
        }
    }

    pub fn type_reference(&self) -> Option<&EdmTypeReference> {
        match self {
            Self::Entity(variable) => Some(&variable.type_ref),
            Self::NonEntity(variable) => variable.type_ref.as_ref(),
        }
    }

    /// Node referring to this variable
    pub fn reference(&self) -> SingleValueNode {
        match self {
            Self::Entity(variable) => {
                SingleValueNode::EntityRangeVariableReference(EntityRangeVariableReferenceNode {
                    name: variable.name.clone(),
                    type_ref: variable.type_ref.clone(),
                    entity_set: variable.entity_set.clone(),
                })
            }
            Self::NonEntity(variable) => SingleValueNode::RangeVariableReference(RangeVariableReferenceNode {
                name: variable.name.clone(),
                type_ref: variable.type_ref.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdmPrimitiveTypeKind;

    #[test]
    fn test_range_variable_flavor() {
        let entity = RangeVariable::for_item_type(
            "$it",
            Some(EdmTypeReference::entity("NS.Order")),
            Some("Orders".into()),
        );
        assert!(matches!(entity, RangeVariable::Entity(_)));
        assert_eq!(entity.reference().entity_set(), Some("Orders"));

        let scalar = RangeVariable::for_item_type(
            "t",
            Some(EdmTypeReference::primitive(EdmPrimitiveTypeKind::String, true)),
            None,
        );
        assert!(matches!(scalar, RangeVariable::NonEntity(_)));
        assert!(!scalar.reference().is_entity());
    }

    #[test]
    fn test_convert_to_same_type_is_noop() {
        let constant = SingleValueNode::Constant(ConstantNode::new(LiteralValue::Int32(1), "1"));
        let int32 = EdmTypeReference::primitive(EdmPrimitiveTypeKind::Int32, false);
        assert_eq!(constant.clone().convert_to(&int32), constant);

        let int64 = EdmTypeReference::primitive(EdmPrimitiveTypeKind::Int64, true);
        let converted = constant.convert_to(&int64);
        assert_eq!(converted.type_reference(), Some(&int64));
        assert_eq!(converted.kind_name(), "Convert");
    }
}
