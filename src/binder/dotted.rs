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

//! Qualified names in expressions: type casts, or parameterless operations

use super::BindMethod;
use crate::ast::{DottedIdentifierToken, FunctionCallToken, QueryToken};
use crate::core::error_code::{OD0052, OD0061, OD0069, OD0070};
use crate::core::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeReference, SchemaType};
use crate::semantic::{
    CollectionNode, EntityCollectionCastNode, QueryNode, SingleEntityCastNode, SingleValueNode,
};

pub struct DottedIdentifierBinder<'m> {
    model: &'m dyn EdmModel,
}

impl<'m> DottedIdentifierBinder<'m> {
    pub fn new(model: &'m dyn EdmModel) -> Self {
        Self { model }
    }

    /// Bind `NS.Type` against an already bound `parent`.
    ///
    /// Names that are not entity types are retried as a bound operation
    /// call without arguments through `bind`.
    pub fn bind_dotted_identifier(
        &self,
        dotted: &DottedIdentifierToken,
        parent: QueryNode,
        bind: &mut BindMethod<'_>,
    ) -> Result<QueryNode> {
        match self.model.find_type(&dotted.identifier) {
            Some(SchemaType::Entity(entity)) => self.bind_cast(entity.full_name(), parent),
            Some(SchemaType::Complex(_)) => Err(ODataError::binding(
                OD0069,
                format!("casting to complex type '{}' is not supported", dotted.identifier),
            )),
            None => {
                let call = QueryToken::FunctionCall(FunctionCallToken {
                    name: dotted.identifier.clone(),
                    arguments: Vec::new(),
                    parent: dotted.parent.clone(),
                });
                bind(&call).map_err(|err| {
                    if err.code() == OD0070 {
                        ODataError::binding(
                            OD0052,
                            format!("'{}' is neither a type nor an operation in the model", dotted.identifier),
                        )
                    } else {
                        err
                    }
                })
            }
        }
    }

    fn bind_cast(&self, target: String, parent: QueryNode) -> Result<QueryNode> {
        match parent {
            QueryNode::Single(source) => {
                let related = source
                    .type_reference()
                    .filter(|ty| ty.is_entity())
                    .and_then(EdmTypeReference::structured_name)
                    .is_some_and(|name| self.model.are_related(name, &target));
                if !related {
                    return Err(incompatible_cast(&target, source.kind_name()));
                }
                let entity_set = source.entity_set().map(str::to_string);
                Ok(QueryNode::Single(SingleValueNode::SingleEntityCast(SingleEntityCastNode {
                    source: Box::new(source),
                    type_ref: EdmTypeReference::entity(target),
                    entity_set,
                })))
            }
            QueryNode::Collection(source) => {
                let related = source.is_entity_collection()
                    && source
                        .item_type()
                        .structured_name()
                        .is_some_and(|name| self.model.are_related(name, &target));
                if !related {
                    return Err(incompatible_cast(&target, source.kind_name()));
                }
                let entity_set = source.entity_set().map(str::to_string);
                Ok(QueryNode::Collection(CollectionNode::EntityCollectionCast(EntityCollectionCastNode {
                    source: Box::new(source),
                    item_type: EdmTypeReference::entity(target),
                    entity_set,
                })))
            }
        }
    }
}

fn incompatible_cast(target: &str, source_kind: &str) -> ODataError {
    ODataError::binding(
        OD0061,
        format!("cannot cast {source_kind} to unrelated type '{target}'"),
    )
}
