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

//! Property and navigation access on a bound parent

use crate::core::error_code::{OD0051, OD0059, OD0072};
use crate::core::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeReference, PropertyRef};
use crate::semantic::{
    CollectionNavigationNode, CollectionNode, CollectionPropertyAccessNode, QueryNode,
    SingleNavigationNode, SingleValueNode, SingleValueOpenPropertyAccessNode,
    SingleValuePropertyAccessNode,
};

pub struct EndPathBinder<'m> {
    model: &'m dyn EdmModel,
}

impl<'m> EndPathBinder<'m> {
    pub fn new(model: &'m dyn EdmModel) -> Self {
        Self { model }
    }

    /// Resolve `identifier` on `parent`: declared property, navigation, or
    /// a dynamic property of an open entity type
    pub fn bind_property_access(&self, identifier: &str, parent: QueryNode) -> Result<QueryNode> {
        let parent = match parent {
            QueryNode::Single(single) => single,
            QueryNode::Collection(collection) => {
                return Err(ODataError::binding(
                    OD0072,
                    format!(
                        "property '{identifier}' cannot be accessed on {}; use any or all to reach into a collection",
                        collection.kind_name()
                    ),
                ));
            }
        };

        let Some(parent_type) = parent.type_reference().cloned() else {
            return Ok(open_property(parent, identifier));
        };
        let Some(type_name) = parent_type.structured_name() else {
            return Err(ODataError::binding(
                OD0051,
                format!("type '{parent_type}' has no property '{identifier}'"),
            ));
        };

        match self.model.find_property(type_name, identifier) {
            Some(PropertyRef::Structural(property)) => Ok(match property.type_ref.element_type() {
                Some(item_type) => QueryNode::Collection(CollectionNode::CollectionPropertyAccess(
                    CollectionPropertyAccessNode {
                        source: Box::new(parent),
                        property: property.name.clone(),
                        item_type: item_type.clone(),
                    },
                )),
                None => QueryNode::Single(SingleValueNode::PropertyAccess(SingleValuePropertyAccessNode {
                    source: Box::new(parent),
                    property: property.name.clone(),
                    type_ref: property.type_ref.clone(),
                })),
            }),
            Some(PropertyRef::Navigation(navigation)) => {
                let entity_set = self.model.navigation_target_set(parent.entity_set(), navigation);
                Ok(if navigation.is_collection() {
                    QueryNode::Collection(CollectionNode::CollectionNavigation(CollectionNavigationNode {
                        source: Box::new(parent),
                        navigation_property: navigation.name.clone(),
                        item_type: EdmTypeReference::entity(navigation.target_type.clone()),
                        entity_set,
                    }))
                } else {
                    QueryNode::Single(SingleValueNode::SingleNavigation(SingleNavigationNode {
                        source: Box::new(parent),
                        navigation_property: navigation.name.clone(),
                        type_ref: navigation.type_reference(),
                        entity_set,
                    }))
                })
            }
            None if self.model.is_open_type(type_name) => {
                if parent_type.is_complex() {
                    return Err(ODataError::binding(
                        OD0059,
                        format!("'{identifier}' is not declared on open complex type '{type_name}'; dynamic properties are only supported on entity types"),
                    ));
                }
                Ok(open_property(parent, identifier))
            }
            None => Err(ODataError::binding(
                OD0051,
                format!("could not find a property named '{identifier}' on type '{type_name}'"),
            )),
        }
    }
}

fn open_property(parent: SingleValueNode, identifier: &str) -> QueryNode {
    QueryNode::Single(SingleValueNode::OpenPropertyAccess(SingleValueOpenPropertyAccessNode {
        source: Box::new(parent),
        name: identifier.to_string(),
    }))
}
