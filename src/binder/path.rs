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

//! Resource path binding
//!
//! Walks the raw segments left to right. Each segment is resolved against the
//! type produced by the one before it: entity sets and unbound operations
//! start a path, then properties, navigations, type casts, bound operations,
//! keys and the `$` segments follow.

use super::MetadataBinder;
use super::function_resolver::resolve_function_import;
use crate::ast::{QueryToken, ResourceSegmentToken};
use crate::config::UrlConvention;
use crate::core::error_code::{OD0053, OD0056, OD0057, OD0058, OD0061, OD0065, OD0066, OD0069};
use crate::core::{ODataError, Result};
use crate::model::{
    EdmModel, EdmPrimitiveTypeKind, EdmTypeReference, FunctionImport, PropertyRef, SchemaType,
    TypePromotion,
};
use crate::parser::path::{NamedValue, NamedValues, parse_named_values};
use crate::semantic::{
    ConstantNode, KeyValue, ODataPath, ODataPathSegment, OperationParameter, QueryNode, SegmentKind,
};
use rustc_hash::FxHashSet;

pub struct ODataPathBinder<'a, 'm> {
    binder: &'a mut MetadataBinder<'m>,
    convention: UrlConvention,
}

impl<'a, 'm> ODataPathBinder<'a, 'm> {
    pub fn new(binder: &'a mut MetadataBinder<'m>, convention: UrlConvention) -> Self {
        Self { binder, convention }
    }

    fn model(&self) -> &'m dyn EdmModel {
        self.binder.model()
    }

    pub fn bind_path(&mut self, tokens: &[ResourceSegmentToken]) -> Result<ODataPath> {
        let mut segments: Vec<ODataPathSegment> = Vec::with_capacity(tokens.len() + 1);
        // Set by a non-composable operation; nothing may follow it
        let mut closed_by: Option<String> = None;

        for (index, token) in tokens.iter().enumerate() {
            let is_last = index + 1 == tokens.len();
            if let Some(operation) = &closed_by {
                return Err(invalid_segment(
                    &token.identifier,
                    &format!("operation '{operation}' is not composable"),
                ));
            }

            let bound = match segments.len() {
                0 => self.bind_first(token, tokens.len())?,
                _ => self.bind_next(&segments, token, is_last)?,
            };
            for segment in bound {
                if let SegmentKind::Operation {
                    name,
                    is_composable: false,
                    ..
                } = &segment.kind
                {
                    closed_by = Some(name.clone());
                }
                log::trace!("bound path segment '{segment}'");
                segments.push(segment);
            }
        }
        Ok(ODataPath::new(segments))
    }

    fn bind_first(&mut self, token: &ResourceSegmentToken, total: usize) -> Result<Vec<ODataPathSegment>> {
        let identifier = token.identifier.as_str();
        if let Some(kind) = standalone_segment(identifier) {
            if total != 1 || token.parenthesized.is_some() {
                return Err(invalid_segment(identifier, "it must be the only segment of the path"));
            }
            return Ok(vec![ODataPathSegment::untyped(kind)]);
        }
        if identifier.starts_with('$') {
            return Err(invalid_segment(identifier, "it cannot start a resource path"));
        }

        if let Some(set) = self.model().find_entity_set(identifier) {
            let segment = ODataPathSegment::new(
                SegmentKind::EntitySet { name: set.name.clone() },
                Some(EdmTypeReference::collection(EdmTypeReference::entity(set.entity_type.clone()))),
                Some(set.name.clone()),
                false,
            );
            return self.with_parenthesized(segment, token);
        }

        let values = parenthesized_values(token)?;
        let names = parameter_names(identifier, &values)?;
        match resolve_function_import(self.model(), identifier, None, &names)? {
            Some(import) => Ok(vec![self.bind_operation(identifier, &import, values)?]),
            None => Err(ODataError::binding(
                OD0066,
                format!("resource not found for the segment '{identifier}'"),
            )),
        }
    }

    fn bind_next(
        &mut self,
        segments: &[ODataPathSegment],
        token: &ResourceSegmentToken,
        is_last: bool,
    ) -> Result<Vec<ODataPathSegment>> {
        let identifier = token.identifier.as_str();
        let (previous, after_links) = match segments {
            [.., base, last] if last.kind == SegmentKind::Links => (base.clone(), true),
            [.., last] => (last.clone(), false),
            [] => return Err(ODataError::internal("path binding lost its previous segment")),
        };

        if matches!(
            previous.kind,
            SegmentKind::Count | SegmentKind::Value | SegmentKind::Metadata | SegmentKind::Batch
        ) {
            return Err(invalid_segment(identifier, &format!("nothing may follow '{previous}'")));
        }

        if identifier.starts_with('$') {
            if after_links {
                return Err(invalid_segment(identifier, "'$links' must be followed by a navigation property"));
            }
            if token.parenthesized.is_some() {
                return Err(invalid_segment(identifier, "system segments take no parentheses"));
            }
            return self.bind_system_segment(&previous, identifier, is_last).map(|s| vec![s]);
        }

        if self.convention == UrlConvention::KeyAsSegment
            && !after_links
            && token.parenthesized.is_none()
            && is_key_candidate(&previous)
            && !self.names_type_or_member(&previous, identifier)
        {
            return Ok(vec![self.bind_key(&previous, identifier)?]);
        }

        let Some(previous_type) = previous.edm_type.clone() else {
            return Err(invalid_segment(identifier, &format!("'{previous}' has no declared type")));
        };

        if identifier.contains('.') {
            if after_links {
                return Err(invalid_segment(identifier, "'$links' must be followed by a navigation property"));
            }
            if let Some(SchemaType::Entity(entity)) = self.model().find_type(identifier) {
                let segment = self.bind_type_cast(&previous, entity.full_name())?;
                return self.with_parenthesized(segment, token);
            }
            return self.bind_bound_operation(&previous, &previous_type, token).map(|s| vec![s]);
        }

        let Some(type_name) = previous.item_type().and_then(EdmTypeReference::structured_name) else {
            return self.bind_bound_operation(&previous, &previous_type, token).map(|s| vec![s]);
        };

        match self.model().find_property(type_name, identifier) {
            Some(PropertyRef::Navigation(navigation)) => {
                if !previous.single_result {
                    return Err(invalid_segment(
                        identifier,
                        &format!("'{previous}' is a collection; select a single entity with a key first"),
                    ));
                }
                let single_result = !navigation.is_collection();
                let segment = ODataPathSegment::new(
                    SegmentKind::NavigationProperty {
                        name: navigation.name.clone(),
                    },
                    Some(navigation.type_reference()),
                    self.model()
                        .navigation_target_set(previous.entity_set.as_deref(), navigation),
                    single_result,
                );
                self.with_parenthesized(segment, token)
            }
            _ if after_links => Err(invalid_segment(
                identifier,
                "'$links' must be followed by a navigation property",
            )),
            Some(PropertyRef::Structural(property)) => {
                if !previous.single_result {
                    return Err(invalid_segment(
                        identifier,
                        &format!("'{previous}' is a collection; select a single entity with a key first"),
                    ));
                }
                let segment = ODataPathSegment::new(
                    SegmentKind::Property {
                        name: property.name.clone(),
                    },
                    Some(property.type_ref.clone()),
                    None,
                    !property.type_ref.is_collection(),
                );
                self.with_parenthesized(segment, token)
            }
            None => match self.bind_bound_operation(&previous, &previous_type, token) {
                Ok(segment) => Ok(vec![segment]),
                Err(err) if err.code() == OD0066 && previous.single_result && self.model().is_open_type(type_name) => {
                    let segment = ODataPathSegment::new(
                        SegmentKind::OpenProperty {
                            name: identifier.to_string(),
                        },
                        None,
                        None,
                        true,
                    );
                    self.with_parenthesized(segment, token)
                }
                Err(err) => Err(err),
            },
        }
    }

    fn bind_system_segment(
        &self,
        previous: &ODataPathSegment,
        identifier: &str,
        is_last: bool,
    ) -> Result<ODataPathSegment> {
        match identifier {
            "$count" => {
                if previous.single_result {
                    return Err(invalid_segment(identifier, &format!("'{previous}' is not a collection")));
                }
                Ok(ODataPathSegment::new(
                    SegmentKind::Count,
                    Some(EdmTypeReference::primitive(EdmPrimitiveTypeKind::Int32, false)),
                    None,
                    true,
                ))
            }
            "$value" => {
                let allowed = previous.single_result
                    && match &previous.edm_type {
                        Some(ty) => ty.is_primitive() || ty.is_entity(),
                        None => matches!(previous.kind, SegmentKind::OpenProperty { .. }),
                    };
                if !allowed {
                    return Err(invalid_segment(
                        identifier,
                        "'$value' requires a primitive property or a single entity",
                    ));
                }
                Ok(ODataPathSegment::new(
                    SegmentKind::Value,
                    previous.edm_type.clone(),
                    previous.entity_set.clone(),
                    true,
                ))
            }
            "$links" => {
                if !(previous.single_result && previous.edm_type.as_ref().is_some_and(EdmTypeReference::is_entity)) {
                    return Err(invalid_segment(identifier, "'$links' requires a single entity"));
                }
                if is_last {
                    return Err(invalid_segment(identifier, "'$links' must be followed by a navigation property"));
                }
                Ok(ODataPathSegment::untyped(SegmentKind::Links))
            }
            "$metadata" | "$batch" => Err(invalid_segment(identifier, "it must be the only segment of the path")),
            _ => Err(invalid_segment(identifier, "unknown system segment")),
        }
    }

    fn bind_type_cast(&self, previous: &ODataPathSegment, target: String) -> Result<ODataPathSegment> {
        let related = previous
            .item_type()
            .filter(|ty| ty.is_entity())
            .and_then(EdmTypeReference::structured_name)
            .is_some_and(|name| self.model().are_related(name, &target));
        if !related {
            return Err(ODataError::binding(
                OD0061,
                format!("'{previous}' cannot be cast to unrelated type '{target}'"),
            ));
        }
        let item = EdmTypeReference::entity(target.clone());
        let edm_type = if previous.single_result {
            item
        } else {
            EdmTypeReference::collection(item)
        };
        Ok(ODataPathSegment::new(
            SegmentKind::TypeCast { type_name: target },
            Some(edm_type),
            previous.entity_set.clone(),
            previous.single_result,
        ))
    }

    fn bind_bound_operation(
        &mut self,
        previous: &ODataPathSegment,
        binding_type: &EdmTypeReference,
        token: &ResourceSegmentToken,
    ) -> Result<ODataPathSegment> {
        let identifier = token.identifier.as_str();
        let values = parenthesized_values(token)?;
        let names = parameter_names(identifier, &values)?;
        match resolve_function_import(self.model(), identifier, Some(binding_type), &names)? {
            Some(import) => {
                let mut segment = self.bind_operation(identifier, &import, values)?;
                if segment.entity_set.is_none() && segment.item_type().is_some_and(EdmTypeReference::is_entity) {
                    segment.entity_set = previous.entity_set.clone();
                }
                Ok(segment)
            }
            None => Err(ODataError::binding(
                OD0066,
                format!("resource not found for the segment '{identifier}' after '{previous}'"),
            )),
        }
    }

    fn bind_operation(
        &mut self,
        identifier: &str,
        import: &FunctionImport,
        values: NamedValues,
    ) -> Result<ODataPathSegment> {
        if import.is_side_effecting && !values.is_empty() {
            return Err(ODataError::binding(
                OD0057,
                format!("action '{identifier}' cannot take parameters in the URL"),
            ));
        }

        let mut parameters = Vec::with_capacity(values.len());
        for NamedValue { name, value } in values {
            let Some(name) = name else {
                return Err(unnamed_parameter(identifier));
            };
            let Some(declared) = import.non_binding_parameters().iter().find(|p| p.name == name) else {
                return Err(ODataError::binding(
                    OD0056,
                    format!("'{identifier}' has no parameter named '{name}'"),
                ));
            };
            let bound = match self.binder.bind(&value)? {
                QueryNode::Single(single) => single,
                QueryNode::Collection(collection) => {
                    return Err(ODataError::binding(
                        OD0053,
                        format!("parameter '{name}' must be a single value, found {}", collection.kind_name()),
                    ));
                }
            };
            let bound = match bound.type_reference() {
                Some(actual) if actual.is_equivalent_to(&declared.type_ref) => bound,
                Some(actual) if !TypePromotion::can_convert(actual, &declared.type_ref) => {
                    return Err(ODataError::binding(
                        OD0053,
                        format!("parameter '{name}' of '{identifier}' expects {}, found {actual}", declared.type_ref),
                    ));
                }
                _ => bound.convert_to(&declared.type_ref),
            };
            parameters.push(OperationParameter { name, value: bound });
        }

        let single_result = import.return_type.as_ref().is_none_or(|ty| !ty.is_collection());
        Ok(ODataPathSegment::new(
            SegmentKind::Operation {
                name: identifier.to_string(),
                parameters,
                is_side_effecting: import.is_side_effecting,
                is_composable: import.is_composable && import.return_type.is_some(),
            },
            import.return_type.clone(),
            import.entity_set.clone(),
            single_result,
        ))
    }

    /// Apply `(..)` after a non-operation segment: a key on an entity
    /// collection, nothing for `()` on a collection, an error otherwise
    fn with_parenthesized(
        &mut self,
        segment: ODataPathSegment,
        token: &ResourceSegmentToken,
    ) -> Result<Vec<ODataPathSegment>> {
        let Some(text) = token.parenthesized.as_deref() else {
            return Ok(vec![segment]);
        };
        if segment.single_result {
            return Err(invalid_segment(
                &token.identifier,
                "parentheses are only allowed after a collection or an operation",
            ));
        }
        if text.trim().is_empty() {
            return Ok(vec![segment]);
        }
        if !is_key_candidate(&segment) {
            return Err(invalid_segment(&token.identifier, "only entity collections can be keyed"));
        }
        let key = self.bind_key(&segment, text)?;
        Ok(vec![segment, key])
    }

    fn bind_key(&self, collection: &ODataPathSegment, text: &str) -> Result<ODataPathSegment> {
        let Some(item_type) = collection.item_type().filter(|ty| ty.is_entity()).cloned() else {
            return Err(invalid_key(text, &format!("'{collection}' is not an entity collection")));
        };
        let type_name = item_type.structured_name().unwrap_or_default();
        let key_properties = self.model().key_properties(type_name);
        let values = parse_named_values(text)?;
        if values.len() != key_properties.len() {
            return Err(invalid_key(
                text,
                &format!("'{type_name}' has {} key properties, found {} values", key_properties.len(), values.len()),
            ));
        }

        let mut seen = FxHashSet::default();
        let mut bound = Vec::with_capacity(values.len());
        for NamedValue { name, value } in values {
            let property = match name.as_deref() {
                None => key_properties.first().copied(),
                Some(name) => key_properties.iter().copied().find(|p| p.name == name),
            }
            .ok_or_else(|| invalid_key(text, &format!("'{}' is not a key property", name.as_deref().unwrap_or(""))))?;
            if !seen.insert(property.name.as_str()) {
                return Err(invalid_key(text, &format!("'{}' is given more than once", property.name)));
            }

            let constant = match value {
                QueryToken::Literal(literal) => ConstantNode::new(literal.value, literal.original_text),
                QueryToken::ParameterAlias(alias) => {
                    return Err(ODataError::binding(
                        OD0069,
                        format!("parameter alias '{}' cannot be used as a key value", alias.alias),
                    ));
                }
                other => return Err(invalid_key(text, &format!("unexpected {}", other.kind_name()))),
            };
            let convertible = constant
                .type_ref
                .as_ref()
                .is_some_and(|ty| TypePromotion::can_convert(ty, &property.type_ref));
            if !convertible {
                return Err(invalid_key(
                    text,
                    &format!("'{}' cannot be used for key property '{}' of type {}", constant.literal_text, property.name, property.type_ref),
                ));
            }
            bound.push(KeyValue {
                property: property.name.clone(),
                value: constant,
            });
        }

        Ok(ODataPathSegment::new(
            SegmentKind::Key { values: bound },
            Some(item_type.with_nullable(false)),
            collection.entity_set.clone(),
            true,
        ))
    }

    /// In key-as-segment URLs, identifiers that name a type, property or
    /// operation are not keys
    fn names_type_or_member(&self, previous: &ODataPathSegment, identifier: &str) -> bool {
        let model = self.model();
        if model.find_type(identifier).is_some() {
            return true;
        }
        if previous
            .item_type()
            .and_then(EdmTypeReference::structured_name)
            .is_some_and(|name| model.find_property(name, identifier).is_some())
        {
            return true;
        }
        previous
            .edm_type
            .as_ref()
            .is_some_and(|ty| !model.find_bindable_function_imports(identifier, ty).is_empty())
    }
}

fn standalone_segment(identifier: &str) -> Option<SegmentKind> {
    match identifier {
        "$metadata" => Some(SegmentKind::Metadata),
        "$batch" => Some(SegmentKind::Batch),
        _ => None,
    }
}

fn is_key_candidate(segment: &ODataPathSegment) -> bool {
    !segment.single_result && segment.edm_type.as_ref().is_some_and(EdmTypeReference::is_entity_collection)
}

fn parenthesized_values(token: &ResourceSegmentToken) -> Result<NamedValues> {
    match token.parenthesized.as_deref() {
        Some(text) => parse_named_values(text),
        None => Ok(NamedValues::new()),
    }
}

fn parameter_names(identifier: &str, values: &NamedValues) -> Result<Vec<String>> {
    values
        .iter()
        .map(|value| value.name.clone().ok_or_else(|| unnamed_parameter(identifier)))
        .collect()
}

fn unnamed_parameter(identifier: &str) -> ODataError {
    ODataError::binding(
        OD0056,
        format!("parameters of operation '{identifier}' must be named"),
    )
}

fn invalid_segment(identifier: &str, detail: &str) -> ODataError {
    ODataError::binding(
        OD0065,
        format!("the segment '{identifier}' is not valid here: {detail}"),
    )
}

fn invalid_key(text: &str, detail: &str) -> ODataError {
    ODataError::binding(OD0058, format!("invalid key '({text})': {detail}"))
}
