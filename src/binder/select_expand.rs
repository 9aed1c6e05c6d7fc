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

//! `$select` / `$expand` binding
//!
//! Runs on a normalized expand tree: every term's path is root first and
//! ends at exactly one navigation property. Expansions are bound first, then
//! select paths are applied level by level on top of them.

use super::filter::FilterBinder;
use super::orderby::OrderByBinder;
use super::MetadataBinder;
use crate::ast::{ExpandTermToken, ExpandToken, PathSegmentToken, SelectToken};
use crate::core::error_code::{OD0051, OD0060, OD0061, OD0065, OD0067, OD0068, OD0069};
use crate::core::stack::with_stack;
use crate::core::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeReference, PropertyRef, SchemaType};
use crate::parser::IMPLICIT_RANGE_VARIABLE;
use crate::semantic::{
    ExpandedNavigationSelectItem, ODataPathSegment, PathSelectItem, RangeVariable, SegmentKind,
    SelectExpandClause, SelectItem, Selection,
};

/// Binds one element of a select path against a structured type
pub struct SelectPathSegmentTokenBinder;

impl SelectPathSegmentTokenBinder {
    /// Declared property first, then a bindable operation, then an open
    /// property. Unqualified names on open types are never taken as
    /// operations.
    pub fn bind_segment(
        model: &dyn EdmModel,
        token: &PathSegmentToken,
        type_name: &str,
        entity_set: Option<&str>,
    ) -> Result<ODataPathSegment> {
        let identifier = token.identifier.as_str();
        match model.find_property(type_name, identifier) {
            Some(PropertyRef::Structural(property)) => {
                return Ok(ODataPathSegment::new(
                    SegmentKind::Property {
                        name: property.name.clone(),
                    },
                    Some(property.type_ref.clone()),
                    None,
                    !property.type_ref.is_collection(),
                ));
            }
            Some(PropertyRef::Navigation(navigation)) => {
                return Ok(ODataPathSegment::new(
                    SegmentKind::NavigationProperty {
                        name: navigation.name.clone(),
                    },
                    Some(navigation.type_reference()),
                    model.navigation_target_set(entity_set, navigation),
                    !navigation.is_collection(),
                ));
            }
            None => {}
        }

        let is_open = model.is_open_type(type_name);
        if !is_open || token.is_namespace_or_container_qualified() {
            let binding_type = EdmTypeReference::entity(type_name);
            if let Some(import) = model.find_bindable_function_imports(identifier, &binding_type).first() {
                return Ok(ODataPathSegment::new(
                    SegmentKind::Operation {
                        name: identifier.to_string(),
                        parameters: Vec::new(),
                        is_side_effecting: import.is_side_effecting,
                        is_composable: import.is_composable,
                    },
                    import.return_type.clone(),
                    import.entity_set.clone(),
                    import.return_type.as_ref().is_none_or(|ty| !ty.is_collection()),
                ));
            }
        }

        if is_open {
            return Ok(ODataPathSegment::new(
                SegmentKind::OpenProperty {
                    name: identifier.to_string(),
                },
                None,
                None,
                true,
            ));
        }
        Err(ODataError::binding(
            OD0051,
            format!("could not find a property named '{identifier}' on type '{type_name}'"),
        ))
    }
}

/// Target of an expanded navigation
struct ExpandTarget {
    path: Vec<ODataPathSegment>,
    entity_type: String,
    entity_set: Option<String>,
    is_collection: bool,
}

/// Binds the path of one expand term: optional type casts, then exactly one
/// navigation property
pub struct SelectExpandPathBinder<'m> {
    model: &'m dyn EdmModel,
}

impl<'m> SelectExpandPathBinder<'m> {
    pub fn new(model: &'m dyn EdmModel) -> Self {
        Self { model }
    }

    fn bind_path(
        &self,
        path: &PathSegmentToken,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<ExpandTarget> {
        let mut segments = Vec::new();
        let mut current_type = entity_type.to_string();

        for segment in path.iter() {
            let identifier = segment.identifier.as_str();
            if let Some(cast) = type_cast(self.model, segment, &current_type, entity_set)? {
                segments.push(cast);
                current_type = identifier.to_string();
                continue;
            }

            let navigation = match self.model.find_property(&current_type, identifier) {
                Some(PropertyRef::Navigation(navigation)) => navigation,
                Some(PropertyRef::Structural(_)) => {
                    return Err(ODataError::binding(
                        OD0065,
                        format!("'{identifier}' is not a navigation property and cannot be expanded"),
                    ));
                }
                None => {
                    return Err(ODataError::binding(
                        OD0051,
                        format!("could not find a navigation property named '{identifier}' on type '{current_type}'"),
                    ));
                }
            };
            if segment.next().is_some() {
                return Err(ODataError::binding(
                    OD0065,
                    format!("an expand path must end at the navigation property '{identifier}'"),
                ));
            }

            let target_set = self.model.navigation_target_set(entity_set, navigation);
            segments.push(ODataPathSegment::new(
                SegmentKind::NavigationProperty {
                    name: navigation.name.clone(),
                },
                Some(navigation.type_reference()),
                target_set.clone(),
                !navigation.is_collection(),
            ));
            return Ok(ExpandTarget {
                path: segments,
                entity_type: navigation.target_type.clone(),
                entity_set: target_set,
                is_collection: navigation.is_collection(),
            });
        }

        Err(ODataError::binding(
            OD0060,
            format!("the expand path '{path}' must end with a navigation property"),
        ))
    }
}

/// Type cast segment when `segment` names an entity type related to `current_type`
fn type_cast(
    model: &dyn EdmModel,
    segment: &PathSegmentToken,
    current_type: &str,
    entity_set: Option<&str>,
) -> Result<Option<ODataPathSegment>> {
    if !segment.is_namespace_or_container_qualified() {
        return Ok(None);
    }
    match model.find_type(&segment.identifier) {
        Some(SchemaType::Entity(entity)) => {
            let name = entity.full_name();
            if !model.are_related(current_type, &name) {
                return Err(ODataError::binding(
                    OD0061,
                    format!("type '{name}' is not related to '{current_type}'"),
                ));
            }
            Ok(Some(ODataPathSegment::new(
                SegmentKind::TypeCast { type_name: name.clone() },
                Some(EdmTypeReference::entity(name)),
                entity_set.map(str::to_string),
                true,
            )))
        }
        _ => Ok(None),
    }
}

/// Applies `$select` paths to an already expanded clause
pub struct SelectBinder<'m> {
    model: &'m dyn EdmModel,
}

impl<'m> SelectBinder<'m> {
    pub fn new(model: &'m dyn EdmModel) -> Self {
        Self { model }
    }

    /// Apply root-first select paths to `clause`
    pub fn bind_select(
        &self,
        clause: &mut SelectExpandClause,
        select: &SelectToken,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<()> {
        for path in &select.properties {
            self.apply_path(clause, path, entity_type, entity_set)?;
        }
        Ok(())
    }

    fn apply_path(
        &self,
        clause: &mut SelectExpandClause,
        path: &PathSegmentToken,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<()> {
        if path.identifier == "*" && path.next().is_none() {
            clause.set_all_selected();
            return Ok(());
        }
        if let Some(namespace) = path.identifier.strip_suffix(".*") {
            if path.next().is_some() {
                return Err(ODataError::binding(
                    OD0069,
                    format!("'{}' must be the last segment of a select path", path.identifier),
                ));
            }
            clause.add_select_item(SelectItem::NamespaceQualifiedWildcard {
                namespace: namespace.to_string(),
            });
            return Ok(());
        }

        let mut segments = Vec::new();
        let mut current_type = entity_type.to_string();
        let mut cursor = Some(path);
        while let Some(segment) = cursor {
            match type_cast(self.model, segment, &current_type, entity_set)? {
                Some(cast) => {
                    segments.push(cast);
                    current_type = segment.identifier.clone();
                    cursor = segment.next();
                }
                None => break,
            }
        }
        let Some(segment) = cursor else {
            return Err(ODataError::binding(
                OD0060,
                format!("the select path '{path}' ends with a type segment"),
            ));
        };

        let bound = SelectPathSegmentTokenBinder::bind_segment(self.model, segment, &current_type, entity_set)?;
        let is_navigation = matches!(bound.kind, SegmentKind::NavigationProperty { .. });
        let target_type = bound.item_type().and_then(EdmTypeReference::structured_name).map(str::to_string);
        let target_set = bound.entity_set.clone();
        segments.push(bound);
        let path_string = segments.iter().map(ToString::to_string).collect::<Vec<_>>().join("/");

        match (segment.next(), is_navigation) {
            (Some(rest), true) => {
                clause.mark_expansions_only();
                let Some(child) = clause.find_expansion_mut(&path_string) else {
                    return Err(ODataError::binding(
                        OD0068,
                        format!("'{path_string}' must be expanded before selecting '{path}'"),
                    ));
                };
                let target_type = target_type.unwrap_or_default();
                self.apply_path(&mut child.select_and_expand, rest, &target_type, target_set.as_deref())
            }
            (Some(_), false) => Err(ODataError::binding(
                OD0069,
                format!("cannot select into '{path_string}'; only navigation properties can be traversed"),
            )),
            (None, _) => {
                clause.add_select_item(SelectItem::Path(PathSelectItem { segments }));
                if is_navigation {
                    if let Some(child) = clause.find_expansion_mut(&path_string) {
                        child.select_and_expand.select_all_unreached();
                    }
                }
                Ok(())
            }
        }
    }
}

/// Builds the bound select/expand clause for one resource
pub struct SelectExpandBinder<'a, 'm> {
    binder: &'a mut MetadataBinder<'m>,
}

impl<'a, 'm> SelectExpandBinder<'a, 'm> {
    pub fn new(binder: &'a mut MetadataBinder<'m>) -> Self {
        Self { binder }
    }

    /// Bind a normalized expand tree and a root-first select over `entity_type`
    pub fn bind(
        &mut self,
        expand: Option<&ExpandToken>,
        select: Option<&SelectToken>,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<SelectExpandClause> {
        let has_global_select = select.is_some();
        let start = if has_global_select {
            Selection::Unknown
        } else {
            Selection::All
        };
        let mut clause = self.bind_level(expand, has_global_select, start, entity_type, entity_set)?;
        if let Some(select) = select {
            SelectBinder::new(self.binder.model()).bind_select(&mut clause, select, entity_type, entity_set)?;
        }
        Ok(clause)
    }

    fn bind_level(
        &mut self,
        expand: Option<&ExpandToken>,
        has_global_select: bool,
        start: Selection,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<SelectExpandClause> {
        let mut clause = SelectExpandClause::new(start, None);
        let Some(expand) = expand else {
            return Ok(clause);
        };
        let mut items = Vec::with_capacity(expand.expand_terms.len());
        for term in &expand.expand_terms {
            items.push(self.bind_term(term, has_global_select, entity_type, entity_set)?);
        }
        if !items.is_empty() {
            clause.expansion = Some(items);
        }
        Ok(clause)
    }

    fn bind_term(
        &mut self,
        term: &ExpandTermToken,
        has_global_select: bool,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<ExpandedNavigationSelectItem> {
        let model = self.binder.model();
        let target = SelectExpandPathBinder::new(model).bind_path(&term.path_to_nav_prop, entity_type, entity_set)?;

        let start = if term.select_option.is_some() || has_global_select {
            Selection::Unknown
        } else {
            Selection::All
        };
        let mut child = with_stack(|| {
            self.bind_level(
                term.expand_option.as_ref(),
                has_global_select,
                start,
                &target.entity_type,
                target.entity_set.as_deref(),
            )
        })?;

        let has_collection_options = term.filter_option.is_some()
            || term.order_by_options.is_some()
            || term.top_option.is_some()
            || term.skip_option.is_some()
            || term.inline_count_option.is_some();
        if has_collection_options && !target.is_collection {
            return Err(ODataError::binding(
                OD0067,
                format!(
                    "query options on '{}' require a collection-valued navigation property",
                    term.path_to_nav_prop
                ),
            ));
        }

        let variable = RangeVariable::for_item_type(
            IMPLICIT_RANGE_VARIABLE,
            Some(EdmTypeReference::entity(target.entity_type.clone())),
            target.entity_set.clone(),
        );
        let filter = match &term.filter_option {
            Some(token) => Some(
                self.binder
                    .with_implicit_range_variable(variable.clone(), |b| FilterBinder::new(b).bind_filter(token))?,
            ),
            None => None,
        };
        let order_by = match &term.order_by_options {
            Some(tokens) => Some(
                self.binder
                    .with_implicit_range_variable(variable, |b| OrderByBinder::new(b).bind_order_by(tokens))?,
            ),
            None => None,
        };

        if let Some(select) = &term.select_option {
            SelectBinder::new(model).bind_select(
                &mut child,
                select,
                &target.entity_type,
                target.entity_set.as_deref(),
            )?;
        }

        Ok(ExpandedNavigationSelectItem {
            path: target.path,
            entity_set: target.entity_set,
            filter,
            order_by,
            top: term.top_option,
            skip: term.skip_option,
            inline_count: term.inline_count_option,
            select_and_expand: child,
        })
    }
}
