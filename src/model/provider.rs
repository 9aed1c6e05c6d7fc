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

//! Model provider trait for EDM metadata
//!
//! The binder never owns metadata. It queries an [`EdmModel`] for types,
//! properties, entity sets and function imports, and checks for the optional
//! [`UriParserModelExtensions`] capability before resolving operations itself.

use super::types::{
    ComplexType, EdmPrimitiveTypeKind, EdmTypeReference, EntitySet, EntityType, FunctionImport,
    NavigationProperty, PropertyRef, SchemaType, StructuralProperty,
};
use crate::core::Result;

/// Bound on base-type walks, so a cyclic hierarchy cannot loop forever
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Metadata queries the binder relies on
pub trait EdmModel {
    /// Name of the default entity container
    fn container_name(&self) -> &str;

    fn find_entity_type(&self, qualified_name: &str) -> Option<&EntityType>;

    fn find_complex_type(&self, qualified_name: &str) -> Option<&ComplexType>;

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet>;

    /// All function imports declared under the unqualified `name`
    fn find_function_imports(&self, name: &str) -> Vec<&FunctionImport>;

    fn entity_sets(&self) -> Vec<&EntitySet>;

    /// Optional override for operation resolution
    fn uri_parser_extensions(&self) -> Option<&dyn UriParserModelExtensions> {
        None
    }

    /// Find an entity or complex type by qualified name
    fn find_type(&self, qualified_name: &str) -> Option<SchemaType<'_>> {
        self.find_entity_type(qualified_name)
            .map(SchemaType::Entity)
            .or_else(|| self.find_complex_type(qualified_name).map(SchemaType::Complex))
    }

    /// Resolve any type name (`Edm.Int32`, `NS.Customer`, `Collection(..)`)
    fn find_type_reference(&self, name: &str, nullable: bool) -> Option<EdmTypeReference> {
        if let Some(inner) = name
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return self
                .find_type_reference(inner, nullable)
                .map(EdmTypeReference::collection);
        }
        if let Some(kind) = EdmPrimitiveTypeKind::from_full_name(name) {
            return Some(EdmTypeReference::primitive(kind, nullable));
        }
        self.find_type(name).map(|ty| ty.type_reference(nullable))
    }

    /// Walk a type and its ancestors, nearest first
    fn type_hierarchy(&self, qualified_name: &str) -> Vec<SchemaType<'_>> {
        let mut chain = Vec::new();
        let mut current = self.find_type(qualified_name);
        while let Some(ty) = current {
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                break;
            }
            current = ty.base_type().and_then(|base| self.find_type(base));
            chain.push(ty);
        }
        chain
    }

    /// Find a declared property on a structured type or any of its bases
    fn find_property(&self, type_name: &str, property: &str) -> Option<PropertyRef<'_>> {
        self.type_hierarchy(type_name)
            .into_iter()
            .find_map(|ty| match ty {
                SchemaType::Entity(entity) => entity
                    .properties
                    .get(property)
                    .map(PropertyRef::Structural)
                    .or_else(|| {
                        entity
                            .navigation_properties
                            .get(property)
                            .map(PropertyRef::Navigation)
                    }),
                SchemaType::Complex(complex) => {
                    complex.properties.get(property).map(PropertyRef::Structural)
                }
            })
    }

    /// Key properties of an entity type, inherited from the root of its hierarchy
    fn key_properties(&self, entity_type: &str) -> Vec<&StructuralProperty> {
        let hierarchy = self.type_hierarchy(entity_type);
        let declaring = hierarchy.iter().rev().find_map(|ty| match ty {
            SchemaType::Entity(entity) if !entity.key.is_empty() => Some(*entity),
            _ => None,
        });
        let Some(declaring) = declaring else {
            return Vec::new();
        };
        declaring
            .key
            .iter()
            .filter_map(|name| match self.find_property(entity_type, name) {
                Some(PropertyRef::Structural(property)) => Some(property),
                _ => None,
            })
            .collect()
    }

    /// Reflexive subtype test
    fn is_derived_from(&self, derived: &str, base: &str) -> bool {
        self.type_hierarchy(derived)
            .iter()
            .any(|ty| ty.full_name() == base)
    }

    /// True when either type derives from the other
    fn are_related(&self, a: &str, b: &str) -> bool {
        self.is_derived_from(a, b) || self.is_derived_from(b, a)
    }

    /// Open if the type or any ancestor is declared open
    fn is_open_type(&self, type_name: &str) -> bool {
        self.type_hierarchy(type_name)
            .iter()
            .any(SchemaType::declares_open)
    }

    /// Strip a `Container.` qualifier from an operation name
    fn operation_short_name<'n>(&self, name: &'n str) -> Option<&'n str> {
        match name.rsplit_once('.') {
            Some((container, short)) if container == self.container_name() => Some(short),
            Some(_) => None,
            None => Some(name),
        }
    }

    /// Non-bindable operations named `name` (optionally container-qualified)
    fn find_unbound_function_imports(&self, name: &str) -> Vec<&FunctionImport> {
        let Some(short) = self.operation_short_name(name) else {
            return Vec::new();
        };
        self.find_function_imports(short)
            .into_iter()
            .filter(|import| !import.is_bindable)
            .collect()
    }

    /// Bindable operations whose binding parameter accepts `binding_type`.
    ///
    /// A binding parameter declared on a base type accepts derived types, and a
    /// collection binding parameter accepts collections of derived types.
    fn find_bindable_function_imports(
        &self,
        name: &str,
        binding_type: &EdmTypeReference,
    ) -> Vec<&FunctionImport> {
        let Some(short) = self.operation_short_name(name) else {
            return Vec::new();
        };
        self.find_function_imports(short)
            .into_iter()
            .filter(|import| {
                import
                    .binding_parameter()
                    .is_some_and(|param| self.is_assignable(binding_type, &param.type_ref))
            })
            .collect()
    }

    /// Whether a value of type `source` can be passed where `target` is declared
    fn is_assignable(&self, source: &EdmTypeReference, target: &EdmTypeReference) -> bool {
        match (source, target) {
            (EdmTypeReference::Collection { element: s }, EdmTypeReference::Collection { element: t }) => {
                self.is_assignable(s, t)
            }
            (EdmTypeReference::Entity { name: s, .. }, EdmTypeReference::Entity { name: t, .. })
            | (EdmTypeReference::Complex { name: s, .. }, EdmTypeReference::Complex { name: t, .. }) => {
                self.is_derived_from(s, t)
            }
            _ => source.is_equivalent_to(target),
        }
    }

    /// Entity set reached by following `navigation` from `source_set`.
    ///
    /// Uses the source set's declared navigation targets, falling back to the
    /// only entity set whose element type matches the target.
    fn navigation_target_set(
        &self,
        source_set: Option<&str>,
        navigation: &NavigationProperty,
    ) -> Option<String> {
        if let Some(target) = source_set
            .and_then(|name| self.find_entity_set(name))
            .and_then(|set| set.navigation_targets.get(&navigation.name))
        {
            return Some(target.clone());
        }
        let mut candidates = self
            .entity_sets()
            .into_iter()
            .filter(|set| self.is_derived_from(&navigation.target_type, &set.entity_type));
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only.name.clone()),
            _ => None,
        }
    }
}

/// Capability a model may expose to take over operation resolution
pub trait UriParserModelExtensions {
    /// Resolve an operation by name, binding type and URL parameter names.
    ///
    /// `Ok(None)` reports "not found"; the default overload resolver is not
    /// consulted when this capability is present.
    fn find_function_import(
        &self,
        name: &str,
        binding_type: Option<&EdmTypeReference>,
        parameter_names: &[String],
    ) -> Result<Option<FunctionImport>>;
}
