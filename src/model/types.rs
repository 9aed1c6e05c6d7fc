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

//! EDM type system definitions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive EDM types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdmPrimitiveTypeKind {
    Binary,
    Boolean,
    Byte,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    Time,
    Stream,
}

impl EdmPrimitiveTypeKind {
    pub const ALL: [EdmPrimitiveTypeKind; 16] = [
        Self::Binary,
        Self::Boolean,
        Self::Byte,
        Self::DateTime,
        Self::DateTimeOffset,
        Self::Decimal,
        Self::Double,
        Self::Guid,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::SByte,
        Self::Single,
        Self::String,
        Self::Time,
        Self::Stream,
    ];

    /// Unqualified name (e.g. "Int32")
    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::DateTime => "DateTime",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::Decimal => "Decimal",
            Self::Double => "Double",
            Self::Guid => "Guid",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::SByte => "SByte",
            Self::Single => "Single",
            Self::String => "String",
            Self::Time => "Time",
            Self::Stream => "Stream",
        }
    }

    /// Qualified name (e.g. "Edm.Int32")
    pub fn full_name(self) -> String {
        format!("Edm.{}", self.name())
    }

    /// Resolve `Edm.X` (the `Edm.` prefix is required)
    pub fn from_full_name(name: &str) -> Option<Self> {
        let short = name.strip_prefix("Edm.")?;
        Self::ALL.iter().copied().find(|kind| kind.name() == short)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Single
                | Self::Double
                | Self::Decimal
        )
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64
        )
    }
}

impl fmt::Display for EdmPrimitiveTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edm.{}", self.name())
    }
}

/// Reference to an EDM type, with nullability.
///
/// Structured types are referenced by qualified name and resolved through the
/// model on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EdmTypeReference {
    Primitive {
        primitive: EdmPrimitiveTypeKind,
        nullable: bool,
    },
    Complex {
        name: String,
        nullable: bool,
    },
    Entity {
        name: String,
        nullable: bool,
    },
    Collection {
        element: Box<EdmTypeReference>,
    },
}

impl EdmTypeReference {
    pub fn primitive(primitive: EdmPrimitiveTypeKind, nullable: bool) -> Self {
        Self::Primitive {
            primitive,
            nullable,
        }
    }

    pub fn boolean(nullable: bool) -> Self {
        Self::primitive(EdmPrimitiveTypeKind::Boolean, nullable)
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity {
            name: name.into(),
            nullable: true,
        }
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::Complex {
            name: name.into(),
            nullable: true,
        }
    }

    pub fn collection(element: EdmTypeReference) -> Self {
        Self::Collection {
            element: Box::new(element),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Primitive { nullable, .. }
            | Self::Complex { nullable, .. }
            | Self::Entity { nullable, .. } => *nullable,
            Self::Collection { .. } => true,
        }
    }

    /// Same type with the given nullability (collections are unchanged)
    pub fn with_nullable(&self, value: bool) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Primitive { nullable, .. }
            | Self::Complex { nullable, .. }
            | Self::Entity { nullable, .. } => *nullable = value,
            Self::Collection { .. } => {}
        }
        copy
    }

    pub fn as_primitive(&self) -> Option<EdmPrimitiveTypeKind> {
        match self {
            Self::Primitive { primitive, .. } => Some(*primitive),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive { .. })
    }

    pub fn is_boolean(&self) -> bool {
        self.as_primitive() == Some(EdmPrimitiveTypeKind::Boolean)
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Self::Entity { .. })
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex { .. })
    }

    pub fn is_structured(&self) -> bool {
        self.is_entity() || self.is_complex()
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }

    pub fn is_entity_collection(&self) -> bool {
        self.element_type().is_some_and(EdmTypeReference::is_entity)
    }

    pub fn element_type(&self) -> Option<&EdmTypeReference> {
        match self {
            Self::Collection { element } => Some(element),
            _ => None,
        }
    }

    /// Qualified name of the referenced entity or complex type
    pub fn structured_name(&self) -> Option<&str> {
        match self {
            Self::Entity { name, .. } | Self::Complex { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Equality ignoring nullability
    pub fn is_equivalent_to(&self, other: &EdmTypeReference) -> bool {
        match (self, other) {
            (Self::Primitive { primitive: a, .. }, Self::Primitive { primitive: b, .. }) => a == b,
            (Self::Complex { name: a, .. }, Self::Complex { name: b, .. })
            | (Self::Entity { name: a, .. }, Self::Entity { name: b, .. }) => a == b,
            (Self::Collection { element: a }, Self::Collection { element: b }) => {
                a.is_equivalent_to(b)
            }
            _ => false,
        }
    }

    /// Qualified type name, e.g. `Edm.String` or `Collection(NS.Order)`
    pub fn full_name(&self) -> String {
        match self {
            Self::Primitive { primitive, .. } => primitive.full_name(),
            Self::Complex { name, .. } | Self::Entity { name, .. } => name.clone(),
            Self::Collection { element } => format!("Collection({})", element.full_name()),
        }
    }
}

impl fmt::Display for EdmTypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Declared structural (non-navigation) property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralProperty {
    pub name: String,
    pub type_ref: EdmTypeReference,
}

/// Cardinality of a navigation property's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    ZeroOrOne,
    One,
    Many,
}

/// Declared navigation property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    /// Qualified name of the target entity type
    pub target_type: String,
    pub multiplicity: Multiplicity,
}

impl NavigationProperty {
    pub fn is_collection(&self) -> bool {
        self.multiplicity == Multiplicity::Many
    }

    /// Type of the value reached by following this property
    pub fn type_reference(&self) -> EdmTypeReference {
        let target = EdmTypeReference::Entity {
            name: self.target_type.clone(),
            nullable: self.multiplicity != Multiplicity::One,
        };
        if self.is_collection() {
            EdmTypeReference::collection(target)
        } else {
            target
        }
    }
}

/// Entity type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub namespace: String,
    pub name: String,
    pub base_type: Option<String>,
    /// Key property names; empty on derived types (inherited)
    pub key: Vec<String>,
    pub is_open: bool,
    pub is_abstract: bool,
    pub properties: IndexMap<String, StructuralProperty>,
    pub navigation_properties: IndexMap<String, NavigationProperty>,
}

impl EntityType {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// Complex type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexType {
    pub namespace: String,
    pub name: String,
    pub base_type: Option<String>,
    pub is_open: bool,
    pub properties: IndexMap<String, StructuralProperty>,
}

impl ComplexType {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// Borrowed view of a named structured type
#[derive(Debug, Clone, Copy)]
pub enum SchemaType<'a> {
    Entity(&'a EntityType),
    Complex(&'a ComplexType),
}

impl<'a> SchemaType<'a> {
    pub fn base_type(&self) -> Option<&'a str> {
        match self {
            Self::Entity(entity) => entity.base_type.as_deref(),
            Self::Complex(complex) => complex.base_type.as_deref(),
        }
    }

    pub fn declares_open(&self) -> bool {
        match self {
            Self::Entity(entity) => entity.is_open,
            Self::Complex(complex) => complex.is_open,
        }
    }

    pub fn full_name(&self) -> String {
        match self {
            Self::Entity(entity) => entity.full_name(),
            Self::Complex(complex) => complex.full_name(),
        }
    }

    /// Reference to this type
    pub fn type_reference(&self, nullable: bool) -> EdmTypeReference {
        match self {
            Self::Entity(entity) => EdmTypeReference::Entity {
                name: entity.full_name(),
                nullable,
            },
            Self::Complex(complex) => EdmTypeReference::Complex {
                name: complex.full_name(),
                nullable,
            },
        }
    }
}

/// Property found on a structured type
#[derive(Debug, Clone, Copy)]
pub enum PropertyRef<'a> {
    Structural(&'a StructuralProperty),
    Navigation(&'a NavigationProperty),
}

impl PropertyRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Structural(property) => &property.name,
            Self::Navigation(property) => &property.name,
        }
    }
}

/// Entity set in the default container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    /// Qualified name of the element entity type
    pub entity_type: String,
    /// Navigation property name to target entity set name
    #[serde(default)]
    pub navigation_targets: IndexMap<String, String>,
}

/// Function import parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub type_ref: EdmTypeReference,
}

/// Service operation (function or action) declared in the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionImport {
    pub name: String,
    pub return_type: Option<EdmTypeReference>,
    /// Entity set of an entity-returning operation
    pub entity_set: Option<String>,
    /// Actions are side-effecting, functions are not
    pub is_side_effecting: bool,
    /// The first parameter is the binding parameter
    pub is_bindable: bool,
    pub is_composable: bool,
    pub parameters: Vec<FunctionParameter>,
}

impl FunctionImport {
    pub fn binding_parameter(&self) -> Option<&FunctionParameter> {
        if self.is_bindable {
            self.parameters.first()
        } else {
            None
        }
    }

    /// Parameters supplied by the URL (binding parameter skipped)
    pub fn non_binding_parameters(&self) -> &[FunctionParameter] {
        if self.is_bindable && !self.parameters.is_empty() {
            &self.parameters[1..]
        } else {
            &self.parameters
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names() {
        assert_eq!(
            EdmPrimitiveTypeKind::from_full_name("Edm.DateTimeOffset"),
            Some(EdmPrimitiveTypeKind::DateTimeOffset)
        );
        assert_eq!(EdmPrimitiveTypeKind::from_full_name("Int32"), None);
        assert_eq!(EdmPrimitiveTypeKind::Int64.to_string(), "Edm.Int64");
    }

    #[test]
    fn test_type_reference_helpers() {
        let orders = EdmTypeReference::collection(EdmTypeReference::entity("NS.Order"));
        assert!(orders.is_entity_collection());
        assert_eq!(orders.full_name(), "Collection(NS.Order)");

        let a = EdmTypeReference::primitive(EdmPrimitiveTypeKind::Int32, false);
        assert!(a.is_equivalent_to(&a.with_nullable(true)));
        assert_ne!(a, a.with_nullable(true));
    }

    #[test]
    fn test_non_binding_parameters() {
        let import = FunctionImport {
            name: "GetTotal".into(),
            return_type: None,
            entity_set: None,
            is_side_effecting: false,
            is_bindable: true,
            is_composable: false,
            parameters: vec![
                FunctionParameter {
                    name: "order".into(),
                    type_ref: EdmTypeReference::entity("NS.Order"),
                },
                FunctionParameter {
                    name: "tax".into(),
                    type_ref: EdmTypeReference::primitive(EdmPrimitiveTypeKind::Decimal, true),
                },
            ],
        };
        assert_eq!(import.binding_parameter().map(|p| p.name.as_str()), Some("order"));
        assert_eq!(import.non_binding_parameters().len(), 1);
    }
}
