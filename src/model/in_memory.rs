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

//! In-memory EDM model and its builder
//!
//! Models are described with serde-friendly definition structs (the CLI loads
//! them from JSON) or through [`EdmModelBuilder`]. Type names inside a
//! definition are resolved once, when the model is built.

use super::provider::{EdmModel, UriParserModelExtensions};
use super::types::{
    ComplexType, EdmPrimitiveTypeKind, EdmTypeReference, EntitySet, EntityType, FunctionImport,
    FunctionParameter, Multiplicity, NavigationProperty, StructuralProperty,
};
use crate::core::{ODataError, Result, error_code::OD0052};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_true() -> bool {
    true
}

/// Property as written in a model document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDefinition {
    pub name: String,
    pub target: String,
    pub multiplicity: Multiplicity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityTypeDefinition {
    pub name: String,
    pub base_type: Option<String>,
    pub key: Vec<String>,
    pub open: bool,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub properties: Vec<PropertyDefinition>,
    pub navigation_properties: Vec<NavigationDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComplexTypeDefinition {
    pub name: String,
    pub base_type: Option<String>,
    pub open: bool,
    pub properties: Vec<PropertyDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntitySetDefinition {
    pub name: String,
    pub entity_type: String,
    pub navigation_targets: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FunctionImportDefinition {
    pub name: String,
    pub return_type: Option<String>,
    pub entity_set: Option<String>,
    pub side_effecting: bool,
    pub bindable: bool,
    pub composable: bool,
    pub parameters: Vec<PropertyDefinition>,
}

/// Serializable description of a whole model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelDefinition {
    pub namespace: String,
    pub container: String,
    pub entity_types: Vec<EntityTypeDefinition>,
    pub complex_types: Vec<ComplexTypeDefinition>,
    pub entity_sets: Vec<EntitySetDefinition>,
    pub function_imports: Vec<FunctionImportDefinition>,
}

/// Model held entirely in memory
#[derive(Clone, Default)]
pub struct InMemoryModel {
    container: String,
    entity_types: FxHashMap<String, EntityType>,
    complex_types: FxHashMap<String, ComplexType>,
    entity_sets: IndexMap<String, EntitySet>,
    function_imports: FxHashMap<String, Vec<FunctionImport>>,
    extensions: Option<Arc<dyn UriParserModelExtensions + Send + Sync>>,
}

impl std::fmt::Debug for InMemoryModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryModel")
            .field("container", &self.container)
            .field("entity_types", &self.entity_types.len())
            .field("complex_types", &self.complex_types.len())
            .field("entity_sets", &self.entity_sets.len())
            .field("extensions", &self.extensions.is_some())
            .finish()
    }
}

impl InMemoryModel {
    /// Build a model from its definition, resolving every type name
    pub fn from_definition(definition: ModelDefinition) -> Result<Self> {
        let resolver = NameResolver::new(&definition);
        let namespace = definition.namespace.clone();

        let mut entity_types = FxHashMap::default();
        for def in &definition.entity_types {
            let mut properties = IndexMap::new();
            for prop in &def.properties {
                properties.insert(prop.name.clone(), resolver.property(prop)?);
            }
            let mut navigation_properties = IndexMap::new();
            for nav in &def.navigation_properties {
                let target_type = resolver.qualify(&nav.target);
                if !resolver.entity_names.contains(&target_type) {
                    return Err(unknown_type(&nav.target));
                }
                navigation_properties.insert(
                    nav.name.clone(),
                    NavigationProperty {
                        name: nav.name.clone(),
                        target_type,
                        multiplicity: nav.multiplicity,
                    },
                );
            }
            let entity = EntityType {
                namespace: namespace.clone(),
                name: def.name.clone(),
                base_type: def.base_type.as_deref().map(|b| resolver.qualify(b)),
                key: def.key.clone(),
                is_open: def.open,
                is_abstract: def.is_abstract,
                properties,
                navigation_properties,
            };
            entity_types.insert(entity.full_name(), entity);
        }

        let mut complex_types = FxHashMap::default();
        for def in &definition.complex_types {
            let mut properties = IndexMap::new();
            for prop in &def.properties {
                properties.insert(prop.name.clone(), resolver.property(prop)?);
            }
            let complex = ComplexType {
                namespace: namespace.clone(),
                name: def.name.clone(),
                base_type: def.base_type.as_deref().map(|b| resolver.qualify(b)),
                is_open: def.open,
                properties,
            };
            complex_types.insert(complex.full_name(), complex);
        }

        let mut entity_sets = IndexMap::new();
        for def in &definition.entity_sets {
            let entity_type = resolver.qualify(&def.entity_type);
            if !resolver.entity_names.contains(&entity_type) {
                return Err(unknown_type(&def.entity_type));
            }
            entity_sets.insert(
                def.name.clone(),
                EntitySet {
                    name: def.name.clone(),
                    entity_type,
                    navigation_targets: def.navigation_targets.clone(),
                },
            );
        }

        let mut function_imports: FxHashMap<String, Vec<FunctionImport>> = FxHashMap::default();
        for def in &definition.function_imports {
            let return_type = def
                .return_type
                .as_deref()
                .map(|name| resolver.type_reference(name, true))
                .transpose()?;
            let parameters = def
                .parameters
                .iter()
                .map(|param| {
                    Ok(FunctionParameter {
                        name: param.name.clone(),
                        type_ref: resolver.type_reference(&param.type_name, param.nullable)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            function_imports
                .entry(def.name.clone())
                .or_default()
                .push(FunctionImport {
                    name: def.name.clone(),
                    return_type,
                    entity_set: def.entity_set.clone(),
                    is_side_effecting: def.side_effecting,
                    is_bindable: def.bindable,
                    is_composable: def.composable,
                    parameters,
                });
        }

        log::debug!(
            "built model {} with {} entity types and {} entity sets",
            definition.container,
            entity_types.len(),
            entity_sets.len()
        );

        Ok(Self {
            container: definition.container,
            entity_types,
            complex_types,
            entity_sets,
            function_imports,
            extensions: None,
        })
    }

    /// Attach a custom operation resolver
    pub fn with_extensions(
        mut self,
        extensions: Arc<dyn UriParserModelExtensions + Send + Sync>,
    ) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

impl EdmModel for InMemoryModel {
    fn container_name(&self) -> &str {
        &self.container
    }

    fn find_entity_type(&self, qualified_name: &str) -> Option<&EntityType> {
        self.entity_types.get(qualified_name)
    }

    fn find_complex_type(&self, qualified_name: &str) -> Option<&ComplexType> {
        self.complex_types.get(qualified_name)
    }

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    fn find_function_imports(&self, name: &str) -> Vec<&FunctionImport> {
        self.function_imports
            .get(name)
            .map(|imports| imports.iter().collect())
            .unwrap_or_default()
    }

    fn entity_sets(&self) -> Vec<&EntitySet> {
        self.entity_sets.values().collect()
    }

    fn uri_parser_extensions(&self) -> Option<&dyn UriParserModelExtensions> {
        self.extensions
            .as_deref()
            .map(|ext| ext as &dyn UriParserModelExtensions)
    }
}

fn unknown_type(name: &str) -> ODataError {
    ODataError::binding(OD0052, format!("type '{name}' is not declared in the model"))
}

struct NameResolver {
    namespace: String,
    entity_names: Vec<String>,
    complex_names: Vec<String>,
}

impl NameResolver {
    fn new(definition: &ModelDefinition) -> Self {
        let qualify = |name: &str| format!("{}.{}", definition.namespace, name);
        Self {
            namespace: definition.namespace.clone(),
            entity_names: definition.entity_types.iter().map(|t| qualify(&t.name)).collect(),
            complex_names: definition.complex_types.iter().map(|t| qualify(&t.name)).collect(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        }
    }

    fn type_reference(&self, name: &str, nullable: bool) -> Result<EdmTypeReference> {
        if let Some(inner) = name
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(EdmTypeReference::collection(self.type_reference(inner, nullable)?));
        }
        if let Some(kind) = EdmPrimitiveTypeKind::from_full_name(name) {
            return Ok(EdmTypeReference::primitive(kind, nullable));
        }
        let qualified = self.qualify(name);
        if self.entity_names.contains(&qualified) {
            Ok(EdmTypeReference::Entity {
                name: qualified,
                nullable,
            })
        } else if self.complex_names.contains(&qualified) {
            Ok(EdmTypeReference::Complex {
                name: qualified,
                nullable,
            })
        } else {
            Err(unknown_type(name))
        }
    }

    fn property(&self, def: &PropertyDefinition) -> Result<StructuralProperty> {
        Ok(StructuralProperty {
            name: def.name.clone(),
            type_ref: self.type_reference(&def.type_name, def.nullable)?,
        })
    }
}

/// Fluent construction of an [`InMemoryModel`]
#[derive(Debug, Clone, Default)]
pub struct EdmModelBuilder {
    definition: ModelDefinition,
}

impl EdmModelBuilder {
    pub fn new(namespace: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            definition: ModelDefinition {
                namespace: namespace.into(),
                container: container.into(),
                ..ModelDefinition::default()
            },
        }
    }

    pub fn entity_type(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(EntityTypeBuilder) -> EntityTypeBuilder,
    ) -> Self {
        let builder = configure(EntityTypeBuilder {
            definition: EntityTypeDefinition {
                name: name.into(),
                ..EntityTypeDefinition::default()
            },
        });
        self.definition.entity_types.push(builder.definition);
        self
    }

    pub fn complex_type(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(ComplexTypeBuilder) -> ComplexTypeBuilder,
    ) -> Self {
        let builder = configure(ComplexTypeBuilder {
            definition: ComplexTypeDefinition {
                name: name.into(),
                ..ComplexTypeDefinition::default()
            },
        });
        self.definition.complex_types.push(builder.definition);
        self
    }

    pub fn entity_set(mut self, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        self.definition.entity_sets.push(EntitySetDefinition {
            name: name.into(),
            entity_type: entity_type.into(),
            navigation_targets: IndexMap::new(),
        });
        self
    }

    /// Declare the target set of a navigation property for the last added set
    pub fn navigation_target(mut self, navigation: impl Into<String>, target_set: impl Into<String>) -> Self {
        if let Some(set) = self.definition.entity_sets.last_mut() {
            set.navigation_targets.insert(navigation.into(), target_set.into());
        }
        self
    }

    pub fn function_import(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(FunctionImportBuilder) -> FunctionImportBuilder,
    ) -> Self {
        let builder = configure(FunctionImportBuilder {
            definition: FunctionImportDefinition {
                name: name.into(),
                ..FunctionImportDefinition::default()
            },
        });
        self.definition.function_imports.push(builder.definition);
        self
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn build(self) -> Result<InMemoryModel> {
        InMemoryModel::from_definition(self.definition)
    }
}

pub struct EntityTypeBuilder {
    definition: EntityTypeDefinition,
}

impl EntityTypeBuilder {
    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.definition.key.push(name.into());
        self
    }

    pub fn base_type(mut self, name: impl Into<String>) -> Self {
        self.definition.base_type = Some(name.into());
        self
    }

    pub fn open(mut self) -> Self {
        self.definition.open = true;
        self
    }

    pub fn property(mut self, name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        self.definition.properties.push(PropertyDefinition {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        });
        self
    }

    pub fn navigation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        self.definition.navigation_properties.push(NavigationDefinition {
            name: name.into(),
            target: target.into(),
            multiplicity,
        });
        self
    }
}

pub struct ComplexTypeBuilder {
    definition: ComplexTypeDefinition,
}

impl ComplexTypeBuilder {
    pub fn open(mut self) -> Self {
        self.definition.open = true;
        self
    }

    pub fn property(mut self, name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        self.definition.properties.push(PropertyDefinition {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        });
        self
    }
}

pub struct FunctionImportBuilder {
    definition: FunctionImportDefinition,
}

impl FunctionImportBuilder {
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.definition.return_type = Some(type_name.into());
        self
    }

    pub fn entity_set(mut self, name: impl Into<String>) -> Self {
        self.definition.entity_set = Some(name.into());
        self
    }

    pub fn side_effecting(mut self) -> Self {
        self.definition.side_effecting = true;
        self
    }

    pub fn bindable(mut self) -> Self {
        self.definition.bindable = true;
        self
    }

    pub fn composable(mut self) -> Self {
        self.definition.composable = true;
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.definition.parameters.push(PropertyDefinition {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::PropertyRef;

    fn sample() -> InMemoryModel {
        EdmModelBuilder::new("NS", "Container")
            .entity_type("Person", |t| {
                t.key("ID")
                    .property("ID", "Edm.Int32", false)
                    .property("Name", "Edm.String", true)
            })
            .entity_type("Employee", |t| {
                t.base_type("Person")
                    .property("Salary", "Edm.Decimal", true)
                    .navigation("Manager", "Employee", Multiplicity::ZeroOrOne)
            })
            .entity_set("People", "NS.Person")
            .build()
            .unwrap()
    }

    #[test]
    fn test_inherited_key_and_properties() {
        let model = sample();
        let keys = model.key_properties("NS.Employee");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "ID");
        assert!(matches!(
            model.find_property("NS.Employee", "Name"),
            Some(PropertyRef::Structural(_))
        ));
        assert!(matches!(
            model.find_property("NS.Employee", "Manager"),
            Some(PropertyRef::Navigation(_))
        ));
        assert!(model.find_property("NS.Person", "Salary").is_none());
    }

    #[test]
    fn test_hierarchy_queries() {
        let model = sample();
        assert!(model.is_derived_from("NS.Employee", "NS.Person"));
        assert!(!model.is_derived_from("NS.Person", "NS.Employee"));
        assert!(model.are_related("NS.Person", "NS.Employee"));
    }

    #[test]
    fn test_navigation_target_falls_back_to_matching_set() {
        let model = sample();
        let nav = match model.find_property("NS.Employee", "Manager") {
            Some(PropertyRef::Navigation(nav)) => nav.clone(),
            other => panic!("expected navigation, got {other:?}"),
        };
        assert_eq!(
            model.navigation_target_set(Some("People"), &nav),
            Some("People".to_string())
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = EdmModelBuilder::new("NS", "C")
            .entity_type("Thing", |t| t.property("Size", "NS.Missing", true))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "namespace": "NS",
            "container": "C",
            "entityTypes": [
                {"name": "Item", "key": ["Id"], "properties": [{"name": "Id", "type": "Edm.Int64", "nullable": false}]}
            ],
            "entitySets": [{"name": "Items", "entityType": "Item"}]
        }"#;
        let definition: ModelDefinition = serde_json::from_str(json).unwrap();
        let model = InMemoryModel::from_definition(definition).unwrap();
        assert_eq!(model.find_entity_set("Items").unwrap().entity_type, "NS.Item");
    }
}
