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

//! EDM metadata model
//!
//! Type references, schema declarations, the [`EdmModel`] query trait the
//! binder runs against, an in-memory implementation, and operand type promotion.

pub mod in_memory;
pub mod provider;
pub mod type_coercion;
pub mod types;

pub use in_memory::{EdmModelBuilder, InMemoryModel, ModelDefinition};
pub use provider::{EdmModel, UriParserModelExtensions};
pub use type_coercion::{CoercionError, TypePromotion};
pub use types::{
    ComplexType, EdmPrimitiveTypeKind, EdmTypeReference, EntitySet, EntityType, FunctionImport,
    FunctionParameter, Multiplicity, NavigationProperty, PropertyRef, SchemaType,
    StructuralProperty,
};
