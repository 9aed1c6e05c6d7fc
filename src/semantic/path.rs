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

//! Bound resource path

use super::nodes::{ConstantNode, SingleValueNode};
use crate::model::EdmTypeReference;
use serde::Serialize;
use std::fmt;

/// `name=value` pair of a key segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub property: String,
    pub value: ConstantNode,
}

/// Argument passed to an operation segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationParameter {
    pub name: String,
    pub value: SingleValueNode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SegmentKind {
    EntitySet { name: String },
    Key { values: Vec<KeyValue> },
    NavigationProperty { name: String },
    Property { name: String },
    OpenProperty { name: String },
    TypeCast { type_name: String },
    /// Function import invocation, bound or unbound
    Operation {
        name: String,
        parameters: Vec<OperationParameter>,
        is_side_effecting: bool,
        /// Whether further segments may follow
        is_composable: bool,
    },
    Count,
    Value,
    Links,
    Metadata,
    Batch,
}

/// One resolved segment, with the type and cardinality it produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ODataPathSegment {
    pub kind: SegmentKind,
    /// Type produced by this segment; a collection type when not single-result
    pub edm_type: Option<EdmTypeReference>,
    pub entity_set: Option<String>,
    pub single_result: bool,
}

impl ODataPathSegment {
    pub fn new(
        kind: SegmentKind,
        edm_type: Option<EdmTypeReference>,
        entity_set: Option<String>,
        single_result: bool,
    ) -> Self {
        Self {
            kind,
            edm_type,
            entity_set,
            single_result,
        }
    }

    /// Segment with no type of its own, such as `$metadata`
    pub fn untyped(kind: SegmentKind) -> Self {
        Self::new(kind, None, None, true)
    }

    /// Item type for collections, the type itself otherwise
    pub fn item_type(&self) -> Option<&EdmTypeReference> {
        self.edm_type
            .as_ref()
            .map(|ty| ty.element_type().unwrap_or(ty))
    }
}

impl fmt::Display for ODataPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SegmentKind::EntitySet { name }
            | SegmentKind::NavigationProperty { name }
            | SegmentKind::Property { name }
            | SegmentKind::OpenProperty { name }
            | SegmentKind::Operation { name, .. } => f.write_str(name),
            SegmentKind::TypeCast { type_name } => f.write_str(type_name),
            SegmentKind::Key { values } => {
                let rendered: Vec<_> = values
                    .iter()
                    .map(|key| format!("{}={}", key.property, key.value.literal_text))
                    .collect();
                write!(f, "({})", rendered.join(","))
            }
            SegmentKind::Count => f.write_str("$count"),
            SegmentKind::Value => f.write_str("$value"),
            SegmentKind::Links => f.write_str("$links"),
            SegmentKind::Metadata => f.write_str("$metadata"),
            SegmentKind::Batch => f.write_str("$batch"),
        }
    }
}

/// Ordered resolved segments of a resource path
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ODataPath {
    pub segments: Vec<ODataPathSegment>,
}

impl ODataPath {
    pub fn new(segments: Vec<ODataPathSegment>) -> Self {
        Self { segments }
    }

    pub fn last(&self) -> Option<&ODataPathSegment> {
        self.segments.last()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Type produced by the whole path
    pub fn edm_type(&self) -> Option<&EdmTypeReference> {
        self.last().and_then(|segment| segment.edm_type.as_ref())
    }

    pub fn entity_set(&self) -> Option<&str> {
        self.last().and_then(|segment| segment.entity_set.as_deref())
    }

    pub fn is_entity_collection(&self) -> bool {
        self.edm_type().is_some_and(EdmTypeReference::is_entity_collection)
    }

    pub fn is_single_entity(&self) -> bool {
        self.edm_type().is_some_and(EdmTypeReference::is_entity)
    }
}
