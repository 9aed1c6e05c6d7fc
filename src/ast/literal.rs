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

//! Literal values carried by constant tokens and key predicates

use crate::model::types::{EdmPrimitiveTypeKind, EdmTypeReference};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Parsed literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    String(String),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    /// xsd:duration text, e.g. `PT13H20M`
    Time(String),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl LiteralValue {
    /// Primitive kind of the value; `None` for null
    pub fn primitive_kind(&self) -> Option<EdmPrimitiveTypeKind> {
        use EdmPrimitiveTypeKind as K;
        Some(match self {
            Self::Null => return None,
            Self::Boolean(_) => K::Boolean,
            Self::String(_) => K::String,
            Self::Int32(_) => K::Int32,
            Self::Int64(_) => K::Int64,
            Self::Single(_) => K::Single,
            Self::Double(_) => K::Double,
            Self::Decimal(_) => K::Decimal,
            Self::DateTime(_) => K::DateTime,
            Self::DateTimeOffset(_) => K::DateTimeOffset,
            Self::Time(_) => K::Time,
            Self::Guid(_) => K::Guid,
            Self::Binary(_) => K::Binary,
        })
    }

    /// Non-nullable type reference of the value; `None` for null
    pub fn type_reference(&self) -> Option<EdmTypeReference> {
        self.primitive_kind()
            .map(|kind| EdmTypeReference::primitive(kind, false))
    }

    /// OData URI literal form
    pub fn to_uri_literal(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::String(value) => format!("'{}'", value.replace('\'', "''")),
            Self::Int32(value) => value.to_string(),
            Self::Int64(value) => format!("{value}L"),
            Self::Single(value) => format!("{}f", format_float(f64::from(*value))),
            Self::Double(value) => format!("{}d", format_float(*value)),
            Self::Decimal(value) => format!("{value}M"),
            Self::DateTime(value) => {
                format!("datetime'{}'", value.format("%Y-%m-%dT%H:%M:%S%.f"))
            }
            Self::DateTimeOffset(value) => format!("datetimeoffset'{}'", value.to_rfc3339()),
            Self::Time(value) => format!("time'{value}'"),
            Self::Guid(value) => format!("guid'{value}'"),
            Self::Binary(value) => format!("X'{}'", hex::encode_upper(value)),
        }
    }
}

fn format_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri_literal())
    }
}
