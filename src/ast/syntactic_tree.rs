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

//! Whole-URI syntactic tree

use super::select_expand::{ExpandToken, InlineCountKind, SelectToken};
use super::token::{OrderByToken, QueryToken};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Resource path segment as written, e.g. `Orders(1)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSegmentToken {
    pub identifier: String,
    /// Text inside the trailing parentheses; `Some("")` for `()`
    pub parenthesized: Option<String>,
}

impl ResourceSegmentToken {
    pub fn new(identifier: impl Into<String>, parenthesized: Option<String>) -> Self {
        Self {
            identifier: identifier.into(),
            parenthesized,
        }
    }
}

/// Query option not recognized as a system option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQueryOptionToken {
    pub name: String,
    pub value: String,
}

/// Parsed but unbound URI
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyntacticTree {
    pub path: Vec<ResourceSegmentToken>,
    pub filter: Option<QueryToken>,
    pub order_by: Option<Vec<OrderByToken>>,
    pub select: Option<SelectToken>,
    pub expand: Option<ExpandToken>,
    pub skip: Option<i64>,
    pub top: Option<i64>,
    pub inline_count: Option<InlineCountKind>,
    pub format: Option<String>,
    /// `@name` options, available to parameter alias references
    pub parameter_aliases: IndexMap<String, String>,
    pub custom_query_options: Vec<CustomQueryOptionToken>,
}
