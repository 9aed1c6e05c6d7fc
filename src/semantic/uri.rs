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

//! The fully bound URI

use super::clauses::{FilterClause, OrderByClause};
use super::path::ODataPath;
use super::select_expand::SelectExpandClause;
use crate::ast::{CustomQueryOptionToken, InlineCountKind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ODataUri {
    /// Absolute service root, when the URI was parsed against one
    pub service_root: Option<String>,
    pub path: ODataPath,
    pub filter: Option<FilterClause>,
    pub order_by: Option<OrderByClause>,
    /// `None` when neither `$select` nor `$expand` was given
    pub select_expand: Option<SelectExpandClause>,
    pub skip: Option<i64>,
    pub top: Option<i64>,
    pub inline_count: Option<InlineCountKind>,
    pub format: Option<String>,
    pub custom_query_options: Vec<CustomQueryOptionToken>,
}
