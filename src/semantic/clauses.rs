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

//! Bound `$filter` and `$orderby`

use super::nodes::{RangeVariable, SingleValueNode};
use crate::ast::OrderByDirection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    pub expression: SingleValueNode,
    /// The `$it` the expression ranges over
    pub range_variable: RangeVariable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByItem {
    pub expression: SingleValueNode,
    pub direction: OrderByDirection,
}

/// Sort keys, primary first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByClause {
    pub items: Vec<OrderByItem>,
    pub range_variable: RangeVariable,
}
