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

//! `$filter` binding

use super::MetadataBinder;
use crate::ast::QueryToken;
use crate::core::error_code::{OD0054, OD0063};
use crate::core::{ODataError, Result};
use crate::model::EdmTypeReference;
use crate::semantic::{FilterClause, QueryNode};

pub struct FilterBinder<'a, 'm> {
    binder: &'a mut MetadataBinder<'m>,
}

impl<'a, 'm> FilterBinder<'a, 'm> {
    pub fn new(binder: &'a mut MetadataBinder<'m>) -> Self {
        Self { binder }
    }

    /// Bind a filter expression over the current `$it`.
    ///
    /// The expression must be a single boolean value; untyped expressions
    /// (null, open properties) are accepted as-is.
    pub fn bind_filter(&mut self, token: &QueryToken) -> Result<FilterClause> {
        let range_variable = self
            .binder
            .state
            .implicit_range_variable()
            .cloned()
            .ok_or_else(|| ODataError::binding(OD0063, "$filter requires an implicit range variable"))?;

        let expression = match self.binder.bind(token)? {
            QueryNode::Single(single) if single.type_reference().is_none_or(EdmTypeReference::is_boolean) => single,
            QueryNode::Single(single) => {
                let found = single.type_reference().map(EdmTypeReference::full_name).unwrap_or_default();
                return Err(ODataError::binding(
                    OD0054,
                    format!("$filter must be a boolean expression, found {found}"),
                ));
            }
            QueryNode::Collection(collection) => {
                return Err(ODataError::binding(
                    OD0054,
                    format!("$filter must be a single boolean value, found {}", collection.kind_name()),
                ));
            }
        };

        Ok(FilterClause {
            expression,
            range_variable,
        })
    }
}
