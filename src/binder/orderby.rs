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

//! `$orderby` binding

use super::MetadataBinder;
use crate::ast::OrderByToken;
use crate::core::error_code::{OD0063, OD0064};
use crate::core::{ODataError, Result};
use crate::semantic::{OrderByClause, OrderByItem, QueryNode};

pub struct OrderByBinder<'a, 'm> {
    binder: &'a mut MetadataBinder<'m>,
}

impl<'a, 'm> OrderByBinder<'a, 'm> {
    pub fn new(binder: &'a mut MetadataBinder<'m>) -> Self {
        Self { binder }
    }

    /// Bind each sort key; keys must be single primitive values
    pub fn bind_order_by(&mut self, tokens: &[OrderByToken]) -> Result<OrderByClause> {
        let range_variable = self
            .binder
            .state
            .implicit_range_variable()
            .cloned()
            .ok_or_else(|| ODataError::binding(OD0063, "$orderby requires an implicit range variable"))?;

        let mut items = Vec::with_capacity(tokens.len());
        for token in tokens {
            let expression = match self.binder.bind(&token.expression)? {
                QueryNode::Single(single) if single.type_reference().is_none_or(|ty| ty.is_primitive()) => single,
                other => {
                    return Err(ODataError::binding(
                        OD0064,
                        format!("$orderby keys must be single primitive values, found {}", other.kind_name()),
                    ));
                }
            };
            items.push(OrderByItem {
                expression,
                direction: token.direction,
            });
        }

        Ok(OrderByClause {
            items,
            range_variable,
        })
    }
}
