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

//! Whole-URI binding

use super::path::ODataPathBinder;
use super::select_expand::SelectExpandBinder;
use super::{BindingState, FilterBinder, MetadataBinder, OrderByBinder};
use crate::ast::SyntacticTree;
use crate::config::ParserSettings;
use crate::core::error_code::OD0055;
use crate::core::{ODataError, Result};
use crate::finisher::SelectExpandTreeFinisher;
use crate::model::{EdmModel, EdmTypeReference};
use crate::normalizer::{ExpandTreeNormalizer, invert_select};
use crate::parser::IMPLICIT_RANGE_VARIABLE;
use crate::semantic::{ODataPath, ODataPathSegment, ODataUri, RangeVariable, SegmentKind};

/// Binds a [`SyntacticTree`] into an [`ODataUri`]
pub struct ODataUriSemanticBinder<'m> {
    model: &'m dyn EdmModel,
    settings: ParserSettings,
}

impl<'m> ODataUriSemanticBinder<'m> {
    pub fn new(model: &'m dyn EdmModel, settings: ParserSettings) -> Self {
        Self { model, settings }
    }

    /// Bind the path, then each query option against the resource the path
    /// addresses (the segment before a trailing `$count`)
    pub fn bind_tree(&self, tree: SyntacticTree) -> Result<ODataUri> {
        let state = BindingState::new(self.model)
            .with_parameter_aliases(tree.parameter_aliases)
            .with_max_depth(self.settings.filter_limit);
        let mut binder = MetadataBinder::new(state);

        let path = ODataPathBinder::new(&mut binder, self.settings.url_convention).bind_path(&tree.path)?;
        log::debug!("bound resource path with {} segments", path.segments.len());

        let target = QueryTarget::of(&path);
        if let Some(item_type) = target.item_type.clone() {
            binder.state.replace_implicit_range_variable(Some(RangeVariable::for_item_type(
                IMPLICIT_RANGE_VARIABLE,
                Some(item_type),
                target.entity_set.clone(),
            )));
        }

        let filter = match &tree.filter {
            Some(token) => {
                target.require("$filter", target.is_entity_collection() || target.is_single_entity())?;
                let clause = FilterBinder::new(&mut binder).bind_filter(token)?;
                log::debug!("bound $filter to {}", clause.expression.kind_name());
                Some(clause)
            }
            None => None,
        };

        let order_by = match &tree.order_by {
            Some(tokens) => {
                target.require("$orderby", target.is_entity_collection())?;
                let clause = OrderByBinder::new(&mut binder).bind_order_by(tokens)?;
                log::debug!("bound $orderby with {} keys", clause.items.len());
                Some(clause)
            }
            None => None,
        };

        if tree.skip.is_some() {
            target.require("$skip", target.is_entity_collection())?;
        }
        if tree.top.is_some() {
            target.require("$top", target.is_entity_collection())?;
        }

        let select_expand = if tree.select.is_some() || tree.expand.is_some() {
            target.require(
                "$select and $expand",
                target.is_entity_collection() || target.is_single_entity(),
            )?;
            let entity_type = target
                .item_type
                .as_ref()
                .and_then(EdmTypeReference::structured_name)
                .unwrap_or_default()
                .to_string();
            let expand = tree.expand.map(ExpandTreeNormalizer::normalize_expand_tree).transpose()?;
            let select = tree.select.map(invert_select);
            let clause = SelectExpandBinder::new(&mut binder).bind(
                expand.as_ref(),
                select.as_ref(),
                &entity_type,
                target.entity_set.as_deref(),
            )?;
            let clause = SelectExpandTreeFinisher::prune_select_expand_tree(clause);
            log::debug!("bound select/expand with {} expansions", clause.expansions().len());
            Some(clause)
        } else {
            None
        };

        if tree.inline_count.is_some() {
            target.require("$inlinecount", target.is_entity_collection())?;
        }

        Ok(ODataUri {
            service_root: None,
            path,
            filter,
            order_by,
            select_expand,
            skip: tree.skip,
            top: tree.top,
            inline_count: tree.inline_count,
            format: tree.format,
            custom_query_options: tree.custom_query_options,
        })
    }
}

/// The resource query options apply to
struct QueryTarget {
    description: String,
    edm_type: Option<EdmTypeReference>,
    item_type: Option<EdmTypeReference>,
    entity_set: Option<String>,
}

impl QueryTarget {
    fn of(path: &ODataPath) -> Self {
        let segment: Option<&ODataPathSegment> = match path.segments.as_slice() {
            [.., before, last] if last.kind == SegmentKind::Count => Some(before),
            [.., last] => Some(last),
            [] => None,
        };
        Self {
            description: segment.map_or_else(|| "the service root".to_string(), |s| format!("'{s}'")),
            edm_type: segment.and_then(|s| s.edm_type.clone()),
            item_type: segment.and_then(|s| s.item_type().cloned()),
            entity_set: segment.and_then(|s| s.entity_set.clone()),
        }
    }

    fn is_entity_collection(&self) -> bool {
        self.edm_type.as_ref().is_some_and(EdmTypeReference::is_entity_collection)
    }

    fn is_single_entity(&self) -> bool {
        self.edm_type.as_ref().is_some_and(EdmTypeReference::is_entity)
    }

    fn require(&self, option: &str, allowed: bool) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(ODataError::binding(
                OD0055,
                format!("{option} cannot be applied to {}", self.description),
            ))
        }
    }
}
