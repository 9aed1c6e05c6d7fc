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

//! Parser facade
//!
//! [`ODataUriParser`] ties the syntactic layer and the binder together for
//! one model and one set of [`ParserSettings`].

use crate::ast::ResourceSegmentToken;
use crate::binder::{
    BindingState, FilterBinder, MetadataBinder, ODataPathBinder, ODataUriSemanticBinder, OrderByBinder,
    SelectExpandBinder,
};
use crate::config::ParserSettings;
use crate::core::error_code::{OD0011, OD0052, OD0066};
use crate::core::{ODataError, Result};
use crate::finisher::SelectExpandTreeFinisher;
use crate::model::{EdmModel, EdmTypeReference};
use crate::normalizer::{ExpandTreeNormalizer, invert_select};
use crate::parser::{
    IMPLICIT_RANGE_VARIABLE, parse_expand_syntax, parse_filter_syntax, parse_order_by_syntax, parse_resource_path,
    parse_select_syntax, parse_syntactic_tree,
};
use crate::semantic::{
    FilterClause, ODataPath, ODataUri, OrderByClause, RangeVariable, SelectExpandClause,
};
use url::Url;

pub struct ODataUriParser<'m> {
    model: &'m dyn EdmModel,
    settings: ParserSettings,
}

impl<'m> ODataUriParser<'m> {
    pub fn new(model: &'m dyn EdmModel) -> Self {
        Self {
            model,
            settings: ParserSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Parse and bind a whole URI.
    ///
    /// With a service root, `uri` may be absolute or relative to it and must
    /// resolve to a location under the root. Without one, `uri` is taken as a
    /// relative resource path with an optional query string.
    pub fn parse_uri(&self, uri: &str, service_root: Option<&str>) -> Result<ODataUri> {
        let (path, query) = match service_root {
            Some(root) => split_against_root(uri, root)?,
            None => match uri.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (uri.to_string(), None),
            },
        };
        log::debug!("parsing resource path '{path}'");

        let tree = parse_syntactic_tree(&path, query.as_deref(), &self.settings)?;
        let mut bound = ODataUriSemanticBinder::new(self.model, self.settings.clone()).bind_tree(tree)?;
        bound.service_root = service_root.map(str::to_string);
        Ok(bound)
    }

    /// Parse and bind a resource path without a query string
    pub fn parse_path(&self, path: &str) -> Result<ODataPath> {
        let tokens: Vec<ResourceSegmentToken> = parse_resource_path(path, self.settings.path_limit)?;
        let mut binder = MetadataBinder::new(self.state());
        ODataPathBinder::new(&mut binder, self.settings.url_convention).bind_path(&tokens)
    }

    /// Bind `$filter` text over items of `entity_type`
    pub fn parse_filter(&self, text: &str, entity_type: &str, entity_set: Option<&str>) -> Result<FilterClause> {
        let token = parse_filter_syntax(text, self.settings.filter_limit)?;
        let mut binder = self.binder_over(entity_type, entity_set)?;
        FilterBinder::new(&mut binder).bind_filter(&token)
    }

    /// Bind `$orderby` text over items of `entity_type`
    pub fn parse_order_by(&self, text: &str, entity_type: &str, entity_set: Option<&str>) -> Result<OrderByClause> {
        let tokens = parse_order_by_syntax(text, self.settings.order_by_limit)?;
        let mut binder = self.binder_over(entity_type, entity_set)?;
        OrderByBinder::new(&mut binder).bind_order_by(&tokens)
    }

    /// Bind `$select` and `$expand` texts for `entity_type`
    pub fn parse_select_and_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
        entity_type: &str,
        entity_set: Option<&str>,
    ) -> Result<SelectExpandClause> {
        let limit = self.settings.select_expand_limit;
        let syntax = self.settings.expand_syntax;
        let select = select
            .map(|text| parse_select_syntax(text, limit, syntax))
            .transpose()?
            .map(invert_select);
        let expand = expand
            .map(|text| parse_expand_syntax(text, limit, syntax))
            .transpose()?
            .map(ExpandTreeNormalizer::normalize_expand_tree)
            .transpose()?;

        let mut binder = self.binder_over(entity_type, entity_set)?;
        let clause = SelectExpandBinder::new(&mut binder).bind(expand.as_ref(), select.as_ref(), entity_type, entity_set)?;
        Ok(SelectExpandTreeFinisher::prune_select_expand_tree(clause))
    }

    fn state(&self) -> BindingState<'m> {
        BindingState::new(self.model).with_max_depth(self.settings.filter_limit)
    }

    fn binder_over(&self, entity_type: &str, entity_set: Option<&str>) -> Result<MetadataBinder<'m>> {
        let Some(entity) = self.model.find_entity_type(entity_type) else {
            return Err(ODataError::binding(
                OD0052,
                format!("entity type '{entity_type}' is not defined in the model"),
            ));
        };
        let mut binder = MetadataBinder::new(self.state());
        binder.state.replace_implicit_range_variable(Some(RangeVariable::for_item_type(
            IMPLICIT_RANGE_VARIABLE,
            Some(EdmTypeReference::entity(entity.full_name())),
            entity_set.map(str::to_string),
        )));
        Ok(binder)
    }
}

/// Resolve `uri` against `root` and return the path relative to the root
/// plus the raw query string
fn split_against_root(uri: &str, root: &str) -> Result<(String, Option<String>)> {
    if !root.ends_with('/') {
        return Err(ODataError::syntax_at_unknown(
            OD0011,
            format!("the service root '{root}' must end with '/'"),
        ));
    }
    let base = Url::parse(root)
        .map_err(|err| ODataError::syntax_at_unknown(OD0011, format!("invalid service root '{root}': {err}")))?;
    let full = base
        .join(uri)
        .map_err(|err| ODataError::syntax_at_unknown(OD0011, format!("invalid URI '{uri}': {err}")))?;

    let relative = (full.origin() == base.origin())
        .then(|| full.path().strip_prefix(base.path()))
        .flatten()
        .ok_or_else(|| {
            ODataError::binding(
                OD0066,
                format!("'{full}' is not under the service root '{root}'"),
            )
        })?;
    Ok((relative.to_string(), full.query().map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_against_root() {
        let (path, query) = split_against_root(
            "http://host/service/Customers(1)?$top=1",
            "http://host/service/",
        )
        .unwrap();
        assert_eq!(path, "Customers(1)");
        assert_eq!(query.as_deref(), Some("$top=1"));

        let (path, query) = split_against_root("Orders", "http://host/service/").unwrap();
        assert_eq!(path, "Orders");
        assert_eq!(query, None);
    }

    #[test]
    fn test_uri_outside_root() {
        let err = split_against_root("http://other/service/Orders", "http://host/service/").unwrap_err();
        assert_eq!(err.code(), OD0066);
        let err = split_against_root("Orders", "http://host/service").unwrap_err();
        assert_eq!(err.code(), OD0011);
    }
}
