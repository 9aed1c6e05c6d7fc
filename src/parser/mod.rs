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

//! Syntactic layer: text to untyped tokens
//!
//! Nothing here consults the model. The binder consumes the
//! [`SyntacticTree`] produced by [`parse_syntactic_tree`].

pub mod lexer;
pub mod path;
pub mod pratt;
pub mod query_options;
pub mod scan;
pub mod select_expand;
pub mod span;

pub use lexer::{ExpressionLexer, ExpressionToken, LexerMode, TokenKind};
pub use path::{NamedValue, NamedValues, parse_named_values, parse_resource_path};
pub use pratt::{IMPLICIT_RANGE_VARIABLE, UriQueryExpressionParser};
pub use query_options::{RawQueryOptions, SYSTEM_QUERY_OPTIONS};
pub use select_expand::{
    ExpandTermParser, LegacyExpandTermParser, OptionExpandTermParser, SelectExpandParser,
    expand_term_parser,
};
pub use span::Spanned;

use crate::ast::{ExpandToken, InlineCountKind, OrderByToken, QueryToken, SelectToken, SyntacticTree};
use crate::config::{ExpandSyntax, ParserSettings};
use crate::core::error_code::OD0008;
use crate::core::{ODataError, Result};

/// Parse a `$filter` value
pub fn parse_filter_syntax(text: &str, max_depth: usize) -> Result<QueryToken> {
    UriQueryExpressionParser::new(text, max_depth)?.parse_filter()
}

/// Parse an `$orderby` value
pub fn parse_order_by_syntax(text: &str, max_depth: usize) -> Result<Vec<OrderByToken>> {
    UriQueryExpressionParser::new(text, max_depth)?.parse_order_by()
}

/// Parse a `$select` value
pub fn parse_select_syntax(text: &str, max_depth: usize, syntax: ExpandSyntax) -> Result<SelectToken> {
    SelectExpandParser::new(text, max_depth, syntax)?.parse_select()
}

/// Parse an `$expand` value
pub fn parse_expand_syntax(text: &str, max_depth: usize, syntax: ExpandSyntax) -> Result<ExpandToken> {
    SelectExpandParser::new(text, max_depth, syntax)?.parse_expand()
}

/// Parse a resource path and its query string into a [`SyntacticTree`]
pub fn parse_syntactic_tree(path: &str, query: Option<&str>, settings: &ParserSettings) -> Result<SyntacticTree> {
    let options = RawQueryOptions::parse(query.unwrap_or_default())?;
    let mut tree = SyntacticTree {
        path: parse_resource_path(path, settings.path_limit)?,
        ..SyntacticTree::default()
    };

    if let Some(text) = &options.filter {
        tree.filter = Some(parse_filter_syntax(text, settings.filter_limit)?);
    }
    if let Some(text) = &options.order_by {
        tree.order_by = Some(parse_order_by_syntax(text, settings.order_by_limit)?);
    }
    if let Some(text) = &options.select {
        tree.select = Some(parse_select_syntax(text, settings.select_expand_limit, settings.expand_syntax)?);
    }
    if let Some(text) = &options.expand {
        tree.expand = Some(parse_expand_syntax(text, settings.select_expand_limit, settings.expand_syntax)?);
    }
    if let Some(text) = &options.skip {
        tree.skip = Some(scan::parse_count_option("$skip", text)?);
    }
    if let Some(text) = &options.top {
        tree.top = Some(scan::parse_count_option("$top", text)?);
    }
    if let Some(text) = &options.inline_count {
        tree.inline_count = Some(InlineCountKind::parse(text).ok_or_else(|| {
            ODataError::syntax_at_unknown(
                OD0008,
                format!("invalid $inlinecount value '{text}': expected 'allpages' or 'none'"),
            )
        })?);
    }
    tree.format = options.format;
    tree.parameter_aliases = options.parameter_aliases;
    tree.custom_query_options = options.custom;

    log::debug!(
        "parsed syntactic tree: {} path segments, filter={}, expand={}",
        tree.path.len(),
        tree.filter.is_some(),
        tree.expand.is_some()
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_code::OD0004;

    #[test]
    fn test_full_tree() {
        let tree = parse_syntactic_tree(
            "Orders",
            Some("$filter=Amount gt 100&$orderby=Amount&$top=2&$skip=1&$inlinecount=allpages&$format=json"),
            &ParserSettings::default(),
        )
        .unwrap();
        assert_eq!(tree.path.len(), 1);
        assert!(tree.filter.is_some());
        assert_eq!(tree.order_by.as_ref().map(Vec::len), Some(1));
        assert_eq!(tree.top, Some(2));
        assert_eq!(tree.skip, Some(1));
        assert_eq!(tree.inline_count, Some(InlineCountKind::AllPages));
        assert_eq!(tree.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_limits_are_per_option() {
        let settings = ParserSettings::default().with_max_depth(2);
        let err = parse_syntactic_tree("Orders", Some("$filter=((1))"), &settings).unwrap_err();
        assert_eq!(err.code(), OD0004);
        assert!(parse_syntactic_tree("Orders", Some("$filter=(1)"), &settings).is_ok());
    }
}
