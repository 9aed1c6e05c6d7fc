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

//! Parser settings

use serde::{Deserialize, Serialize};

/// Default nesting limit for every recursive grammar
pub const DEFAULT_MAX_DEPTH: usize = 800;

/// How keys are written in the resource path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlConvention {
    /// `Customers(1)` and `Customers(ID=1,Name='x')`
    #[default]
    Parentheses,
    /// `Customers/1`, with parentheses still accepted
    KeyAsSegment,
}

/// Grammar used for `$expand` and `$select` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpandSyntax {
    /// `A/B,A(C)`: parentheses hold nested expand paths only
    Legacy,
    /// `A($filter=...;$expand=B)`: parentheses hold query options
    #[default]
    Options,
}

/// Configuration options for the URI parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserSettings {
    /// Maximum nesting depth of `$filter`.
    ///
    /// Every parenthesis, unary operator, path segment and function argument
    /// takes one level, and so does every binary operator, including each link
    /// of a flat chain such as `1 add 2 add 3`. A chain of parameter aliases
    /// referring to one another is limited to the same number of hops.
    pub filter_limit: usize,
    /// Maximum nesting depth of `$orderby`
    pub order_by_limit: usize,
    /// Maximum nesting depth of `$select`/`$expand` term lists
    pub select_expand_limit: usize,
    /// Maximum number of resource path segments
    pub path_limit: usize,
    pub url_convention: UrlConvention,
    pub expand_syntax: ExpandSyntax,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            filter_limit: DEFAULT_MAX_DEPTH,
            order_by_limit: DEFAULT_MAX_DEPTH,
            select_expand_limit: DEFAULT_MAX_DEPTH,
            path_limit: DEFAULT_MAX_DEPTH,
            url_convention: UrlConvention::default(),
            expand_syntax: ExpandSyntax::default(),
        }
    }
}

impl ParserSettings {
    /// Set every depth limit at once.
    ///
    /// `$filter` and `$orderby` count operators at one level too, so
    /// `a add b add c` needs a limit of 3.
    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.filter_limit = limit;
        self.order_by_limit = limit;
        self.select_expand_limit = limit;
        self.path_limit = limit;
        self
    }

    pub fn with_url_convention(mut self, convention: UrlConvention) -> Self {
        self.url_convention = convention;
        self
    }

    pub fn with_expand_syntax(mut self, syntax: ExpandSyntax) -> Self {
        self.expand_syntax = syntax;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ParserSettings::default();
        assert_eq!(settings.filter_limit, 800);
        assert_eq!(settings.select_expand_limit, 800);
        assert_eq!(settings.url_convention, UrlConvention::Parentheses);
        assert_eq!(settings.expand_syntax, ExpandSyntax::Options);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: ParserSettings =
            serde_json::from_str(r#"{"filterLimit": 5, "expandSyntax": "legacy"}"#).unwrap();
        assert_eq!(settings.filter_limit, 5);
        assert_eq!(settings.order_by_limit, 800);
        assert_eq!(settings.expand_syntax, ExpandSyntax::Legacy);
    }
}
