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

//! `$select` and `$expand` term tokens

use super::path::{PathOrder, PathSegmentToken};
use super::token::{OrderByToken, QueryToken};
use serde::{Deserialize, Serialize};

/// `$inlinecount` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InlineCountKind {
    None,
    AllPages,
}

impl InlineCountKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "none" => Some(Self::None),
            "allpages" => Some(Self::AllPages),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AllPages => "allpages",
        }
    }
}

/// Parsed `$select` value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectToken {
    pub properties: Vec<PathSegmentToken>,
    pub order: PathOrder,
}

/// One comma-separated `$expand` term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandTermToken {
    pub path_to_nav_prop: PathSegmentToken,
    pub filter_option: Option<QueryToken>,
    pub order_by_options: Option<Vec<OrderByToken>>,
    pub top_option: Option<i64>,
    pub skip_option: Option<i64>,
    pub inline_count_option: Option<InlineCountKind>,
    pub select_option: Option<SelectToken>,
    pub expand_option: Option<ExpandToken>,
}

impl ExpandTermToken {
    /// Term with a path and no options
    pub fn new(path_to_nav_prop: PathSegmentToken) -> Self {
        Self {
            path_to_nav_prop,
            filter_option: None,
            order_by_options: None,
            top_option: None,
            skip_option: None,
            inline_count_option: None,
            select_option: None,
            expand_option: None,
        }
    }

    pub fn with_expand(mut self, expand: Option<ExpandToken>) -> Self {
        self.expand_option = expand;
        self
    }

    /// Whether any option other than `$expand` is present
    pub fn has_query_options(&self) -> bool {
        self.filter_option.is_some()
            || self.order_by_options.is_some()
            || self.top_option.is_some()
            || self.skip_option.is_some()
            || self.inline_count_option.is_some()
            || self.select_option.is_some()
    }
}

/// Parsed `$expand` value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandToken {
    pub expand_terms: Vec<ExpandTermToken>,
    pub order: PathOrder,
}

impl ExpandToken {
    pub fn new(expand_terms: Vec<ExpandTermToken>, order: PathOrder) -> Self {
        Self { expand_terms, order }
    }
}
