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

//! Query string splitting into system, alias and custom options

use crate::ast::CustomQueryOptionToken;
use crate::core::error_code::{OD0009, OD0010};
use crate::core::{ODataError, Result};
use indexmap::IndexMap;

/// System query options understood by the parser
pub const SYSTEM_QUERY_OPTIONS: [&str; 8] = [
    "$filter",
    "$orderby",
    "$select",
    "$expand",
    "$skip",
    "$top",
    "$inlinecount",
    "$format",
];

/// Decoded but unparsed query options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryOptions {
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub select: Option<String>,
    pub expand: Option<String>,
    pub skip: Option<String>,
    pub top: Option<String>,
    pub inline_count: Option<String>,
    pub format: Option<String>,
    /// `@name=value` pairs, keyed with the `@`
    pub parameter_aliases: IndexMap<String, String>,
    pub custom: Vec<CustomQueryOptionToken>,
}

impl RawQueryOptions {
    /// Split a query string (without the leading `?`)
    pub fn parse(query: &str) -> Result<Self> {
        let mut options = Self::default();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            options.insert(&name, value.into_owned())?;
        }
        Ok(options)
    }

    fn insert(&mut self, name: &str, value: String) -> Result<()> {
        let slot = match name {
            "$filter" => &mut self.filter,
            "$orderby" => &mut self.order_by,
            "$select" => &mut self.select,
            "$expand" => &mut self.expand,
            "$skip" => &mut self.skip,
            "$top" => &mut self.top,
            "$inlinecount" => &mut self.inline_count,
            "$format" => &mut self.format,
            _ if name.starts_with('$') => {
                return Err(ODataError::syntax_at_unknown(
                    OD0010,
                    format!("'{name}' is not a supported system query option"),
                ));
            }
            _ if name.starts_with('@') => {
                if self.parameter_aliases.insert(name.to_string(), value).is_some() {
                    return Err(duplicate(name));
                }
                return Ok(());
            }
            _ => {
                self.custom.push(CustomQueryOptionToken {
                    name: name.to_string(),
                    value,
                });
                return Ok(());
            }
        };
        if slot.is_some() {
            return Err(duplicate(name));
        }
        *slot = Some(value);
        Ok(())
    }
}

fn duplicate(name: &str) -> ODataError {
    ODataError::syntax_at_unknown(OD0009, format!("query option '{name}' is specified more than once"))
}
