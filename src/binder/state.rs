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

//! Mutable state scoped to one binding run

use crate::config::DEFAULT_MAX_DEPTH;
use crate::model::EdmModel;
use crate::semantic::RangeVariable;
use indexmap::IndexMap;

/// Range-variable scope stack and alias table for one URI
pub struct BindingState<'m> {
    pub model: &'m dyn EdmModel,
    /// `$it` for the resource currently being queried
    implicit_range_variable: Option<RangeVariable>,
    /// Lambda variables, innermost last
    range_variables: Vec<RangeVariable>,
    parameter_aliases: IndexMap<String, String>,
    /// Aliases currently being resolved, for cycle detection
    resolving_aliases: Vec<String>,
    /// Depth limit used when parsing alias values
    pub max_depth: usize,
}

impl<'m> BindingState<'m> {
    pub fn new(model: &'m dyn EdmModel) -> Self {
        Self {
            model,
            implicit_range_variable: None,
            range_variables: Vec::new(),
            parameter_aliases: IndexMap::new(),
            resolving_aliases: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_parameter_aliases(mut self, aliases: IndexMap<String, String>) -> Self {
        self.parameter_aliases = aliases;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn implicit_range_variable(&self) -> Option<&RangeVariable> {
        self.implicit_range_variable.as_ref()
    }

    /// Install a new `$it`, returning the previous one
    pub fn replace_implicit_range_variable(&mut self, variable: Option<RangeVariable>) -> Option<RangeVariable> {
        std::mem::replace(&mut self.implicit_range_variable, variable)
    }

    pub fn push_range_variable(&mut self, variable: RangeVariable) {
        log::trace!("range variable '{}' in scope", variable.name());
        self.range_variables.push(variable);
    }

    pub fn pop_range_variable(&mut self) -> Option<RangeVariable> {
        self.range_variables.pop()
    }

    /// Innermost variable named `name`, falling back to `$it`
    pub fn find_range_variable(&self, name: &str) -> Option<&RangeVariable> {
        self.range_variables
            .iter()
            .rev()
            .chain(self.implicit_range_variable.iter())
            .find(|variable| variable.name() == name)
    }

    pub fn parameter_alias(&self, alias: &str) -> Option<&str> {
        self.parameter_aliases.get(alias).map(String::as_str)
    }

    /// Mark `alias` as being resolved; false if it already is
    pub fn begin_alias(&mut self, alias: &str) -> bool {
        if self.resolving_aliases.iter().any(|a| a == alias) {
            return false;
        }
        self.resolving_aliases.push(alias.to_string());
        true
    }

    pub fn end_alias(&mut self) {
        self.resolving_aliases.pop();
    }

    /// Number of aliases currently being resolved, innermost last
    pub fn alias_depth(&self) -> usize {
        self.resolving_aliases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdmModelBuilder, EdmTypeReference};

    #[test]
    fn test_innermost_variable_wins() {
        let model = EdmModelBuilder::new("NS", "Container").build().unwrap();
        let mut state = BindingState::new(&model);
        state.replace_implicit_range_variable(Some(RangeVariable::for_item_type(
            "$it",
            Some(EdmTypeReference::entity("NS.Order")),
            None,
        )));
        state.push_range_variable(RangeVariable::for_item_type("o", None, None));
        state.push_range_variable(RangeVariable::for_item_type(
            "o",
            Some(EdmTypeReference::entity("NS.Line")),
            None,
        ));

        let found = state.find_range_variable("o").unwrap();
        assert_eq!(found.type_reference(), Some(&EdmTypeReference::entity("NS.Line")));
        assert!(state.find_range_variable("$it").is_some());

        state.pop_range_variable();
        state.pop_range_variable();
        assert!(state.find_range_variable("o").is_none());
    }

    #[test]
    fn test_alias_cycle_guard() {
        let model = EdmModelBuilder::new("NS", "Container").build().unwrap();
        let mut state = BindingState::new(&model);
        assert!(state.begin_alias("@a"));
        assert!(!state.begin_alias("@a"));
        state.end_alias();
        assert!(state.begin_alias("@a"));
    }

    #[test]
    fn test_alias_depth_tracks_nesting() {
        let model = EdmModelBuilder::new("NS", "Container").build().unwrap();
        let mut state = BindingState::new(&model);
        assert_eq!(state.alias_depth(), 0);
        assert!(state.begin_alias("@a"));
        assert!(state.begin_alias("@b"));
        assert_eq!(state.alias_depth(), 2);
        state.end_alias();
        assert_eq!(state.alias_depth(), 1);
    }
}
