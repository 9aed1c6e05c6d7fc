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

//! Bound `$select`/`$expand` tree

use super::clauses::{FilterClause, OrderByClause};
use super::path::{ODataPathSegment, SegmentKind};
use crate::ast::InlineCountKind;
use crate::core::stack::with_stack;
use serde::Serialize;

/// What a clause selects at its level
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "camelCase")]
pub enum Selection {
    All,
    /// Nothing selected here, only expansions carried through
    ExpansionsOnly,
    Partial(Vec<SelectItem>),
    /// Not yet decided; pruned by the finisher if still unknown
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SelectItem {
    /// Property, navigation property or operation, optionally behind type casts
    Path(PathSelectItem),
    /// `NS.*`: every operation in a namespace or container
    NamespaceQualifiedWildcard { namespace: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSelectItem {
    pub segments: Vec<ODataPathSegment>,
}

impl PathSelectItem {
    /// `NS.T/Name` form of the item
    pub fn path_string(&self) -> String {
        join_segments(&self.segments)
    }
}

/// Expanded navigation with its own options and nested clause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedNavigationSelectItem {
    /// Type casts followed by exactly one navigation segment
    pub path: Vec<ODataPathSegment>,
    pub entity_set: Option<String>,
    pub filter: Option<FilterClause>,
    pub order_by: Option<OrderByClause>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub inline_count: Option<InlineCountKind>,
    pub select_and_expand: SelectExpandClause,
}

impl ExpandedNavigationSelectItem {
    pub fn navigation_property(&self) -> &str {
        self.path
            .iter()
            .rev()
            .find_map(|segment| match &segment.kind {
                SegmentKind::NavigationProperty { name } => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn path_string(&self) -> String {
        join_segments(&self.path)
    }
}

fn join_segments(segments: &[ODataPathSegment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectExpandClause {
    pub selection: Selection,
    /// `None` when nothing is expanded at this level
    pub expansion: Option<Vec<ExpandedNavigationSelectItem>>,
}

impl SelectExpandClause {
    pub fn new(selection: Selection, expansion: Option<Vec<ExpandedNavigationSelectItem>>) -> Self {
        Self {
            selection,
            expansion,
        }
    }

    /// Add an explicitly selected item
    pub fn add_select_item(&mut self, item: SelectItem) {
        match &mut self.selection {
            Selection::All => {}
            Selection::Partial(items) => {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            Selection::Unknown | Selection::ExpansionsOnly => {
                self.selection = Selection::Partial(vec![item]);
            }
        }
    }

    pub fn set_all_selected(&mut self) {
        self.selection = Selection::All;
    }

    /// Select everything at this level and in every nested expansion that no
    /// select path has reached yet. Levels with their own selection keep it.
    pub fn select_all_unreached(&mut self) {
        if self.selection == Selection::Unknown {
            self.selection = Selection::All;
        }
        for item in self.expansion.iter_mut().flatten() {
            with_stack(|| item.select_and_expand.select_all_unreached());
        }
    }

    /// Record that a select path passes through this level without selecting here
    pub fn mark_expansions_only(&mut self) {
        if self.selection == Selection::Unknown {
            self.selection = Selection::ExpansionsOnly;
        }
    }

    pub fn expansions(&self) -> &[ExpandedNavigationSelectItem] {
        self.expansion.as_deref().unwrap_or_default()
    }

    /// Expanded item whose path reads `path`
    pub fn find_expansion_mut(&mut self, path: &str) -> Option<&mut ExpandedNavigationSelectItem> {
        self.expansion
            .as_mut()?
            .iter_mut()
            .find(|item| item.path_string() == path)
    }
}
