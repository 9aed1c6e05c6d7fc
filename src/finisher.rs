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

//! Select/expand tree finishing
//!
//! Removes expansions that were bound but that no select path ever reached.

use crate::core::stack::with_stack;
use crate::semantic::{SelectExpandClause, Selection};

pub struct SelectExpandTreeFinisher;

impl SelectExpandTreeFinisher {
    /// Prune unreached expansions, children first.
    ///
    /// A child still `Unknown` was expanded but never selected. A child that
    /// only carries expansions is dropped once all of those were dropped. The
    /// top-level clause is kept; if it is still `Unknown` it becomes
    /// `ExpansionsOnly`.
    pub fn prune_select_expand_tree(mut clause: SelectExpandClause) -> SelectExpandClause {
        Self::prune_children(&mut clause);
        if clause.selection == Selection::Unknown {
            clause.selection = Selection::ExpansionsOnly;
        }
        clause
    }

    fn prune_children(clause: &mut SelectExpandClause) {
        let Some(items) = clause.expansion.take() else {
            return;
        };
        let kept: Vec<_> = items
            .into_iter()
            .filter_map(|mut item| {
                with_stack(|| Self::prune_children(&mut item.select_and_expand));
                let child = &item.select_and_expand;
                let prune = match child.selection {
                    Selection::Unknown => true,
                    Selection::ExpansionsOnly => child.expansion.is_none(),
                    Selection::All | Selection::Partial(_) => false,
                };
                if prune {
                    log::trace!("pruning unselected expansion '{}'", item.path_string());
                    None
                } else {
                    Some(item)
                }
            })
            .collect();
        clause.expansion = (!kept.is_empty()).then_some(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdmTypeReference;
    use crate::semantic::{ExpandedNavigationSelectItem, ODataPathSegment, SegmentKind};
    use pretty_assertions::assert_eq;

    fn expanded(name: &str, selection: Selection, children: Vec<ExpandedNavigationSelectItem>) -> ExpandedNavigationSelectItem {
        ExpandedNavigationSelectItem {
            path: vec![ODataPathSegment::new(
                SegmentKind::NavigationProperty { name: name.into() },
                Some(EdmTypeReference::entity("NS.T")),
                None,
                true,
            )],
            entity_set: None,
            filter: None,
            order_by: None,
            top: None,
            skip: None,
            inline_count: None,
            select_and_expand: SelectExpandClause::new(selection, (!children.is_empty()).then_some(children)),
        }
    }

    fn names(clause: &SelectExpandClause) -> Vec<String> {
        clause.expansions().iter().map(ExpandedNavigationSelectItem::path_string).collect()
    }

    #[test]
    fn test_unknown_children_are_pruned() {
        let clause = SelectExpandClause::new(
            Selection::Unknown,
            Some(vec![
                expanded("A", Selection::Unknown, vec![]),
                expanded("B", Selection::All, vec![]),
            ]),
        );
        let finished = SelectExpandTreeFinisher::prune_select_expand_tree(clause);
        assert_eq!(names(&finished), vec!["B".to_string()]);
        assert_eq!(finished.selection, Selection::ExpansionsOnly);
    }

    #[test]
    fn test_expansions_only_chain_collapses() {
        let clause = SelectExpandClause::new(
            Selection::All,
            Some(vec![expanded(
                "A",
                Selection::ExpansionsOnly,
                vec![expanded("B", Selection::Unknown, vec![])],
            )]),
        );
        let finished = SelectExpandTreeFinisher::prune_select_expand_tree(clause);
        assert_eq!(finished.expansion, None);
        assert_eq!(finished.selection, Selection::All);
    }

    #[test]
    fn test_reached_grandchild_keeps_parent() {
        let clause = SelectExpandClause::new(
            Selection::ExpansionsOnly,
            Some(vec![expanded(
                "A",
                Selection::ExpansionsOnly,
                vec![expanded("B", Selection::All, vec![])],
            )]),
        );
        let finished = SelectExpandTreeFinisher::prune_select_expand_tree(clause);
        assert_eq!(names(&finished), vec!["A".to_string()]);
        assert_eq!(names(&finished.expansions()[0].select_and_expand), vec!["B".to_string()]);
    }
}
