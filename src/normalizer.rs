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

//! Expand-tree normalization
//!
//! The parser produces path chains innermost-first and allows multi-hop
//! expand paths such as `A/B`. The normalizer turns that into one canonical
//! tree: every chain root-first, one navigation hop per level, and sibling
//! terms with equal paths merged. Chains carry their [`PathOrder`], so
//! normalizing a normalized tree changes nothing.

use crate::ast::{ExpandTermToken, ExpandToken, PathOrder, PathSegmentToken, SelectToken};
use crate::core::error_code::OD0060;
use crate::core::stack::with_stack;
use crate::core::{ODataError, Result};
use indexmap::IndexMap;

pub struct ExpandTreeNormalizer;

impl ExpandTreeNormalizer {
    /// Invert every path, then split multi-hop terms and merge duplicates
    pub fn normalize_expand_tree(tree: ExpandToken) -> Result<ExpandToken> {
        let inverted = Self::invert_paths(tree);
        let combined = Self::combine_terms(inverted)?;
        log::debug!("normalized expand tree into {} top-level terms", combined.expand_terms.len());
        Ok(combined)
    }

    /// Make every chain in the tree root-first
    pub fn invert_paths(tree: ExpandToken) -> ExpandToken {
        let invert = tree.order == PathOrder::InnermostFirst;
        let expand_terms = tree
            .expand_terms
            .into_iter()
            .map(|mut term| {
                if invert {
                    term.path_to_nav_prop = term.path_to_nav_prop.reversed();
                }
                term.select_option = term.select_option.map(invert_select);
                term.expand_option = term.expand_option.map(|expand| with_stack(|| Self::invert_paths(expand)));
                term
            })
            .collect();
        ExpandToken::new(expand_terms, PathOrder::RootFirst)
    }

    /// Split multi-hop terms and merge terms sharing a path.
    ///
    /// Expects a root-first tree.
    pub fn combine_terms(tree: ExpandToken) -> Result<ExpandToken> {
        let mut combined: IndexMap<String, ExpandTermToken> = IndexMap::new();
        for term in tree.expand_terms {
            let mut term = Self::build_sub_expand_tree(term)?;
            if let Some(expand) = term.expand_option.take() {
                term.expand_option = Some(with_stack(|| Self::combine_terms(expand))?);
            }
            let key = term.path_to_nav_prop.hashable_string();
            match combined.shift_remove_full(&key) {
                Some((index, key, existing)) => {
                    let merged = Self::combine_child_nodes(existing, term)?;
                    combined.shift_insert(index, key, merged);
                }
                None => {
                    combined.insert(key, term);
                }
            }
        }
        Ok(ExpandToken::new(combined.into_values().collect(), PathOrder::RootFirst))
    }

    /// Nest a multi-hop term so each level expands a single navigation.
    ///
    /// Leading type segments stay with the hop they qualify. Options of the
    /// original term move to the deepest hop.
    pub fn build_sub_expand_tree(term: ExpandTermToken) -> Result<ExpandTermToken> {
        let hop = term
            .path_to_nav_prop
            .iter()
            .position(|segment| !segment.is_namespace_or_container_qualified())
            .ok_or_else(|| non_path_in_chain(&term.path_to_nav_prop))?;

        if hop + 1 == term.path_to_nav_prop.segment_count() {
            return Ok(term);
        }

        let ExpandTermToken {
            path_to_nav_prop,
            filter_option,
            order_by_options,
            top_option,
            skip_option,
            inline_count_option,
            select_option,
            expand_option,
        } = term;
        let (head, rest) = path_to_nav_prop.split_after(hop);
        let Some(rest) = rest else {
            return Ok(ExpandTermToken::new(head).with_expand(expand_option));
        };

        let child = Self::build_sub_expand_tree(ExpandTermToken {
            path_to_nav_prop: rest,
            filter_option,
            order_by_options,
            top_option,
            skip_option,
            inline_count_option,
            select_option,
            expand_option,
        })?;
        Ok(ExpandTermToken::new(head)
            .with_expand(Some(ExpandToken::new(vec![child], PathOrder::RootFirst))))
    }

    /// Merge `new` into `existing`, keeping the options of `existing`
    pub fn combine_child_nodes(mut existing: ExpandTermToken, new: ExpandTermToken) -> Result<ExpandTermToken> {
        if existing.expand_option.is_none() && new.expand_option.is_none() {
            return Ok(existing);
        }
        let children = existing
            .expand_option
            .take()
            .into_iter()
            .chain(new.expand_option)
            .flat_map(|expand| expand.expand_terms)
            .collect();
        existing.expand_option = Some(Self::combine_terms(ExpandToken::new(children, PathOrder::RootFirst))?);
        Ok(existing)
    }
}

/// Make every `$select` chain root-first
pub fn invert_select(select: SelectToken) -> SelectToken {
    if select.order == PathOrder::RootFirst {
        return select;
    }
    SelectToken {
        properties: select.properties.into_iter().map(PathSegmentToken::reversed).collect(),
        order: PathOrder::RootFirst,
    }
}

fn non_path_in_chain(path: &PathSegmentToken) -> ODataError {
    ODataError::binding(
        OD0060,
        format!("'{path}' ends in a type segment; a type segment must be followed by a navigation property"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpandSyntax;
    use crate::parser::parse_expand_syntax;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn normalize(text: &str, syntax: ExpandSyntax) -> ExpandToken {
        let parsed = parse_expand_syntax(text, 800, syntax).unwrap();
        ExpandTreeNormalizer::normalize_expand_tree(parsed).unwrap()
    }

    /// Render as `A(B,C(D))` for compact comparison
    fn render(tree: &ExpandToken) -> String {
        tree.expand_terms
            .iter()
            .map(|term| match &term.expand_option {
                Some(children) if !children.expand_terms.is_empty() => {
                    format!("{}({})", term.path_to_nav_prop, render(children))
                }
                _ => term.path_to_nav_prop.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn assert_unique(tree: &ExpandToken) {
        let mut seen = std::collections::HashSet::new();
        for term in &tree.expand_terms {
            assert!(seen.insert(term.path_to_nav_prop.hashable_string()));
            if let Some(children) = &term.expand_option {
                assert_unique(children);
            }
        }
    }

    #[test]
    fn test_siblings_under_shared_root() {
        let tree = normalize("A/B,A/C", ExpandSyntax::Legacy);
        assert_eq!(render(&tree), "A(B,C)");
        assert_eq!(tree.order, PathOrder::RootFirst);
    }

    #[rstest]
    #[case("A/B,A/C", "A(B,C)")]
    #[case("A,A/B/C,A/B/D", "A(B(C,D))")]
    #[case("A(B),A(C)", "A(B,C)")]
    #[case("NS.T/A/B,NS.T/A/C", "NS.T/A(B,C)")]
    #[case("A/NS.T/B", "A(NS.T/B)")]
    #[case("X,A,X", "X,A")]
    fn test_legacy_shapes(#[case] text: &str, #[case] expected: &str) {
        let tree = normalize(text, ExpandSyntax::Legacy);
        assert_eq!(render(&tree), expected);
        assert_unique(&tree);
    }

    #[rstest]
    #[case("A/B,A/C")]
    #[case("A,A/B/C,A/B/D,E(F,G/H)")]
    #[case("NS.T/A/B,A/NS.U/C")]
    fn test_idempotent(#[case] text: &str) {
        let once = normalize(text, ExpandSyntax::Legacy);
        let twice = ExpandTreeNormalizer::normalize_expand_tree(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_options_move_to_deepest_hop() {
        let tree = normalize("A/B($top=2)", ExpandSyntax::Options);
        let outer = &tree.expand_terms[0];
        assert_eq!(outer.top_option, None);
        let inner = &outer.expand_option.as_ref().unwrap().expand_terms[0];
        assert_eq!(inner.path_to_nav_prop.identifier, "B");
        assert_eq!(inner.top_option, Some(2));
    }

    #[test]
    fn test_first_term_options_win_on_merge() {
        let tree = normalize("A($top=1),A($top=5;$expand=B)", ExpandSyntax::Options);
        assert_eq!(render(&tree), "A(B)");
        assert_eq!(tree.expand_terms[0].top_option, Some(1));
    }

    #[test]
    fn test_inline_select_is_inverted() {
        let tree = normalize("A($select=B/C)", ExpandSyntax::Options);
        let select = tree.expand_terms[0].select_option.as_ref().unwrap();
        assert_eq!(select.order, PathOrder::RootFirst);
        assert_eq!(select.properties[0].hashable_string(), "B/C");
    }

    #[test]
    fn test_trailing_type_segment_fails() {
        let parsed = parse_expand_syntax("A/NS.T", 800, ExpandSyntax::Legacy).unwrap();
        let err = ExpandTreeNormalizer::normalize_expand_tree(parsed).unwrap_err();
        assert_eq!(err.code(), OD0060);
    }
}
