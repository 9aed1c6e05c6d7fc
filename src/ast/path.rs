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

//! Path segment tokens used by `$select` and `$expand`
//!
//! A path is an owned singly-linked chain. The parser builds it innermost
//! first (the last segment read is the head); the normalizer inverts it to
//! root-first order. Every node is uniquely owned, so splicing with
//! [`PathSegmentToken::set_next`] never affects another path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction in which a chain's `next` links point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathOrder {
    /// Head is the last segment read; `next` points toward the root
    InnermostFirst,
    /// Head is the first segment in the URL
    RootFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegmentKind {
    /// `$`-prefixed segment such as `$count`
    System,
    /// Property, navigation, type or operation name
    NonSystem {
        /// Text between parentheses following the identifier, if any
        named_values: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegmentToken {
    pub identifier: String,
    pub kind: PathSegmentKind,
    next: Option<Box<PathSegmentToken>>,
}

impl PathSegmentToken {
    pub fn non_system(identifier: impl Into<String>, next: Option<PathSegmentToken>) -> Self {
        Self {
            identifier: identifier.into(),
            kind: PathSegmentKind::NonSystem { named_values: None },
            next: next.map(Box::new),
        }
    }

    pub fn with_named_values(mut self, named_values: Option<String>) -> Self {
        if let PathSegmentKind::NonSystem { named_values: slot } = &mut self.kind {
            *slot = named_values;
        }
        self
    }

    pub fn system(identifier: impl Into<String>, next: Option<PathSegmentToken>) -> Self {
        Self {
            identifier: identifier.into(),
            kind: PathSegmentKind::System,
            next: next.map(Box::new),
        }
    }

    /// Build a root-first chain from identifiers in URL order
    pub fn from_identifiers<I, S>(identifiers: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: DoubleEndedIterator,
        S: Into<String>,
    {
        identifiers
            .into_iter()
            .rev()
            .fold(None, |next, id| Some(Self::non_system(id, next)))
    }

    pub fn next(&self) -> Option<&PathSegmentToken> {
        self.next.as_deref()
    }

    /// Replace the tail of this node, returning the old tail
    pub fn set_next(&mut self, next: Option<PathSegmentToken>) -> Option<PathSegmentToken> {
        std::mem::replace(&mut self.next, next.map(Box::new)).map(|tail| *tail)
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind, PathSegmentKind::System)
    }

    pub fn named_values(&self) -> Option<&str> {
        match &self.kind {
            PathSegmentKind::NonSystem { named_values } => named_values.as_deref(),
            PathSegmentKind::System => None,
        }
    }

    /// Type and container qualified names contain a dot
    pub fn is_namespace_or_container_qualified(&self) -> bool {
        self.identifier.contains('.')
    }

    /// Iterate the chain from this node
    pub fn iter(&self) -> PathSegmentIter<'_> {
        PathSegmentIter {
            current: Some(self),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.iter().count()
    }

    /// Reverse the chain, reusing every node
    pub fn reversed(mut self) -> Self {
        let mut rest = self.set_next(None);
        while let Some(mut node) = rest {
            rest = node.set_next(Some(self));
            self = node;
        }
        self
    }

    /// Detach everything after the node at `index`, returning `(head, tail)`
    pub fn split_after(mut self, index: usize) -> (Self, Option<Self>) {
        let tail = self.set_next(None);
        if index == 0 {
            return (self, tail);
        }
        match tail {
            Some(next) => {
                let (head, rest) = next.split_after(index - 1);
                self.set_next(Some(head));
                (self, rest)
            }
            None => (self, None),
        }
    }

    /// Equality key: identifiers joined by `/` along the chain
    pub fn hashable_string(&self) -> String {
        self.iter()
            .map(|segment| segment.identifier.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PathSegmentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hashable_string())
    }
}

pub struct PathSegmentIter<'a> {
    current: Option<&'a PathSegmentToken>,
}

impl<'a> Iterator for PathSegmentIter<'a> {
    type Item = &'a PathSegmentToken;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.next();
        Some(current)
    }
}

/// Compares paths by their identifier chains
pub struct PathSegmentTokenEqualityComparer;

impl PathSegmentTokenEqualityComparer {
    pub fn equals(first: Option<&PathSegmentToken>, second: Option<&PathSegmentToken>) -> bool {
        match (first, second) {
            (None, None) => true,
            (Some(a), Some(b)) => a.hashable_string() == b.hashable_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_chain() {
        let innermost_first = PathSegmentToken::non_system(
            "C",
            Some(PathSegmentToken::non_system(
                "B",
                Some(PathSegmentToken::non_system("A", None)),
            )),
        );
        let root_first = innermost_first.reversed();
        assert_eq!(root_first.hashable_string(), "A/B/C");
        assert_eq!(root_first.segment_count(), 3);
    }

    #[test]
    fn test_split_after() {
        let path = PathSegmentToken::from_identifiers(["NS.Special", "Orders", "Lines"]).unwrap();
        let (head, tail) = path.split_after(1);
        assert_eq!(head.hashable_string(), "NS.Special/Orders");
        assert_eq!(tail.map(|t| t.hashable_string()), Some("Lines".to_string()));
    }

    #[test]
    fn test_set_next_returns_old_tail() {
        let mut path = PathSegmentToken::from_identifiers(["NS.Special", "Orders"]).unwrap();
        let tail = path.set_next(None).unwrap();
        assert_eq!(tail.identifier, "Orders");
        assert_eq!(path.hashable_string(), "NS.Special");
        assert!(path.is_namespace_or_container_qualified());
    }

    #[test]
    fn test_equality_ignores_named_values() {
        let a = PathSegmentToken::non_system("Orders", None).with_named_values(Some("1".into()));
        let b = PathSegmentToken::non_system("Orders", None);
        assert!(PathSegmentTokenEqualityComparer::equals(Some(&a), Some(&b)));
        assert!(!PathSegmentTokenEqualityComparer::equals(Some(&a), None));
    }
}
