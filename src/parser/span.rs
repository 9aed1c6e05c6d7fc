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

//! Byte-offset spans for lexed tokens

/// A lexed value and the byte range it covers in the option text
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    /// Start byte offset, inclusive
    pub start: usize,
    /// End byte offset, exclusive
    pub end: usize,
}

impl<T> Spanned<T> {
    pub fn new(value: T, start: usize, end: usize) -> Self {
        Self { value, start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// No whitespace separates this span from `offset`
    pub fn starts_at(&self, offset: usize) -> bool {
        self.start == offset
    }

    /// The covered text of `input`
    pub fn slice<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.start..self.end).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_covered_text() {
        let span = Spanned::new((), 5, 7);
        assert_eq!(span.slice("Name eq 'x'"), "eq");
        assert_eq!(span.len(), 2);
        assert!(span.starts_at(5));
        assert!(Spanned::new((), 3, 3).is_empty());
        assert_eq!(Spanned::new((), 40, 42).slice("short"), "");
    }
}
