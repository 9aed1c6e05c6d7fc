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

//! Operator definitions for OData expressions
//!
//! Binary operators carry their textual form, precedence band and the
//! parenthesization flag used when re-serializing bound trees. The table is
//! static and read-only.

use crate::core::{ODataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators in OData expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperatorKind {
    /// Logical OR (or)
    Or,
    /// Logical AND (and)
    And,
    /// Equality (eq)
    Equal,
    /// Inequality (ne)
    NotEqual,
    /// Greater than (gt)
    GreaterThan,
    /// Greater than or equal (ge)
    GreaterThanOrEqual,
    /// Less than (lt)
    LessThan,
    /// Less than or equal (le)
    LessThanOrEqual,
    /// Addition (add)
    Add,
    /// Subtraction (sub)
    Subtract,
    /// Multiplication (mul)
    Multiply,
    /// Division (div)
    Divide,
    /// Modulo (mod)
    Modulo,
}

/// Unary operators in OData expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperatorKind {
    /// Arithmetic negation (-)
    Negate,
    /// Logical negation (not)
    Not,
}

/// Row of the operator table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub kind: BinaryOperatorKind,
    pub text: &'static str,
    /// 0 binds loosest (or), 5 tightest (mul/div/mod)
    pub precedence: u8,
    /// Parenthesize a right operand of equal precedence when printing
    pub need_paren_even_when_the_same: bool,
}

const fn row(
    kind: BinaryOperatorKind,
    text: &'static str,
    precedence: u8,
    need_paren_even_when_the_same: bool,
) -> OperatorInfo {
    OperatorInfo {
        kind,
        text,
        precedence,
        need_paren_even_when_the_same,
    }
}

/// Every binary operator, in precedence order
pub static OPERATOR_TABLE: [OperatorInfo; 13] = [
    row(BinaryOperatorKind::Or, "or", 0, false),
    row(BinaryOperatorKind::And, "and", 1, false),
    row(BinaryOperatorKind::Equal, "eq", 2, true),
    row(BinaryOperatorKind::NotEqual, "ne", 2, true),
    row(BinaryOperatorKind::GreaterThan, "gt", 3, true),
    row(BinaryOperatorKind::GreaterThanOrEqual, "ge", 3, true),
    row(BinaryOperatorKind::LessThan, "lt", 3, true),
    row(BinaryOperatorKind::LessThanOrEqual, "le", 3, true),
    row(BinaryOperatorKind::Add, "add", 4, false),
    row(BinaryOperatorKind::Subtract, "sub", 4, true),
    row(BinaryOperatorKind::Multiply, "mul", 5, false),
    row(BinaryOperatorKind::Divide, "div", 5, true),
    row(BinaryOperatorKind::Modulo, "mod", 5, true),
];

/// Highest precedence band in the table
pub const MAX_PRECEDENCE: u8 = 5;

impl BinaryOperatorKind {
    /// Look up this operator's table row
    pub fn info(self) -> Result<&'static OperatorInfo> {
        OPERATOR_TABLE
            .iter()
            .find(|info| info.kind == self)
            .ok_or_else(|| ODataError::internal(format!("operator {self:?} missing from table")))
    }

    /// Resolve an operator keyword (case-sensitive)
    pub fn from_keyword(text: &str) -> Option<Self> {
        OPERATOR_TABLE
            .iter()
            .find(|info| info.text == text)
            .map(|info| info.kind)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::Or | Self::And)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterThanOrEqual | Self::LessThan | Self::LessThanOrEqual
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    /// Operators whose result is always Boolean
    pub fn yields_boolean(self) -> bool {
        self.is_logical() || self.is_equality() || self.is_relational()
    }
}

impl fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Ok(info) => write!(f, "{}", info.text),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

impl UnaryOperatorKind {
    pub fn from_keyword(text: &str) -> Option<Self> {
        match text {
            "not" => Some(Self::Not),
            "-" => Some(Self::Negate),
            _ => None,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Negate => "-",
        }
    }
}

impl fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BinaryOperatorKind::Or, "or", 0, false)]
    #[case(BinaryOperatorKind::And, "and", 1, false)]
    #[case(BinaryOperatorKind::Equal, "eq", 2, true)]
    #[case(BinaryOperatorKind::NotEqual, "ne", 2, true)]
    #[case(BinaryOperatorKind::GreaterThan, "gt", 3, true)]
    #[case(BinaryOperatorKind::LessThanOrEqual, "le", 3, true)]
    #[case(BinaryOperatorKind::Add, "add", 4, false)]
    #[case(BinaryOperatorKind::Subtract, "sub", 4, true)]
    #[case(BinaryOperatorKind::Multiply, "mul", 5, false)]
    #[case(BinaryOperatorKind::Modulo, "mod", 5, true)]
    fn test_table_rows(
        #[case] kind: BinaryOperatorKind,
        #[case] text: &str,
        #[case] precedence: u8,
        #[case] paren: bool,
    ) {
        let info = kind.info().unwrap();
        assert_eq!(info.text, text);
        assert_eq!(info.precedence, precedence);
        assert_eq!(info.need_paren_even_when_the_same, paren);
        assert_eq!(BinaryOperatorKind::from_keyword(text), Some(kind));
    }

    #[test]
    fn test_table_covers_each_kind_once() {
        for info in OPERATOR_TABLE.iter() {
            let count = OPERATOR_TABLE.iter().filter(|i| i.kind == info.kind).count();
            assert_eq!(count, 1, "{:?} listed more than once", info.kind);
        }
        assert!(OPERATOR_TABLE.iter().all(|i| i.precedence <= MAX_PRECEDENCE));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(BinaryOperatorKind::from_keyword("EQ"), None);
        assert_eq!(BinaryOperatorKind::from_keyword("eq"), Some(BinaryOperatorKind::Equal));
    }

    #[test]
    fn test_result_kinds() {
        assert!(BinaryOperatorKind::LessThan.yields_boolean());
        assert!(BinaryOperatorKind::Or.yields_boolean());
        assert!(!BinaryOperatorKind::Add.yields_boolean());
        assert!(BinaryOperatorKind::Modulo.is_arithmetic());
    }
}
