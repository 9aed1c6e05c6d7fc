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

//! Type promotion and conversion rules for operator operands

use super::types::{EdmPrimitiveTypeKind, EdmTypeReference};
use crate::ast::operator::{BinaryOperatorKind, UnaryOperatorKind};
use std::fmt;

/// Result type for type promotion
pub type CoercionResult<T> = Result<T, CoercionError>;

/// Errors that can occur during type promotion
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionError {
    /// Operands have no common type for the operator
    IncompatibleOperands {
        operator: String,
        left: String,
        right: String,
    },
    /// Operand type is not valid for a unary operator
    IncompatibleOperand { operator: String, operand: String },
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionError::IncompatibleOperands {
                operator,
                left,
                right,
            } => write!(
                f,
                "operator '{operator}' cannot be applied to operands of type '{left}' and '{right}'"
            ),
            CoercionError::IncompatibleOperand { operator, operand } => {
                write!(f, "operator '{operator}' cannot be applied to an operand of type '{operand}'")
            }
        }
    }
}

impl std::error::Error for CoercionError {}

/// Numeric operand signatures, narrowest first
const NUMERIC_SIGNATURES: [EdmPrimitiveTypeKind; 5] = [
    EdmPrimitiveTypeKind::Int32,
    EdmPrimitiveTypeKind::Int64,
    EdmPrimitiveTypeKind::Single,
    EdmPrimitiveTypeKind::Double,
    EdmPrimitiveTypeKind::Decimal,
];

fn type_name(ty: Option<&EdmTypeReference>) -> String {
    ty.map_or_else(|| "<untyped>".to_string(), EdmTypeReference::full_name)
}

/// Type promotion utility for operator operands
pub struct TypePromotion;

impl TypePromotion {
    /// Implicit widening between primitive kinds (reflexive)
    pub fn can_convert_primitive(from: EdmPrimitiveTypeKind, to: EdmPrimitiveTypeKind) -> bool {
        use EdmPrimitiveTypeKind::*;
        if from == to {
            return true;
        }
        match from {
            SByte | Byte => matches!(to, Int16 | Int32 | Int64 | Single | Double | Decimal),
            Int16 => matches!(to, Int32 | Int64 | Single | Double | Decimal),
            Int32 => matches!(to, Int64 | Single | Double | Decimal),
            Int64 => matches!(to, Single | Double | Decimal),
            Single => to == Double,
            _ => false,
        }
    }

    /// Whether a value of `source` may be used where `target` is expected.
    ///
    /// Structured types are compared by name only; hierarchy checks need the
    /// model and live with the binder.
    pub fn can_convert(source: &EdmTypeReference, target: &EdmTypeReference) -> bool {
        match (source, target) {
            (
                EdmTypeReference::Primitive { primitive: from, .. },
                EdmTypeReference::Primitive { primitive: to, .. },
            ) => Self::can_convert_primitive(*from, *to),
            (EdmTypeReference::Collection { element: s }, EdmTypeReference::Collection { element: t }) => {
                Self::can_convert(s, t)
            }
            _ => source.is_equivalent_to(target),
        }
    }

    fn promote_numeric(
        left: EdmPrimitiveTypeKind,
        right: EdmPrimitiveTypeKind,
    ) -> Option<EdmPrimitiveTypeKind> {
        NUMERIC_SIGNATURES.iter().copied().find(|candidate| {
            Self::can_convert_primitive(left, *candidate) && Self::can_convert_primitive(right, *candidate)
        })
    }

    fn operator_accepts(op: BinaryOperatorKind, kind: EdmPrimitiveTypeKind) -> bool {
        if op.is_logical() {
            kind == EdmPrimitiveTypeKind::Boolean
        } else if op.is_arithmetic() {
            NUMERIC_SIGNATURES.contains(&kind)
        } else {
            kind != EdmPrimitiveTypeKind::Stream
        }
    }

    /// Find the common operand type for a binary operator.
    ///
    /// `None` operands are untyped (null literals, open properties). Returns the
    /// type both operands convert to, or `None` when both are untyped.
    pub fn promote_binary_operands(
        op: BinaryOperatorKind,
        left: Option<&EdmTypeReference>,
        right: Option<&EdmTypeReference>,
    ) -> CoercionResult<Option<EdmTypeReference>> {
        let incompatible = || CoercionError::IncompatibleOperands {
            operator: op.to_string(),
            left: type_name(left),
            right: type_name(right),
        };

        let (l, r) = match (left, right) {
            (None, None) => return Ok(None),
            (Some(known), None) | (None, Some(known)) => {
                let kind = known.as_primitive().ok_or_else(incompatible)?;
                if kind.is_numeric() && op.is_arithmetic() {
                    let promoted = Self::promote_numeric(kind, kind).ok_or_else(incompatible)?;
                    return Ok(Some(EdmTypeReference::primitive(promoted, true)));
                }
                if !Self::operator_accepts(op, kind) {
                    return Err(incompatible());
                }
                return Ok(Some(known.with_nullable(true)));
            }
            (Some(l), Some(r)) => (l, r),
        };

        let (lk, rk) = match (l.as_primitive(), r.as_primitive()) {
            (Some(lk), Some(rk)) => (lk, rk),
            _ => return Err(incompatible()),
        };
        let nullable = l.is_nullable() || r.is_nullable();

        let common = if lk == rk && !(op.is_arithmetic() && !NUMERIC_SIGNATURES.contains(&lk)) {
            lk
        } else if lk.is_numeric() && rk.is_numeric() {
            Self::promote_numeric(lk, rk).ok_or_else(incompatible)?
        } else {
            return Err(incompatible());
        };

        if !Self::operator_accepts(op, common) {
            return Err(incompatible());
        }
        Ok(Some(EdmTypeReference::primitive(common, nullable)))
    }

    /// Operand type after promotion for a unary operator
    pub fn promote_unary_operand(
        op: UnaryOperatorKind,
        operand: Option<&EdmTypeReference>,
    ) -> CoercionResult<Option<EdmTypeReference>> {
        let Some(operand) = operand else {
            return Ok(None);
        };
        let incompatible = || CoercionError::IncompatibleOperand {
            operator: op.to_string(),
            operand: operand.full_name(),
        };
        let kind = operand.as_primitive().ok_or_else(incompatible)?;
        match op {
            UnaryOperatorKind::Not if kind == EdmPrimitiveTypeKind::Boolean => Ok(Some(operand.clone())),
            UnaryOperatorKind::Negate if kind.is_numeric() => {
                let promoted = if NUMERIC_SIGNATURES.contains(&kind) {
                    kind
                } else {
                    Self::promote_numeric(kind, kind).ok_or_else(incompatible)?
                };
                Ok(Some(EdmTypeReference::primitive(promoted, operand.is_nullable())))
            }
            _ => Err(incompatible()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EdmPrimitiveTypeKind::*;
    use rstest::rstest;

    fn prim(kind: EdmPrimitiveTypeKind) -> EdmTypeReference {
        EdmTypeReference::primitive(kind, false)
    }

    #[rstest]
    #[case(Int32, Decimal, Decimal)]
    #[case(Int16, Int64, Int64)]
    #[case(Byte, Byte, Int32)]
    #[case(Single, Double, Double)]
    #[case(Int64, Single, Single)]
    fn test_arithmetic_promotion(
        #[case] left: EdmPrimitiveTypeKind,
        #[case] right: EdmPrimitiveTypeKind,
        #[case] expected: EdmPrimitiveTypeKind,
    ) {
        let result =
            TypePromotion::promote_binary_operands(BinaryOperatorKind::Add, Some(&prim(left)), Some(&prim(right)))
                .unwrap();
        assert_eq!(result.and_then(|t| t.as_primitive()), Some(expected));
    }

    #[test]
    fn test_double_and_decimal_do_not_mix() {
        let result = TypePromotion::promote_binary_operands(
            BinaryOperatorKind::Equal,
            Some(&prim(Double)),
            Some(&prim(Decimal)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_logical_requires_boolean() {
        assert!(
            TypePromotion::promote_binary_operands(BinaryOperatorKind::And, Some(&prim(Int32)), Some(&prim(Boolean)))
                .is_err()
        );
        assert!(
            TypePromotion::promote_binary_operands(BinaryOperatorKind::Or, Some(&prim(Boolean)), None).is_ok()
        );
    }

    #[test]
    fn test_untyped_side_adopts_other_type() {
        let result =
            TypePromotion::promote_binary_operands(BinaryOperatorKind::Equal, Some(&prim(String)), None).unwrap();
        assert_eq!(result, Some(EdmTypeReference::primitive(String, true)));
        assert_eq!(
            TypePromotion::promote_binary_operands(BinaryOperatorKind::Equal, None, None).unwrap(),
            None
        );
    }

    #[test]
    fn test_strings_do_not_add() {
        assert!(
            TypePromotion::promote_binary_operands(BinaryOperatorKind::Add, Some(&prim(String)), Some(&prim(String)))
                .is_err()
        );
    }

    #[test]
    fn test_unary() {
        let negated = TypePromotion::promote_unary_operand(UnaryOperatorKind::Negate, Some(&prim(Byte))).unwrap();
        assert_eq!(negated.and_then(|t| t.as_primitive()), Some(Int32));
        assert!(TypePromotion::promote_unary_operand(UnaryOperatorKind::Not, Some(&prim(Int32))).is_err());
    }

    #[test]
    fn test_can_convert() {
        assert!(TypePromotion::can_convert(&prim(Int32), &prim(Decimal)));
        assert!(!TypePromotion::can_convert(&prim(Decimal), &prim(Int32)));
        assert!(!TypePromotion::can_convert(&prim(Double), &prim(Decimal)));
    }
}
