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

//! Function call binding
//!
//! Three families share the `name(args)` syntax: built-in canonical
//! functions, the type functions `isof` and `cast`, and service operations
//! resolved through the model.

use super::MetadataBinder;
use super::function_resolver::resolve_function_import;
use crate::ast::{FunctionCallToken, LiteralValue, QueryToken};
use crate::core::error_code::{OD0052, OD0053, OD0056, OD0061, OD0069, OD0070};
use crate::core::{ODataError, Result};
use crate::model::{EdmPrimitiveTypeKind, EdmTypeReference, FunctionImport, TypePromotion};
use crate::semantic::{
    CollectionFunctionCallNode, CollectionNode, ConstantNode, FunctionArgument, QueryNode,
    SingleValueFunctionCallNode, SingleValueNode,
};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Parameter and return kinds of one built-in overload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub parameters: Vec<EdmPrimitiveTypeKind>,
    pub return_type: EdmPrimitiveTypeKind,
}

impl FunctionSignature {
    fn new(parameters: &[EdmPrimitiveTypeKind], return_type: EdmPrimitiveTypeKind) -> Self {
        Self {
            parameters: parameters.to_vec(),
            return_type,
        }
    }
}

static BUILT_IN_FUNCTIONS: Lazy<FxHashMap<&'static str, Vec<FunctionSignature>>> = Lazy::new(|| {
    use EdmPrimitiveTypeKind::*;
    let mut table: FxHashMap<&'static str, Vec<FunctionSignature>> = FxHashMap::default();
    let mut add = |name: &'static str, parameters: &[EdmPrimitiveTypeKind], return_type| {
        table
            .entry(name)
            .or_default()
            .push(FunctionSignature::new(parameters, return_type));
    };

    for name in ["endswith", "startswith", "substringof"] {
        add(name, &[String, String], Boolean);
    }
    add("length", &[String], Int32);
    add("indexof", &[String, String], Int32);
    add("replace", &[String, String, String], String);
    add("substring", &[String, Int32], String);
    add("substring", &[String, Int32, Int32], String);
    for name in ["tolower", "toupper", "trim"] {
        add(name, &[String], String);
    }
    add("concat", &[String, String], String);

    for name in ["year", "month", "day", "hour", "minute", "second"] {
        add(name, &[DateTime], Int32);
        add(name, &[DateTimeOffset], Int32);
    }
    for name in ["hour", "minute", "second"] {
        add(name, &[Time], Int32);
    }
    for name in ["round", "floor", "ceiling"] {
        add(name, &[Double], Double);
        add(name, &[Decimal], Decimal);
    }
    table
});

pub struct FunctionCallBinder;

impl FunctionCallBinder {
    pub fn is_built_in(name: &str) -> bool {
        BUILT_IN_FUNCTIONS.contains_key(name)
    }

    pub fn built_in_signatures(name: &str) -> Option<&'static [FunctionSignature]> {
        BUILT_IN_FUNCTIONS.get(name).map(Vec::as_slice)
    }

    /// Match bound arguments against the overloads of a built-in function.
    ///
    /// An exact match wins over one that needs implicit conversions; untyped
    /// arguments (null, open properties) match any parameter.
    pub fn bind_built_in(name: &str, arguments: Vec<SingleValueNode>) -> Result<SingleValueNode> {
        let signatures = Self::built_in_signatures(name).ok_or_else(|| {
            ODataError::binding(OD0070, format!("unknown function '{name}'"))
        })?;
        let types: Vec<Option<&EdmTypeReference>> =
            arguments.iter().map(SingleValueNode::type_reference).collect();

        let arity = types.len();
        let same_arity = || signatures.iter().filter(move |s| s.parameters.len() == arity);
        let exact = same_arity().find(|signature| {
            signature
                .parameters
                .iter()
                .zip(&types)
                .all(|(param, arg)| arg.is_none_or(|ty| ty.as_primitive() == Some(*param)))
        });
        let signature = exact
            .or_else(|| {
                same_arity().find(|signature| {
                    signature.parameters.iter().zip(&types).all(|(param, arg)| {
                        arg.is_none_or(|ty| {
                            ty.as_primitive()
                                .is_some_and(|kind| TypePromotion::can_convert_primitive(kind, *param))
                        })
                    })
                })
            })
            .ok_or_else(|| {
                let found: Vec<String> = types
                    .iter()
                    .map(|ty| ty.map_or_else(|| "null".to_string(), EdmTypeReference::full_name))
                    .collect();
                ODataError::binding(
                    OD0056,
                    format!("no overload of '{name}' accepts ({})", found.join(", ")),
                )
            })?;

        let arguments = arguments
            .into_iter()
            .zip(&signature.parameters)
            .map(|(argument, param)| FunctionArgument {
                name: None,
                value: QueryNode::Single(convert_argument(argument, &EdmTypeReference::primitive(*param, true))),
            })
            .collect();

        Ok(SingleValueNode::FunctionCall(SingleValueFunctionCallNode {
            name: name.to_string(),
            arguments,
            source: None,
            type_ref: Some(EdmTypeReference::primitive(signature.return_type, true)),
            entity_set: None,
        }))
    }
}

/// Convert unless the argument already has the target type (nullability aside)
fn convert_argument(argument: SingleValueNode, target: &EdmTypeReference) -> SingleValueNode {
    match argument.type_reference() {
        Some(current) if current.is_equivalent_to(target) => argument,
        _ => argument.convert_to(target),
    }
}

fn require_single(node: QueryNode, context: &str) -> Result<SingleValueNode> {
    match node {
        QueryNode::Single(single) => Ok(single),
        QueryNode::Collection(collection) => Err(ODataError::binding(
            OD0053,
            format!("{context} must be a single value, found {}", collection.kind_name()),
        )),
    }
}

impl MetadataBinder<'_> {
    pub(crate) fn bind_function_call(&mut self, call: &FunctionCallToken) -> Result<QueryNode> {
        if call.parent.is_none() && !call.name.contains('.') {
            match call.name.as_str() {
                "isof" | "cast" => return self.bind_type_function(call),
                name if FunctionCallBinder::is_built_in(name) => {
                    let mut arguments = Vec::with_capacity(call.arguments.len());
                    for argument in &call.arguments {
                        if let Some(param) = &argument.name {
                            return Err(ODataError::binding(
                                OD0056,
                                format!("built-in function '{name}' does not take the named argument '{param}'"),
                            ));
                        }
                        let bound = self.bind(&argument.value)?;
                        arguments.push(require_single(bound, &format!("argument of '{name}'"))?);
                    }
                    return FunctionCallBinder::bind_built_in(name, arguments).map(QueryNode::Single);
                }
                _ => {}
            }
        }
        self.bind_service_operation(call)
    }

    /// `isof([source,] type)` and `cast([source,] type)`
    fn bind_type_function(&mut self, call: &FunctionCallToken) -> Result<QueryNode> {
        let name = call.name.as_str();
        let (type_argument, source_argument) = match call.arguments.as_slice() {
            [type_argument] => (type_argument, None),
            [source, type_argument] => (type_argument, Some(source)),
            _ => {
                return Err(ODataError::binding(
                    OD0056,
                    format!("'{name}' takes one or two arguments, found {}", call.arguments.len()),
                ));
            }
        };
        let type_name = match &type_argument.value {
            QueryToken::Literal(literal) => match &literal.value {
                LiteralValue::String(text) => text.clone(),
                _ => return Err(type_argument_error(name)),
            },
            QueryToken::DottedIdentifier(dotted) if dotted.parent.is_none() => dotted.identifier.clone(),
            _ => return Err(type_argument_error(name)),
        };
        let target = self.model().find_type_reference(&type_name, true).ok_or_else(|| {
            ODataError::binding(OD0052, format!("type '{type_name}' is not defined in the model"))
        })?;

        let source = match source_argument {
            Some(argument) => self.bind(&argument.value)?,
            None => self.implicit_reference()?,
        };
        let source = require_single(source, &format!("first argument of '{name}'"))?;

        let is_cast = name == "cast";
        if is_cast && target.is_entity() {
            let related = match (source.type_reference().and_then(EdmTypeReference::structured_name), target.structured_name()) {
                (Some(from), Some(to)) => source.is_entity() && self.model().are_related(from, to),
                _ => false,
            };
            if !related {
                return Err(ODataError::binding(
                    OD0061,
                    format!("cannot cast {} to unrelated type '{type_name}'", source.kind_name()),
                ));
            }
        }

        let entity_set = if is_cast && target.is_entity() {
            source.entity_set().map(str::to_string)
        } else {
            None
        };
        let type_ref = if is_cast { target } else { EdmTypeReference::boolean(true) };
        let type_constant = ConstantNode::new(LiteralValue::String(type_name.clone()), format!("'{type_name}'"));

        Ok(QueryNode::Single(SingleValueNode::FunctionCall(SingleValueFunctionCallNode {
            name: name.to_string(),
            arguments: vec![
                FunctionArgument {
                    name: None,
                    value: QueryNode::Single(source),
                },
                FunctionArgument {
                    name: None,
                    value: QueryNode::Single(SingleValueNode::Constant(type_constant)),
                },
            ],
            source: None,
            type_ref: Some(type_ref),
            entity_set,
        })))
    }

    /// Service operation call, bound to the parent (or `$it`) when a
    /// bindable overload exists, otherwise unbound
    fn bind_service_operation(&mut self, call: &FunctionCallToken) -> Result<QueryNode> {
        let mut parameter_names = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            match &argument.name {
                Some(param) => parameter_names.push(param.clone()),
                None => {
                    return Err(ODataError::binding(
                        OD0056,
                        format!("arguments of service operation '{}' must be named", call.name),
                    ));
                }
            }
        }

        let source = match call.parent.as_deref() {
            Some(parent) => Some(self.bind(parent)?),
            None => self.implicit_reference().ok(),
        };
        let binding_type = source.as_ref().and_then(binding_type_of);

        let mut import = match &binding_type {
            Some(binding_type) => {
                resolve_function_import(self.model(), &call.name, Some(binding_type), &parameter_names)?
            }
            None => None,
        };
        let bound = import.is_some();
        if import.is_none() && call.parent.is_none() {
            import = resolve_function_import(self.model(), &call.name, None, &parameter_names)?;
        }
        let Some(import) = import else {
            return Err(ODataError::binding(
                OD0070,
                format!("no service operation named '{}' matches the call", call.name),
            ));
        };
        let Some(return_type) = import.return_type.clone().filter(|_| !import.is_side_effecting) else {
            return Err(ODataError::binding(
                OD0069,
                format!("'{}' has no return value and cannot be used in an expression", call.name),
            ));
        };

        let arguments = self.bind_operation_arguments(call, &import)?;
        let source = if bound { source.map(Box::new) } else { None };

        Ok(match return_type.element_type() {
            Some(item_type) => QueryNode::Collection(CollectionNode::CollectionFunctionCall(CollectionFunctionCallNode {
                name: call.name.clone(),
                arguments,
                source,
                item_type: item_type.clone(),
                entity_set: import.entity_set.clone(),
            })),
            None => QueryNode::Single(SingleValueNode::FunctionCall(SingleValueFunctionCallNode {
                name: call.name.clone(),
                arguments,
                source,
                type_ref: Some(return_type),
                entity_set: import.entity_set.clone(),
            })),
        })
    }

    fn bind_operation_arguments(
        &mut self,
        call: &FunctionCallToken,
        import: &FunctionImport,
    ) -> Result<Vec<FunctionArgument>> {
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            let Some(param_name) = argument.name.as_deref() else {
                continue;
            };
            let Some(declared) = import.non_binding_parameters().iter().find(|p| p.name == param_name) else {
                return Err(ODataError::binding(
                    OD0056,
                    format!("'{}' has no parameter named '{param_name}'", call.name),
                ));
            };
            let bound = require_single(self.bind(&argument.value)?, &format!("parameter '{param_name}'"))?;
            if let Some(actual) = bound.type_reference() {
                if !TypePromotion::can_convert(actual, &declared.type_ref) {
                    return Err(ODataError::binding(
                        OD0053,
                        format!(
                            "parameter '{param_name}' of '{}' expects {}, found {actual}",
                            call.name, declared.type_ref
                        ),
                    ));
                }
            }
            arguments.push(FunctionArgument {
                name: Some(param_name.to_string()),
                value: QueryNode::Single(convert_argument(bound, &declared.type_ref)),
            });
        }
        Ok(arguments)
    }
}

/// Type a bound operation would receive as its binding parameter
fn binding_type_of(node: &QueryNode) -> Option<EdmTypeReference> {
    match node {
        QueryNode::Single(single) => single.type_reference().cloned(),
        QueryNode::Collection(collection) => Some(EdmTypeReference::collection(collection.item_type().clone())),
    }
}

fn type_argument_error(name: &str) -> ODataError {
    ODataError::binding(
        OD0056,
        format!("the last argument of '{name}' must be a type name"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn constant(value: LiteralValue, text: &str) -> SingleValueNode {
        SingleValueNode::Constant(ConstantNode::new(value, text))
    }

    #[rstest]
    #[case("length", 1, Some(EdmPrimitiveTypeKind::Int32))]
    #[case("substring", 2, Some(EdmPrimitiveTypeKind::String))]
    #[case("substring", 3, Some(EdmPrimitiveTypeKind::String))]
    #[case("substring", 4, None)]
    #[case("tolower", 1, Some(EdmPrimitiveTypeKind::String))]
    fn test_built_in_arity(#[case] name: &str, #[case] arity: usize, #[case] expected: Option<EdmPrimitiveTypeKind>) {
        let mut arguments = vec![constant(LiteralValue::String("abc".into()), "'abc'")];
        arguments.extend((1..arity).map(|i| constant(LiteralValue::Int32(i as i32), &i.to_string())));
        let result = FunctionCallBinder::bind_built_in(name, arguments);
        match expected {
            Some(kind) => {
                let node = result.unwrap();
                assert_eq!(node.type_reference().and_then(EdmTypeReference::as_primitive), Some(kind));
            }
            None => assert_eq!(result.unwrap_err().code(), OD0056),
        }
    }

    #[test]
    fn test_round_prefers_exact_overload() {
        let node = FunctionCallBinder::bind_built_in(
            "round",
            vec![constant(LiteralValue::Decimal(rust_decimal::Decimal::new(15, 1)), "1.5M")],
        )
        .unwrap();
        assert_eq!(
            node.type_reference().and_then(EdmTypeReference::as_primitive),
            Some(EdmPrimitiveTypeKind::Decimal)
        );
    }

    #[test]
    fn test_integer_argument_is_converted() {
        let node = FunctionCallBinder::bind_built_in("floor", vec![constant(LiteralValue::Int32(3), "3")]).unwrap();
        let SingleValueNode::FunctionCall(call) = node else {
            panic!("expected a function call");
        };
        assert!(matches!(call.arguments[0].value, QueryNode::Single(SingleValueNode::Convert(_))));
    }

    #[test]
    fn test_null_argument_matches_anything() {
        let node = FunctionCallBinder::bind_built_in("year", vec![constant(LiteralValue::Null, "null")]).unwrap();
        assert!(node.type_reference().is_some());
    }

    #[test]
    fn test_string_to_int_is_rejected() {
        let err = FunctionCallBinder::bind_built_in("length", vec![constant(LiteralValue::Int32(1), "1")]).unwrap_err();
        assert_eq!(err.code(), OD0056);
    }
}
