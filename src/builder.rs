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

//! Rendering bound trees back to URI text
//!
//! Output re-parses and re-binds to an equivalent tree. Implicit conversions
//! are dropped, constants print the literal text they were parsed from, and
//! parentheses are emitted only where the operator table requires them.

use crate::ast::{OrderByDirection, UnaryOperatorKind, operator::MAX_PRECEDENCE};
use crate::core::stack::with_stack;
use crate::core::{ODataError, Result};
use crate::parser::IMPLICIT_RANGE_VARIABLE;
use crate::semantic::{
    CollectionNode, FilterClause, FunctionArgument, LambdaNode, ODataPath, ODataUri, OrderByClause,
    QueryNode, SegmentKind, SelectExpandClause, SelectItem, Selection, SingleValueNode,
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in query option values
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>');

/// Characters escaped in resource path segments
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'<')
    .add(b'>');

/// Band used for operands that never need parentheses
const ATOM_PRECEDENCE: u8 = MAX_PRECEDENCE + 1;

pub struct UriBuilder;

impl UriBuilder {
    /// Full URI: service root (if any), path and encoded query string
    pub fn build_uri(uri: &ODataUri) -> Result<String> {
        let mut out = uri.service_root.clone().unwrap_or_default();
        out.push_str(&Self::build_path(&uri.path)?);
        let query = Self::build_query(uri)?;
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query);
        }
        Ok(out)
    }

    /// Encoded query string without the leading `?`
    pub fn build_query(uri: &ODataUri) -> Result<String> {
        let mut options: Vec<(String, String)> = Vec::new();
        if let Some(filter) = &uri.filter {
            options.push(("$filter".into(), Self::build_filter(filter)?));
        }
        if let Some(order_by) = &uri.order_by {
            options.push(("$orderby".into(), Self::build_order_by(order_by)?));
        }
        if let Some(clause) = &uri.select_expand {
            let (select, expand) = Self::build_select_expand(clause)?;
            if let Some(select) = select {
                options.push(("$select".into(), select));
            }
            if let Some(expand) = expand {
                options.push(("$expand".into(), expand));
            }
        }
        if let Some(top) = uri.top {
            options.push(("$top".into(), top.to_string()));
        }
        if let Some(skip) = uri.skip {
            options.push(("$skip".into(), skip.to_string()));
        }
        if let Some(inline_count) = uri.inline_count {
            options.push(("$inlinecount".into(), inline_count.as_str().to_string()));
        }
        if let Some(format) = &uri.format {
            options.push(("$format".into(), format.clone()));
        }
        for custom in &uri.custom_query_options {
            options.push((custom.name.clone(), custom.value.clone()));
        }

        Ok(options
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, QUERY_VALUE),
                    utf8_percent_encode(value, QUERY_VALUE)
                )
            })
            .collect::<Vec<_>>()
            .join("&"))
    }

    pub fn build_path(path: &ODataPath) -> Result<String> {
        let mut out = String::new();
        for (index, segment) in path.segments.iter().enumerate() {
            match &segment.kind {
                SegmentKind::Metadata | SegmentKind::Batch if path.segments.len() != 1 => {
                    return Err(ODataError::not_supported(format!(
                        "'{segment}' combined with other path segments"
                    )));
                }
                SegmentKind::Key { values } => {
                    let rendered: Vec<String> = match values.as_slice() {
                        [single] => vec![single.value.literal_text.clone()],
                        many => many
                            .iter()
                            .map(|key| format!("{}={}", key.property, key.value.literal_text))
                            .collect(),
                    };
                    out.push('(');
                    out.push_str(&encode_path(&rendered.join(",")));
                    out.push(')');
                    continue;
                }
                SegmentKind::Operation { name, parameters, .. } => {
                    if index > 0 {
                        out.push('/');
                    }
                    out.push_str(name);
                    if !parameters.is_empty() {
                        let mut rendered = Vec::with_capacity(parameters.len());
                        for parameter in parameters {
                            rendered.push(format!("{}={}", parameter.name, Self::build_expression(&parameter.value)?));
                        }
                        out.push('(');
                        out.push_str(&encode_path(&rendered.join(",")));
                        out.push(')');
                    }
                    continue;
                }
                _ => {}
            }
            if index > 0 {
                out.push('/');
            }
            out.push_str(&encode_path(&segment.to_string()));
        }
        Ok(out)
    }

    /// Unencoded `$filter` text
    pub fn build_filter(clause: &FilterClause) -> Result<String> {
        Self::build_expression(&clause.expression)
    }

    /// Unencoded `$orderby` text
    pub fn build_order_by(clause: &OrderByClause) -> Result<String> {
        let mut items = Vec::with_capacity(clause.items.len());
        for item in &clause.items {
            let expression = Self::build_expression(&item.expression)?;
            items.push(match item.direction {
                OrderByDirection::Ascending => expression,
                OrderByDirection::Descending => format!("{expression} desc"),
            });
        }
        Ok(items.join(","))
    }

    pub fn build_expression(node: &SingleValueNode) -> Result<String> {
        let mut out = String::new();
        write_single(node, &mut out)?;
        Ok(out)
    }

    /// Unencoded `$select` and `$expand` values in option syntax
    pub fn build_select_expand(clause: &SelectExpandClause) -> Result<(Option<String>, Option<String>)> {
        let select = match clause.selection {
            Selection::All => None,
            _ => Some(select_paths(clause).join(",")).filter(|text| !text.is_empty()),
        };
        let expand = match clause.expansion {
            Some(_) => Some(expand_terms(clause, select.is_some())?),
            None => None,
        };
        Ok((select, expand))
    }
}

fn encode_path(text: &str) -> String {
    utf8_percent_encode(text, PATH_SEGMENT).to_string()
}

/// Select paths reaching the selection of `clause`, relative to it
fn select_paths(clause: &SelectExpandClause) -> Vec<String> {
    match &clause.selection {
        Selection::All => vec!["*".to_string()],
        Selection::Partial(items) => items
            .iter()
            .map(|item| match item {
                SelectItem::Path(path) => path.path_string(),
                SelectItem::NamespaceQualifiedWildcard { namespace } => format!("{namespace}.*"),
            })
            .collect(),
        Selection::ExpansionsOnly => clause
            .expansions()
            .iter()
            .flat_map(|item| {
                let prefix = item.path_string();
                select_paths(&item.select_and_expand)
                    .into_iter()
                    .map(move |path| format!("{prefix}/{path}"))
            })
            .collect(),
        Selection::Unknown => Vec::new(),
    }
}

fn expand_terms(clause: &SelectExpandClause, select_rendered: bool) -> Result<String> {
    let mut terms = Vec::new();
    for item in clause.expansions() {
        let mut options = Vec::new();
        if let Some(filter) = &item.filter {
            options.push(format!("$filter={}", UriBuilder::build_filter(filter)?));
        }
        if let Some(order_by) = &item.order_by {
            options.push(format!("$orderby={}", UriBuilder::build_order_by(order_by)?));
        }
        if let Some(top) = item.top {
            options.push(format!("$top={top}"));
        }
        if let Some(skip) = item.skip {
            options.push(format!("$skip={skip}"));
        }
        if let Some(inline_count) = item.inline_count {
            options.push(format!("$inlinecount={}", inline_count.as_str()));
        }
        let child = &item.select_and_expand;
        if select_rendered || child.selection != Selection::All {
            let paths = select_paths(child);
            if !paths.is_empty() {
                options.push(format!("$select={}", paths.join(",")));
            }
        }
        if child.expansion.is_some() {
            options.push(format!("$expand={}", with_stack(|| expand_terms(child, select_rendered))?));
        }

        let mut term = item.path_string();
        if !options.is_empty() {
            term.push('(');
            term.push_str(&options.join(";"));
            term.push(')');
        }
        terms.push(term);
    }
    Ok(terms.join(","))
}

/// Strip conversions, which are not part of the text
fn unwrap_convert(node: &SingleValueNode) -> &SingleValueNode {
    match node {
        SingleValueNode::Convert(convert) => unwrap_convert(&convert.source),
        other => other,
    }
}

fn precedence(node: &SingleValueNode) -> Result<u8> {
    match unwrap_convert(node) {
        SingleValueNode::BinaryOperator(binary) => Ok(binary.kind.info()?.precedence),
        _ => Ok(ATOM_PRECEDENCE),
    }
}

fn is_implicit_reference(node: &SingleValueNode) -> bool {
    match unwrap_convert(node) {
        SingleValueNode::RangeVariableReference(reference) => reference.name == IMPLICIT_RANGE_VARIABLE,
        SingleValueNode::EntityRangeVariableReference(reference) => reference.name == IMPLICIT_RANGE_VARIABLE,
        _ => false,
    }
}

fn write_parenthesized(node: &SingleValueNode, wrap: bool, out: &mut String) -> Result<()> {
    if wrap {
        out.push('(');
        write_single(node, out)?;
        out.push(')');
        Ok(())
    } else {
        write_single(node, out)
    }
}

/// `source/` prefix of a member access; empty for `$it`
fn write_source(source: &SingleValueNode, out: &mut String) -> Result<()> {
    if !is_implicit_reference(source) {
        write_single(source, out)?;
        out.push('/');
    }
    Ok(())
}

fn write_single(node: &SingleValueNode, out: &mut String) -> Result<()> {
    with_stack(|| write_single_node(node, out))
}

fn write_single_node(node: &SingleValueNode, out: &mut String) -> Result<()> {
    match node {
        SingleValueNode::Constant(constant) => out.push_str(&constant.literal_text),
        SingleValueNode::Convert(convert) => write_single(&convert.source, out)?,
        SingleValueNode::BinaryOperator(binary) => {
            let info = binary.kind.info()?;
            let left = precedence(&binary.left)?;
            let right = precedence(&binary.right)?;
            write_parenthesized(&binary.left, left < info.precedence, out)?;
            out.push(' ');
            out.push_str(info.text);
            out.push(' ');
            let wrap_right = right < info.precedence
                || (right == info.precedence && info.need_paren_even_when_the_same);
            write_parenthesized(&binary.right, wrap_right, out)?;
        }
        SingleValueNode::UnaryOperator(unary) => {
            out.push_str(unary.kind.text());
            // `-5` lexes back as one negative literal
            let spaced = unary.kind == UnaryOperatorKind::Not
                || matches!(unwrap_convert(&unary.operand), SingleValueNode::Constant(_));
            if spaced {
                out.push(' ');
            }
            let wrap = precedence(&unary.operand)? < ATOM_PRECEDENCE;
            write_parenthesized(&unary.operand, wrap, out)?;
        }
        SingleValueNode::RangeVariableReference(reference) => out.push_str(&reference.name),
        SingleValueNode::EntityRangeVariableReference(reference) => out.push_str(&reference.name),
        SingleValueNode::PropertyAccess(access) => {
            write_source(&access.source, out)?;
            out.push_str(&access.property);
        }
        SingleValueNode::OpenPropertyAccess(access) => {
            write_source(&access.source, out)?;
            out.push_str(&access.name);
        }
        SingleValueNode::SingleNavigation(navigation) => {
            write_source(&navigation.source, out)?;
            out.push_str(&navigation.navigation_property);
        }
        SingleValueNode::SingleEntityCast(cast) => {
            write_source(&cast.source, out)?;
            out.push_str(&cast.type_ref.full_name());
        }
        SingleValueNode::FunctionCall(call) => {
            write_function_call(&call.name, call.source.as_deref(), &call.arguments, out)?
        }
        SingleValueNode::Any(lambda) | SingleValueNode::All(lambda) => write_lambda(lambda, out)?,
    }
    Ok(())
}

fn write_collection(node: &CollectionNode, out: &mut String) -> Result<()> {
    match node {
        CollectionNode::CollectionNavigation(navigation) => {
            write_source(&navigation.source, out)?;
            out.push_str(&navigation.navigation_property);
        }
        CollectionNode::CollectionPropertyAccess(access) => {
            write_source(&access.source, out)?;
            out.push_str(&access.property);
        }
        CollectionNode::EntityCollectionCast(cast) => {
            write_collection(&cast.source, out)?;
            out.push('/');
            out.push_str(&cast.item_type.full_name());
        }
        CollectionNode::CollectionFunctionCall(call) => {
            write_function_call(&call.name, call.source.as_deref(), &call.arguments, out)?
        }
    }
    Ok(())
}

fn write_node(node: &QueryNode, out: &mut String) -> Result<()> {
    match node {
        QueryNode::Single(single) => write_single(single, out),
        QueryNode::Collection(collection) => write_collection(collection, out),
    }
}

fn write_function_call(
    name: &str,
    source: Option<&QueryNode>,
    arguments: &[FunctionArgument],
    out: &mut String,
) -> Result<()> {
    match source {
        Some(QueryNode::Single(single)) => write_source(single, out)?,
        Some(QueryNode::Collection(collection)) => {
            write_collection(collection, out)?;
            out.push('/');
        }
        None => {}
    }
    out.push_str(name);
    out.push('(');

    // The one-argument form of isof/cast is bound with `$it` as its source
    let skip_implicit = matches!(name, "isof" | "cast")
        && arguments
            .first()
            .is_some_and(|arg| matches!(&arg.value, QueryNode::Single(single) if is_implicit_reference(single)));
    let mut first = true;
    for argument in arguments.iter().skip(usize::from(skip_implicit)) {
        if !first {
            out.push(',');
        }
        first = false;
        if let Some(param) = &argument.name {
            out.push_str(param);
            out.push('=');
        }
        write_node(&argument.value, out)?;
    }
    out.push(')');
    Ok(())
}

fn write_lambda(lambda: &LambdaNode, out: &mut String) -> Result<()> {
    write_collection(&lambda.source, out)?;
    out.push('/');
    out.push_str(lambda.kind.keyword());
    out.push('(');
    match (&lambda.range_variable, &lambda.body) {
        (Some(variable), Some(body)) => {
            out.push_str(variable.name());
            out.push_str(": ");
            write_single(body, out)?;
        }
        (None, None) => {}
        _ => {
            return Err(ODataError::not_supported(format!(
                "'{}' with a range variable but no body",
                lambda.kind.keyword()
            )));
        }
    }
    out.push(')');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperatorKind, LiteralValue};
    use crate::model::EdmTypeReference;
    use crate::semantic::{BinaryOperatorNode, ConstantNode, ODataPathSegment, UnaryOperatorNode};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn int(value: i32) -> SingleValueNode {
        SingleValueNode::Constant(ConstantNode::new(LiteralValue::Int32(value), value.to_string()))
    }

    fn binary(kind: BinaryOperatorKind, left: SingleValueNode, right: SingleValueNode) -> SingleValueNode {
        SingleValueNode::BinaryOperator(BinaryOperatorNode {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            type_ref: None,
        })
    }

    #[rstest]
    #[case(binary(BinaryOperatorKind::Subtract, int(1), binary(BinaryOperatorKind::Subtract, int(2), int(3))), "1 sub (2 sub 3)")]
    #[case(binary(BinaryOperatorKind::Subtract, binary(BinaryOperatorKind::Subtract, int(1), int(2)), int(3)), "1 sub 2 sub 3")]
    #[case(binary(BinaryOperatorKind::Add, int(1), binary(BinaryOperatorKind::Add, int(2), int(3))), "1 add 2 add 3")]
    #[case(binary(BinaryOperatorKind::Multiply, binary(BinaryOperatorKind::Add, int(1), int(2)), int(3)), "(1 add 2) mul 3")]
    #[case(binary(BinaryOperatorKind::Add, int(1), binary(BinaryOperatorKind::Multiply, int(2), int(3))), "1 add 2 mul 3")]
    fn test_operator_parentheses(#[case] node: SingleValueNode, #[case] expected: &str) {
        assert_eq!(UriBuilder::build_expression(&node).unwrap(), expected);
    }

    fn negate(operand: SingleValueNode) -> SingleValueNode {
        SingleValueNode::UnaryOperator(UnaryOperatorNode {
            kind: UnaryOperatorKind::Negate,
            operand: Box::new(operand),
            type_ref: None,
        })
    }

    #[rstest]
    #[case(negate(int(5)), "- 5")]
    #[case(negate(negate(int(5))), "-- 5")]
    #[case(negate(binary(BinaryOperatorKind::Add, int(1), int(2))), "-(1 add 2)")]
    fn test_negation_stays_an_operator(#[case] node: SingleValueNode, #[case] expected: &str) {
        assert_eq!(UriBuilder::build_expression(&node).unwrap(), expected);
    }

    #[test]
    fn test_conversions_are_transparent() {
        let converted = int(5).convert_to(&EdmTypeReference::primitive(crate::model::EdmPrimitiveTypeKind::Int64, true));
        let node = binary(BinaryOperatorKind::Equal, converted, int(5));
        assert_eq!(UriBuilder::build_expression(&node).unwrap(), "5 eq 5");
    }

    #[test]
    fn test_metadata_must_stand_alone() {
        let path = ODataPath::new(vec![
            ODataPathSegment::untyped(SegmentKind::Metadata),
            ODataPathSegment::untyped(SegmentKind::Count),
        ]);
        assert!(UriBuilder::build_path(&path).is_err());
    }
}
