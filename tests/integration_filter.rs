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

//! `$filter` and `$orderby` binding against the sample model

mod common;

use common::{error_code, parse, sample_model};
use odata_uri_parser::ast::{BinaryOperatorKind, LambdaKind, OrderByDirection};
use odata_uri_parser::semantic::{CollectionNode, RangeVariable, SingleValueNode};
use odata_uri_parser::{ODataUriParser, UriBuilder};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn filter(uri: &str) -> SingleValueNode {
    parse(uri)
        .unwrap_or_else(|err| panic!("'{uri}' failed: {err}"))
        .filter
        .expect("filter clause")
        .expression
}

fn property_name(node: &SingleValueNode) -> Option<&str> {
    match node {
        SingleValueNode::PropertyAccess(access) => Some(&access.property),
        SingleValueNode::Convert(convert) => property_name(&convert.source),
        _ => None,
    }
}

#[test]
fn test_amount_range_binds_to_and_of_comparisons() {
    let uri = parse("Orders?$filter=Amount gt 100 and Amount lt 200").unwrap();
    let clause = uri.filter.as_ref().unwrap();
    assert_eq!(clause.range_variable.name(), "$it");
    assert!(matches!(clause.range_variable, RangeVariable::Entity(_)));

    let SingleValueNode::BinaryOperator(and) = &clause.expression else {
        panic!("expected a binary operator, got {}", clause.expression.kind_name());
    };
    assert_eq!(and.kind, BinaryOperatorKind::And);
    for (child, kind) in [
        (&and.left, BinaryOperatorKind::GreaterThan),
        (&and.right, BinaryOperatorKind::LessThan),
    ] {
        let SingleValueNode::BinaryOperator(comparison) = child.as_ref() else {
            panic!("expected a comparison");
        };
        assert_eq!(comparison.kind, kind);
        assert_eq!(property_name(&comparison.left), Some("Amount"));
        assert_eq!(comparison.right.kind_name(), "Convert");
    }
    assert!(clause.expression.type_reference().is_some_and(|ty| ty.is_boolean()));

    assert_eq!(UriBuilder::build_filter(clause).unwrap(), "Amount gt 100 and Amount lt 200");
}

#[rstest]
#[case("Amount gt 100 and Amount lt 200")]
#[case("Amount gt 1 or Amount lt 0 and ID eq 3")]
#[case("(Amount gt 1 or Amount lt 0) and ID eq 3")]
#[case("ID sub (2 sub 1) eq 0")]
#[case("(ID add 1) mul 2 gt 4")]
#[case("ID add 1 mul 2 gt 4")]
#[case("not (ID eq 1)")]
#[case("-ID lt 0")]
#[case("Customer/Name eq 'Bob'")]
#[case("Placed eq null")]
#[case("startswith(Customer/Name,'B')")]
#[case("round(Amount) eq 3")]
#[case("Lines/any(l: l/Quantity gt 1)")]
#[case("Lines/all(l: l/Product/Title ne null)")]
#[case("Lines/any()")]
fn test_filter_text_survives_rebuild(#[case] text: &str) {
    let uri = parse(&format!("Orders?$filter={text}")).unwrap();
    assert_eq!(UriBuilder::build_filter(uri.filter.as_ref().unwrap()).unwrap(), text);
}

#[test]
fn test_lambda_over_navigation() {
    let SingleValueNode::Any(lambda) = filter("Customers?$filter=Orders/any(o: o/Amount gt 100)") else {
        panic!("expected any");
    };
    assert_eq!(lambda.kind, LambdaKind::Any);
    assert!(matches!(*lambda.source, CollectionNode::CollectionNavigation(_)));
    let variable = lambda.range_variable.as_ref().unwrap();
    assert_eq!(variable.name(), "o");
    assert!(matches!(variable, RangeVariable::Entity(_)));
    assert!(lambda.body.is_some());
}

#[test]
fn test_lambda_over_primitive_collection() {
    let SingleValueNode::All(lambda) = filter("Customers?$filter=Emails/all(e: endswith(e,'.org'))") else {
        panic!("expected all");
    };
    assert!(matches!(*lambda.source, CollectionNode::CollectionPropertyAccess(_)));
    assert!(matches!(lambda.range_variable, Some(RangeVariable::NonEntity(_))));
}

#[test]
fn test_nested_lambdas_see_outer_variables() {
    let uri = "Customers?$filter=Orders/any(o: o/Lines/any(l: l/Quantity gt 1 and o/Amount gt 5))";
    assert!(matches!(filter(uri), SingleValueNode::Any(_)));
}

#[rstest]
#[case::non_collection_source("Customers?$filter=Name/any(x: x eq 'a')", "OD0067")]
#[case::non_boolean_body("Customers?$filter=Orders/any(o: o/Amount)", "OD0054")]
#[case::variable_out_of_scope("Customers?$filter=Orders/any(o: o/Amount gt 1) and o/Amount gt 1", "OD0051")]
fn test_lambda_errors(#[case] uri: &str, #[case] code: &str) {
    assert_eq!(error_code(uri), code);
}

#[test]
fn test_navigation_and_complex_access() {
    let node = filter("Orders?$filter=Customer/Address/City eq 'Oslo'");
    let SingleValueNode::BinaryOperator(eq) = node else {
        panic!("expected eq");
    };
    let SingleValueNode::PropertyAccess(city) = eq.left.as_ref() else {
        panic!("expected a property access");
    };
    assert_eq!(city.property, "City");
    let SingleValueNode::PropertyAccess(address) = city.source.as_ref() else {
        panic!("expected the address");
    };
    let SingleValueNode::SingleNavigation(customer) = address.source.as_ref() else {
        panic!("expected a navigation");
    };
    assert_eq!(customer.entity_set.as_deref(), Some("Customers"));
}

#[test]
fn test_open_properties() {
    let node = filter("Products?$filter=Color eq 'red'");
    let SingleValueNode::BinaryOperator(eq) = node else {
        panic!("expected eq");
    };
    assert!(matches!(eq.left.as_ref(), SingleValueNode::OpenPropertyAccess(_)));

    // Open complex types are not searched for undeclared members
    assert_eq!(error_code("Customers?$filter=Extra/Color eq 'red'"), "OD0059");
}

#[test]
fn test_type_functions() {
    let SingleValueNode::FunctionCall(isof) = filter("Customers?$filter=isof('NS.VipCustomer')") else {
        panic!("expected isof");
    };
    assert_eq!(isof.name, "isof");
    assert_eq!(isof.arguments.len(), 2);
    assert!(isof.type_ref.as_ref().is_some_and(|ty| ty.is_boolean()));

    let node = filter("Orders?$filter=isof(Customer,NS.VipCustomer)");
    assert!(matches!(node, SingleValueNode::FunctionCall(_)));

    let uri = parse("Orders?$filter=cast(Customer,'NS.VipCustomer')/Level gt 1").unwrap();
    let text = UriBuilder::build_filter(uri.filter.as_ref().unwrap()).unwrap();
    assert_eq!(text, "cast(Customer,'NS.VipCustomer')/Level gt 1");

    assert_eq!(error_code("Customers?$filter=isof('NS.Missing')"), "OD0052");
    assert_eq!(error_code("Orders?$filter=cast(Customer,'NS.Order') ne null"), "OD0061");
}

#[test]
fn test_type_segments_in_paths() {
    let node = filter("Customers?$filter=NS.VipCustomer/Level gt 2");
    let SingleValueNode::BinaryOperator(gt) = node else {
        panic!("expected gt");
    };
    let SingleValueNode::PropertyAccess(level) = gt.left.as_ref() else {
        panic!("expected a property access");
    };
    assert!(matches!(level.source.as_ref(), SingleValueNode::SingleEntityCast(_)));

    assert!(matches!(
        filter("Customers?$filter=Orders/NS.Order/any(o: o/Amount gt 1)"),
        SingleValueNode::Any(_)
    ));
    assert_eq!(error_code("Customers?$filter=NS.Order/Amount gt 2"), "OD0061");
    assert_eq!(error_code("Customers?$filter=NS.Address/City eq 'x'"), "OD0069");
}

#[test]
fn test_service_operations_in_filters() {
    let node = filter("Customers?$filter=OrderCount() gt 2");
    let SingleValueNode::BinaryOperator(gt) = node else {
        panic!("expected gt");
    };
    let SingleValueNode::FunctionCall(call) = gt.left.as_ref() else {
        panic!("expected a function call");
    };
    assert_eq!(call.name, "OrderCount");
    assert!(call.source.is_some());

    assert_eq!(error_code("Customers?$filter=NoSuchThing() gt 2"), "OD0070");
    assert_eq!(error_code("Customers?$filter=Ping() eq null"), "OD0069");
}

#[test]
fn test_service_operation_returning_collection() {
    let node = filter("Customers?$filter=RecentOrders(days=7)/any(o: o/Amount gt 1)");
    let SingleValueNode::Any(lambda) = node else {
        panic!("expected any");
    };
    assert!(matches!(*lambda.source, CollectionNode::CollectionFunctionCall(_)));
}

#[rstest]
#[case::arity("Customers?$filter=startswith(Name)", "OD0056")]
#[case::argument_type("Customers?$filter=length(ID) gt 1", "OD0056")]
#[case::unknown_property("Customers?$filter=Nope eq 1", "OD0051")]
#[case::operand_types("Customers?$filter=Name eq 1", "OD0053")]
#[case::not_boolean("Customers?$filter=Name", "OD0054")]
#[case::collection_result("Customers?$filter=Orders", "OD0054")]
#[case::property_of_collection("Customers?$filter=Orders/Amount gt 1", "OD0072")]
#[case::filter_on_property("Customers(1)/Name?$filter=Name eq 'a'", "OD0055")]
#[case::syntax("Customers?$filter=Name eq", "OD0003")]
fn test_filter_errors(#[case] uri: &str, #[case] code: &str) {
    assert_eq!(error_code(uri), code);
}

#[test]
fn test_parameter_aliases() {
    let uri = parse("Customers?$filter=Name eq @n&@n='Bob'").unwrap();
    let text = UriBuilder::build_filter(uri.filter.as_ref().unwrap()).unwrap();
    assert_eq!(text, "Name eq 'Bob'");

    let uri = parse("Customers?$filter=ID eq @a&@a=@b&@b=4").unwrap();
    assert_eq!(UriBuilder::build_filter(uri.filter.as_ref().unwrap()).unwrap(), "ID eq 4");

    assert_eq!(error_code("Customers?$filter=Name eq @missing"), "OD0071");
    assert_eq!(error_code("Customers?$filter=Name eq @a&@a=@a"), "OD0071");
}

#[test]
fn test_order_by() {
    let uri = parse("Customers?$orderby=Name desc,Address/City,ID asc").unwrap();
    let clause = uri.order_by.as_ref().unwrap();
    let directions: Vec<_> = clause.items.iter().map(|item| item.direction).collect();
    assert_eq!(
        directions,
        vec![
            OrderByDirection::Descending,
            OrderByDirection::Ascending,
            OrderByDirection::Ascending
        ]
    );
    assert_eq!(UriBuilder::build_order_by(clause).unwrap(), "Name desc,Address/City,ID");

    assert_eq!(error_code("Customers?$orderby=Address"), "OD0064");
    assert_eq!(error_code("Customers(1)?$orderby=Name"), "OD0055");
}

#[test]
fn test_standalone_clauses() {
    let model = sample_model();
    let parser = ODataUriParser::new(&model);

    let clause = parser.parse_filter("Amount gt 10", "NS.Order", Some("Orders")).unwrap();
    assert_eq!(clause.range_variable.name(), "$it");
    let clause = parser.parse_order_by("Amount desc", "NS.Order", None).unwrap();
    assert_eq!(clause.items.len(), 1);

    let err = parser.parse_filter("ID eq 1", "NS.Nothing", None).unwrap_err();
    assert_eq!(err.code().to_string(), "OD0052");
}

#[test]
fn test_bound_tree_serializes() {
    let uri = parse("Orders?$filter=Amount gt 100").unwrap();
    let json = serde_json::to_value(&uri).unwrap();
    assert_eq!(json["filter"]["expression"]["kind"], "binaryOperator");
    assert_eq!(json["path"]["segments"][0]["kind"]["kind"], "entitySet");
}
