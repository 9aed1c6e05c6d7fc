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

//! Resource path binding against the sample model

mod common;

use common::{error_code, parse, parse_with, sample_model};
use odata_uri_parser::semantic::SegmentKind;
use odata_uri_parser::{ODataUriParser, ParserSettings, UrlConvention};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn kinds(uri: &str) -> Vec<String> {
    parse(uri)
        .unwrap_or_else(|err| panic!("'{uri}' failed: {err}"))
        .path
        .segments
        .iter()
        .map(|segment| match &segment.kind {
            SegmentKind::EntitySet { .. } => "set",
            SegmentKind::Key { .. } => "key",
            SegmentKind::NavigationProperty { .. } => "nav",
            SegmentKind::Property { .. } => "property",
            SegmentKind::OpenProperty { .. } => "open",
            SegmentKind::TypeCast { .. } => "cast",
            SegmentKind::Operation { .. } => "operation",
            SegmentKind::Count => "$count",
            SegmentKind::Value => "$value",
            SegmentKind::Links => "$links",
            SegmentKind::Metadata => "$metadata",
            SegmentKind::Batch => "$batch",
        })
        .map(str::to_string)
        .collect()
}

#[rstest]
#[case("Customers", &["set"])]
#[case("Customers(1)", &["set", "key"])]
#[case("Customers(ID=1)", &["set", "key"])]
#[case("Customers(1)/Orders", &["set", "key", "nav"])]
#[case("Customers(1)/Orders(2)/Customer", &["set", "key", "nav", "key", "nav"])]
#[case("Customers(1)/Address/City", &["set", "key", "property", "property"])]
#[case("Customers(1)/Name/$value", &["set", "key", "property", "$value"])]
#[case("Customers(1)/$value", &["set", "key", "$value"])]
#[case("Customers/$count", &["set", "$count"])]
#[case("Customers(1)/Orders/$count", &["set", "key", "nav", "$count"])]
#[case("Customers(1)/$links/Orders", &["set", "key", "$links", "nav"])]
#[case("Customers/NS.VipCustomer", &["set", "cast"])]
#[case("Customers(1)/NS.VipCustomer/Level", &["set", "key", "cast", "property"])]
#[case("Customers/NS.VipCustomer(3)", &["set", "cast", "key"])]
#[case("Products(1)/Color", &["set", "key", "open"])]
#[case("OrderLines(OrderID=1,Number=2)", &["set", "key"])]
#[case("$metadata", &["$metadata"])]
#[case("$batch", &["$batch"])]
fn test_path_shapes(#[case] uri: &str, #[case] expected: &[&str]) {
    assert_eq!(kinds(uri), expected);
}

#[test]
fn test_key_values_are_typed_by_the_key_property() {
    let uri = parse("OrderLines(Number=2,OrderID=1)").unwrap();
    let SegmentKind::Key { values } = &uri.path.segments[1].kind else {
        panic!("expected a key segment");
    };
    let names: Vec<_> = values.iter().map(|key| key.property.as_str()).collect();
    assert_eq!(names, vec!["Number", "OrderID"]);
    assert_eq!(uri.path.segments[1].to_string(), "(Number=2,OrderID=1)");
    assert!(uri.path.is_single_entity());
    assert_eq!(uri.path.entity_set(), Some("OrderLines"));
}

#[test]
fn test_navigation_follows_declared_target_set() {
    let uri = parse("Customers(1)/Orders(2)/Lines").unwrap();
    assert_eq!(uri.path.entity_set(), Some("OrderLines"));
    assert!(uri.path.is_entity_collection());
}

#[rstest]
#[case::too_few_values("OrderLines(1)")]
#[case::duplicate_name("OrderLines(OrderID=1,OrderID=2)")]
#[case::unknown_key_name("Customers(Foo=1)")]
#[case::unconvertible_value("Customers('x')")]
#[case::too_many_values("Customers(ID=1,Name='x')")]
fn test_bad_keys(#[case] uri: &str) {
    assert_eq!(error_code(uri), "OD0058");
}

#[rstest]
#[case::nav_on_collection("Customers/Orders")]
#[case::property_on_collection("Customers/Name")]
#[case::count_on_single("Customers(1)/$count")]
#[case::after_count("Customers/$count/Name")]
#[case::value_on_collection("Customers/$value")]
#[case::value_on_complex("Customers(1)/Address/$value")]
#[case::metadata_not_alone("Customers/$metadata")]
#[case::links_at_end("Customers(1)/$links")]
#[case::links_on_property("Customers(1)/$links/Name")]
#[case::links_on_collection("Customers/$links/Orders")]
#[case::key_on_single("Customers(1)/Address(1)")]
#[case::key_on_primitive_collection("Customers(1)/Emails(1)")]
#[case::unknown_system_segment("Customers/$foo")]
#[case::after_non_composable("TopCustomers()/$count")]
fn test_invalid_segments(#[case] uri: &str) {
    assert_eq!(error_code(uri), "OD0065");
}

#[rstest]
#[case("Nowhere")]
#[case("Customers(1)/Nowhere")]
fn test_unknown_resources(#[case] uri: &str) {
    assert_eq!(error_code(uri), "OD0066");
}

#[test]
fn test_unrelated_cast() {
    assert_eq!(error_code("Customers/NS.Order"), "OD0061");
}

#[test]
fn test_empty_parentheses_after_collection_mean_no_key() {
    assert_eq!(kinds("Customers()"), vec!["set"]);
    assert_eq!(kinds("Customers/Vips()"), vec!["set", "operation"]);
    assert_eq!(kinds("TopCustomers()"), vec!["operation"]);

    let uri = parse("Customers/Vips()").unwrap();
    let last = uri.path.last().unwrap();
    assert!(!last.single_result);
    assert_eq!(last.entity_set.as_deref(), Some("Customers"));
    let SegmentKind::Operation { parameters, .. } = &last.kind else {
        panic!("expected an operation segment");
    };
    assert!(parameters.is_empty());
}

#[test]
fn test_overloads_are_picked_by_parameter_names() {
    let uri = parse("GetOrders(minAmount=1)").unwrap();
    let SegmentKind::Operation { parameters, is_composable, .. } = &uri.path.segments[0].kind else {
        panic!("expected an operation segment");
    };
    assert_eq!(parameters.len(), 1);
    assert!(is_composable);

    let uri = parse("GetOrders(maxAmount=5,minAmount=1)").unwrap();
    let SegmentKind::Operation { parameters, .. } = &uri.path.segments[0].kind else {
        panic!("expected an operation segment");
    };
    let names: Vec<_> = parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["maxAmount", "minAmount"]);
    assert_eq!(
        parameters[0].value.type_reference().map(ToString::to_string),
        Some("Edm.Decimal".to_string())
    );

    assert_eq!(kinds("GetOrders(minAmount=1)/$count"), vec!["operation", "$count"]);
    assert_eq!(error_code("GetOrders(other=1)"), "OD0066");
}

#[test]
fn test_equally_matching_overloads_are_ambiguous() {
    assert_eq!(error_code("Lookup(code='a')"), "OD0056");
}

#[test]
fn test_positional_operation_arguments_are_rejected() {
    assert_eq!(error_code("GetOrders(1)"), "OD0056");
}

#[test]
fn test_operation_argument_type_mismatch() {
    assert_eq!(error_code("GetOrders(minAmount='lots')"), "OD0053");
}

#[test]
fn test_actions_never_take_url_parameters() {
    let err = parse("ResetOrders(reason='x')").unwrap_err();
    assert!(err.is_bad_request());
    assert_eq!(err.code().to_string(), "OD0057");

    let uri = parse("Ping()").unwrap();
    let SegmentKind::Operation {
        is_side_effecting,
        is_composable,
        ..
    } = &uri.path.segments[0].kind
    else {
        panic!("expected an operation segment");
    };
    assert!(is_side_effecting);
    assert!(!is_composable);
}

#[test]
fn test_bound_operation_on_single_entity() {
    assert_eq!(kinds("Customers(1)/RecentOrders(days=7)"), vec!["set", "key", "operation"]);
    assert_eq!(
        kinds("Customers(1)/Container.RecentOrders(days=7)/$count"),
        vec!["set", "key", "operation", "$count"]
    );
    let uri = parse("Customers(1)/RecentOrders(days=7)").unwrap();
    assert_eq!(uri.path.entity_set(), Some("Orders"));
    assert!(uri.path.is_entity_collection());
}

#[test]
fn test_bound_operation_binds_to_derived_types() {
    assert_eq!(
        kinds("Customers(1)/NS.VipCustomer/OrderCount()"),
        vec!["set", "key", "cast", "operation"]
    );
}

#[test]
fn test_key_as_segment_convention() {
    let settings = ParserSettings::default().with_url_convention(UrlConvention::KeyAsSegment);
    let uri = parse_with("Customers/1/Orders", settings.clone()).unwrap();
    let shape: Vec<_> = uri.path.segments.iter().map(ToString::to_string).collect();
    assert_eq!(shape, vec!["Customers", "(ID=1)", "Orders"]);

    // Members and casts are not taken for keys
    let uri = parse_with("Customers/NS.VipCustomer/5/Level", settings.clone()).unwrap();
    assert_eq!(uri.path.segments.len(), 4);
    assert!(parse_with("Customers(1)/Orders/2", settings).is_ok());
}

#[test]
fn test_parse_path_without_query() {
    let model = sample_model();
    let parser = ODataUriParser::new(&model);
    let path = parser.parse_path("Customers(1)/Orders").unwrap();
    assert_eq!(path.segments.len(), 3);
    assert!(parser.parse_path("Customers(1)/Nope").is_err());
}

#[test]
fn test_uri_against_service_root() {
    let model = sample_model();
    let parser = ODataUriParser::new(&model);
    let uri = parser
        .parse_uri("http://host/svc/Customers(1)?$select=Name", Some("http://host/svc/"))
        .unwrap();
    assert_eq!(uri.service_root.as_deref(), Some("http://host/svc/"));
    assert_eq!(uri.path.segments.len(), 2);
    assert!(uri.select_expand.is_some());

    let err = parser
        .parse_uri("http://elsewhere/svc/Customers", Some("http://host/svc/"))
        .unwrap_err();
    assert_eq!(err.code().to_string(), "OD0066");
}

#[test]
fn test_path_segment_limit() {
    let settings = ParserSettings::default().with_max_depth(2);
    let err = parse_with("Customers(1)/Orders(2)/Customer", settings).unwrap_err();
    assert_eq!(err.code().to_string(), "OD0004");
}
