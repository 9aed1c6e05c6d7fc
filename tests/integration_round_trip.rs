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

//! Bound URIs written back out by `UriBuilder` bind to the same tree

mod common;

use common::{parse, sample_model};
use odata_uri_parser::{ODataUriParser, UriBuilder};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("Orders?$filter=Amount gt 100 and Amount lt 200")]
#[case("Orders?$filter=ID gt - 5")]
#[case("Orders?$filter=ID gt -5 and -Amount lt 0")]
#[case("Customers(1)/Orders?$filter=Amount ge 10&$orderby=Amount desc,ID&$top=5&$skip=10&$inlinecount=allpages")]
#[case("OrderLines(OrderID=1,Number=2)/Product")]
#[case("Customers(1)/$links/Orders")]
#[case("Customers/$count?$filter=startswith(Name,'A')")]
#[case("Customers/NS.VipCustomer?$filter=Level gt 1")]
#[case("GetOrders(minAmount=5)?$top=1")]
#[case("Customers(1)/RecentOrders(days=7)/$count")]
#[case("Customers?$select=Name,Orders&$expand=Orders")]
#[case("Customers?$select=Orders/Amount&$expand=Orders($filter=Amount gt 1;$top=3)")]
#[case("Customers?$expand=Orders($expand=Lines($select=Quantity))")]
#[case("Customers?$filter=Orders/any(o: o/Amount gt 100)&$format=json&x-trace=on")]
fn test_rebuilt_uri_binds_to_the_same_tree(#[case] uri: &str) {
    let first = parse(uri).unwrap();
    let rebuilt = UriBuilder::build_uri(&first).unwrap();
    let second = parse(&rebuilt).unwrap_or_else(|err| panic!("rebuilt '{rebuilt}' failed: {err}"));
    assert_eq!(second, first, "rebuilt as '{rebuilt}'");
}

#[test]
fn test_rebuilt_query_is_encoded() {
    let uri = parse("Orders?$filter=Amount gt 100 and Amount lt 200&$top=2").unwrap();
    assert_eq!(
        UriBuilder::build_uri(&uri).unwrap(),
        "Orders?$filter=Amount%20gt%20100%20and%20Amount%20lt%20200&$top=2"
    );
}

#[test]
fn test_rebuilt_select_and_expand() {
    let uri = parse("Customers?$select=Orders/Amount&$expand=Orders").unwrap();
    let (select, expand) = UriBuilder::build_select_expand(uri.select_expand.as_ref().unwrap()).unwrap();
    assert_eq!(select.as_deref(), Some("Orders/Amount"));
    assert_eq!(expand.as_deref(), Some("Orders($select=Amount)"));
}

#[test]
fn test_service_root_is_kept() {
    let model = sample_model();
    let parser = ODataUriParser::new(&model);
    let uri = parser
        .parse_uri("http://host/svc/Customers(1)/Orders?$top=1", Some("http://host/svc/"))
        .unwrap();
    assert_eq!(
        UriBuilder::build_uri(&uri).unwrap(),
        "http://host/svc/Customers(1)/Orders?$top=1"
    );
}

#[test]
fn test_metadata_document() {
    let uri = parse("$metadata").unwrap();
    assert_eq!(UriBuilder::build_uri(&uri).unwrap(), "$metadata");
}
