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

//! Shared sample model for integration tests

#![allow(dead_code)]

use odata_uri_parser::model::Multiplicity;
use odata_uri_parser::{EdmModelBuilder, InMemoryModel, ODataError, ODataUri, ODataUriParser, ParserSettings};

/// Customers, orders and order lines, with a derived customer type, an open
/// product type and a handful of service operations
pub fn sample_model() -> InMemoryModel {
    EdmModelBuilder::new("NS", "Container")
        .complex_type("Address", |t| {
            t.property("Street", "Edm.String", true)
                .property("City", "Edm.String", true)
        })
        .complex_type("Bag", |t| t.open().property("Label", "Edm.String", true))
        .entity_type("Customer", |t| {
            t.key("ID")
                .property("ID", "Edm.Int32", false)
                .property("Name", "Edm.String", true)
                .property("Address", "NS.Address", true)
                .property("Emails", "Collection(Edm.String)", true)
                .property("Extra", "NS.Bag", true)
                .navigation("Orders", "Order", Multiplicity::Many)
        })
        .entity_type("VipCustomer", |t| {
            t.base_type("Customer").property("Level", "Edm.Int32", true)
        })
        .entity_type("Order", |t| {
            t.key("ID")
                .property("ID", "Edm.Int32", false)
                .property("Amount", "Edm.Decimal", true)
                .property("Placed", "Edm.DateTime", true)
                .navigation("Customer", "Customer", Multiplicity::ZeroOrOne)
                .navigation("Lines", "OrderLine", Multiplicity::Many)
        })
        .entity_type("OrderLine", |t| {
            t.key("OrderID")
                .key("Number")
                .property("OrderID", "Edm.Int32", false)
                .property("Number", "Edm.Int32", false)
                .property("Quantity", "Edm.Int32", true)
                .navigation("Product", "Product", Multiplicity::ZeroOrOne)
        })
        .entity_type("Product", |t| {
            t.key("ID")
                .open()
                .property("ID", "Edm.Int32", false)
                .property("Title", "Edm.String", true)
        })
        .entity_set("Customers", "Customer")
        .navigation_target("Orders", "Orders")
        .entity_set("Orders", "Order")
        .navigation_target("Customer", "Customers")
        .navigation_target("Lines", "OrderLines")
        .entity_set("OrderLines", "OrderLine")
        .entity_set("Products", "Product")
        .function_import("TopCustomers", |f| {
            f.returns("Collection(NS.Customer)").entity_set("Customers")
        })
        .function_import("GetOrders", |f| {
            f.returns("Collection(NS.Order)")
                .entity_set("Orders")
                .composable()
                .parameter("minAmount", "Edm.Decimal")
        })
        .function_import("GetOrders", |f| {
            f.returns("Collection(NS.Order)")
                .entity_set("Orders")
                .composable()
                .parameter("minAmount", "Edm.Decimal")
                .parameter("maxAmount", "Edm.Decimal")
        })
        .function_import("Lookup", |f| f.returns("Edm.String").parameter("code", "Edm.String"))
        .function_import("Lookup", |f| f.returns("Edm.Int32").parameter("code", "Edm.String"))
        .function_import("Ping", |f| f.side_effecting())
        .function_import("ResetOrders", |f| f.side_effecting().parameter("reason", "Edm.String"))
        .function_import("RecentOrders", |f| {
            f.bindable()
                .composable()
                .returns("Collection(NS.Order)")
                .entity_set("Orders")
                .parameter("customer", "NS.Customer")
                .parameter("days", "Edm.Int32")
        })
        .function_import("OrderCount", |f| {
            f.bindable()
                .returns("Edm.Int32")
                .parameter("customer", "NS.Customer")
        })
        .function_import("Vips", |f| {
            f.bindable()
                .returns("Collection(NS.VipCustomer)")
                .entity_set("Customers")
                .parameter("customers", "Collection(NS.Customer)")
        })
        .build()
        .expect("sample model is valid")
}

/// Parse and bind `uri` against the sample model with default settings
pub fn parse(uri: &str) -> Result<ODataUri, ODataError> {
    let model = sample_model();
    ODataUriParser::new(&model).parse_uri(uri, None)
}

pub fn parse_with(uri: &str, settings: ParserSettings) -> Result<ODataUri, ODataError> {
    let model = sample_model();
    ODataUriParser::new(&model).with_settings(settings).parse_uri(uri, None)
}

/// Error code of a URI that must fail, as `OD00xx`
pub fn error_code(uri: &str) -> String {
    match parse(uri) {
        Ok(bound) => panic!("expected '{uri}' to fail, bound {bound:?}"),
        Err(err) => err.code().to_string(),
    }
}
