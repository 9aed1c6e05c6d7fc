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

//! OData URI parsing and semantic binding
//!
//! Turns an OData URI (resource path plus `$filter`, `$orderby`, `$select`,
//! `$expand`, `$top`, `$skip`, `$inlinecount` and custom options) into a
//! syntactic tree, then binds that tree against an EDM model into a typed
//! [`ODataUri`].
//!
//! ```no_run
//! use odata_uri_parser::{EdmModelBuilder, ODataUriParser};
//!
//! let model = EdmModelBuilder::new("NS", "Container")
//!     .entity_type("Order", |t| t.key("ID").property("ID", "Edm.Int32", false).property("Amount", "Edm.Decimal", true))
//!     .entity_set("Orders", "NS.Order")
//!     .build()?;
//! let uri = ODataUriParser::new(&model).parse_uri("Orders?$filter=Amount gt 100", None)?;
//! assert!(uri.filter.is_some());
//! # Ok::<(), odata_uri_parser::ODataError>(())
//! ```

pub mod ast;
pub mod binder;
pub mod builder;
pub mod config;
pub mod core;
pub mod finisher;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod semantic;
pub mod uri_parser;

// Re-export main types
pub use builder::UriBuilder;
pub use config::{DEFAULT_MAX_DEPTH, ExpandSyntax, ParserSettings, UrlConvention};
pub use crate::core::{ErrorCode, ODataError, Result};
pub use model::{EdmModel, EdmModelBuilder, EdmTypeReference, InMemoryModel, UriParserModelExtensions};
pub use parser::{
    parse_expand_syntax, parse_filter_syntax, parse_order_by_syntax, parse_select_syntax,
    parse_syntactic_tree,
};
pub use semantic::{ODataPath, ODataUri, SelectExpandClause};
pub use uri_parser::ODataUriParser;
