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

//! Service operation overload resolution

use crate::core::error_code::{OD0056, OD0057, OD0062};
use crate::core::{ODataError, Result};
use crate::model::{EdmModel, EdmTypeReference, FunctionImport};
use rustc_hash::FxHashSet;

pub struct FunctionOverloadResolver;

impl FunctionOverloadResolver {
    /// Pick the operation among `candidates` that takes exactly the
    /// parameters named in the URL.
    ///
    /// Actions cannot be overloaded and never take URL parameters. A function
    /// matches when its non-binding parameter names equal `parameter_names`
    /// as a set. `Ok(None)` means nothing matched.
    pub fn resolve_operation_from_list<'a>(
        name: &str,
        parameter_names: &[String],
        candidates: Vec<&'a FunctionImport>,
    ) -> Result<Option<&'a FunctionImport>> {
        if candidates.len() > 1 && candidates.iter().any(|c| c.is_side_effecting) {
            return Err(ODataError::binding(
                OD0062,
                format!("action '{name}' is overloaded; actions cannot be overloaded"),
            ));
        }

        if let [only] = candidates.as_slice() {
            if only.is_side_effecting {
                if !parameter_names.is_empty() {
                    return Err(ODataError::binding(
                        OD0057,
                        format!("action '{name}' cannot take parameters in the URL"),
                    ));
                }
                return Ok(Some(*only));
            }
        }

        let wanted: FxHashSet<&str> = parameter_names.iter().map(String::as_str).collect();
        let mut matching = candidates.into_iter().filter(|candidate| {
            let declared = candidate.non_binding_parameters();
            declared.len() == wanted.len() && declared.iter().all(|p| wanted.contains(p.name.as_str()))
        });

        match (matching.next(), matching.next()) {
            (None, _) => Ok(None),
            (Some(found), None) => Ok(Some(found)),
            (Some(_), Some(_)) => Err(ODataError::binding(
                OD0056,
                format!(
                    "more than one overload of '{name}' matches the parameters [{}]",
                    parameter_names.join(", ")
                ),
            )),
        }
    }
}

/// Resolve an operation by name, optional binding type and URL parameter names.
///
/// A model exposing [`crate::model::UriParserModelExtensions`] takes over
/// resolution entirely.
pub fn resolve_function_import(
    model: &dyn EdmModel,
    name: &str,
    binding_type: Option<&EdmTypeReference>,
    parameter_names: &[String],
) -> Result<Option<FunctionImport>> {
    if let Some(extensions) = model.uri_parser_extensions() {
        log::trace!("resolving operation '{name}' through model extensions");
        return extensions.find_function_import(name, binding_type, parameter_names);
    }

    let candidates = match binding_type {
        Some(binding_type) => model.find_bindable_function_imports(name, binding_type),
        None => model.find_unbound_function_imports(name),
    };
    if candidates.is_empty() {
        return Ok(None);
    }
    FunctionOverloadResolver::resolve_operation_from_list(name, parameter_names, candidates)
        .map(|found| found.cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdmModelBuilder;
    use crate::model::InMemoryModel;
    use pretty_assertions::assert_eq;

    fn model() -> InMemoryModel {
        EdmModelBuilder::new("NS", "Container")
            .entity_type("Item", |t| t.key("Id").property("Id", "Edm.Int32", false))
            .entity_set("Items", "NS.Item")
            .function_import("Find", |f| f.returns("Edm.Int32"))
            .function_import("Find", |f| f.returns("Edm.Int32").parameter("a", "Edm.Int32"))
            .function_import("Find", |f| {
                f.returns("Edm.Int32").parameter("a", "Edm.Int32").parameter("b", "Edm.String")
            })
            .function_import("Touch", |f| f.side_effecting())
            .function_import("Reset", |f| f.side_effecting())
            .function_import("Reset", |f| f.side_effecting().parameter("x", "Edm.Int32"))
            .function_import("Twin", |f| f.returns("Edm.Int32").parameter("a", "Edm.Int32"))
            .function_import("Twin", |f| f.returns("Edm.String").parameter("a", "Edm.Int32"))
            .build()
            .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_overload_selected_by_parameter_names() {
        let model = model();
        let found = resolve_function_import(&model, "Find", None, &names(&["b", "a"]))
            .unwrap()
            .unwrap();
        assert_eq!(found.parameters.len(), 2);

        let found = resolve_function_import(&model, "Find", None, &[]).unwrap().unwrap();
        assert!(found.parameters.is_empty());

        assert!(resolve_function_import(&model, "Find", None, &names(&["c"])).unwrap().is_none());
    }

    #[test]
    fn test_container_qualified_name() {
        let model = model();
        assert!(resolve_function_import(&model, "Container.Find", None, &[]).unwrap().is_some());
        assert!(resolve_function_import(&model, "Other.Find", None, &[]).unwrap().is_none());
    }

    #[test]
    fn test_action_rules() {
        let model = model();
        assert!(resolve_function_import(&model, "Touch", None, &[]).unwrap().is_some());
        let err = resolve_function_import(&model, "Touch", None, &names(&["x"])).unwrap_err();
        assert_eq!(err.code(), OD0057);
        let err = resolve_function_import(&model, "Reset", None, &[]).unwrap_err();
        assert_eq!(err.code(), OD0062);
    }

    #[test]
    fn test_ambiguous_overloads() {
        let model = model();
        let err = resolve_function_import(&model, "Twin", None, &names(&["a"])).unwrap_err();
        assert_eq!(err.code(), OD0056);
    }
}
