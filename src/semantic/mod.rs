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

//! Semantic tree: the typed output of binding

pub mod clauses;
pub mod nodes;
pub mod path;
pub mod select_expand;
pub mod uri;

pub use clauses::{FilterClause, OrderByClause, OrderByItem};
pub use nodes::{
    BinaryOperatorNode, CollectionFunctionCallNode, CollectionNavigationNode, CollectionNode,
    CollectionPropertyAccessNode, ConstantNode, ConvertNode, EntityCollectionCastNode,
    EntityRangeVariable, EntityRangeVariableReferenceNode, FunctionArgument, LambdaNode,
    NonEntityRangeVariable, QueryNode, RangeVariable, RangeVariableReferenceNode,
    SingleEntityCastNode, SingleNavigationNode, SingleValueFunctionCallNode, SingleValueNode,
    SingleValueOpenPropertyAccessNode, SingleValuePropertyAccessNode, UnaryOperatorNode,
};
pub use path::{KeyValue, ODataPath, ODataPathSegment, OperationParameter, SegmentKind};
pub use select_expand::{
    ExpandedNavigationSelectItem, PathSelectItem, SelectExpandClause, SelectItem, Selection,
};
pub use uri::ODataUri;
