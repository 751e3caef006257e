use conductor_query_planner::ast::{selection_set::SelectionSet, type_ref::TypeRef};
use serde_json::Value;
use tracing::trace;

use crate::{
    response::graphql_error::{GraphQLErrorPath, GraphQLErrorPathSegment},
    utils::traverse::set_value_at,
};

/// Propagates the `null` written at each failed location up to the nearest ancestor
/// that the operation declares nullable. When no such ancestor exists, `data` itself
/// becomes `null`.
pub fn bubble_nulls(data: &mut Value, selections: &SelectionSet, failed: &[GraphQLErrorPath]) {
    for path in failed {
        let nullability = nullability_along(selections, path);

        let Some(nullable_at) = nullability.iter().rposition(|nullable| *nullable) else {
            trace!(%path, "no nullable ancestor, nulling the whole response");
            *data = Value::Null;
            return;
        };

        if nullable_at + 1 == path.len() {
            continue;
        }

        let target = GraphQLErrorPath::new(path.segments[..=nullable_at].to_vec());
        trace!(%path, %target, "bubbling null");
        set_value_at(data, &target, Value::Null);
    }
}

/// For every prefix of `path`, whether the operation allows a `null` there.
/// Locations the operation does not describe count as nullable.
fn nullability_along(selections: &SelectionSet, path: &GraphQLErrorPath) -> Vec<bool> {
    let mut nullability = Vec::with_capacity(path.len());
    let mut current_selections = Some(selections);
    let mut current_type: Option<&TypeRef> = None;

    for segment in &path.segments {
        match segment {
            GraphQLErrorPathSegment::String(response_name) => {
                match current_selections.and_then(|s| s.find_field(response_name)) {
                    Some(field) => {
                        nullability.push(!field.output_type.is_non_null());
                        current_type = Some(&field.output_type);
                        current_selections = Some(&field.selections);
                    }
                    None => {
                        nullability.push(true);
                        current_type = None;
                        current_selections = None;
                    }
                }
            }
            GraphQLErrorPathSegment::Index(_) => {
                let item_type = current_type.and_then(TypeRef::list_item);
                nullability.push(item_type.map_or(true, |item| !item.is_non_null()));
                current_type = item_type;
            }
        }
    }

    nullability
}
