use conductor_query_planner::planner::step::EXPORT_ALIAS_PREFIX;
use serde_json::Value;

use crate::response::{
    graphql_error::{GraphQLError, GraphQLErrorPath, GraphQLErrorPathSegment},
    subgraph_response::ENTITIES_FIELD,
};

pub const DOWNSTREAM_SERVICE_ERROR_CODE: &str = "DOWNSTREAM_SERVICE_ERROR";

/// Errors of a root fetch already use client response names. Internal aliases are
/// mapped back to field names and unlocated errors are pinned to the first root selection.
pub fn normalize_root_errors(
    subgraph_name: &str,
    root_selections: &[GraphQLErrorPath],
    errors: Vec<GraphQLError>,
) -> Vec<GraphQLError> {
    errors
        .into_iter()
        .map(|mut error| {
            error.path = match error.path.take() {
                Some(path) => Some(strip_internal_aliases(&path.segments)),
                None => root_selections.first().cloned(),
            };
            add_subgraph_info_to_error(error, subgraph_name)
        })
        .collect()
}

/**
 * Map `[_entities, 0, field]` to the location(s) of the entity in the client response.
 *
 * For example if the error location is `[_entities, 1, name]` and representation `1`
 * was produced by the objects at `["products", 0, "author"]` and `["products", 3, "author"]`,
 * the error is reported twice, at `["products", 0, "author", "name"]` and
 * `["products", 3, "author", "name"]`.
 *
 * `locations[i]` lists the response locations that produced representation `i`.
 */
pub fn normalize_entity_errors(
    subgraph_name: &str,
    locations: &[Vec<GraphQLErrorPath>],
    errors: Vec<GraphQLError>,
) -> Vec<GraphQLError> {
    let mut new_errors: Vec<GraphQLError> = Vec::with_capacity(errors.len());

    for error in errors {
        if let Some((entity_index, rest)) = entity_error_location(&error) {
            if let Some(entity_locations) = locations.get(entity_index) {
                let rest = strip_internal_aliases(rest);
                for location in entity_locations {
                    let mut real_path = location.clone();
                    real_path.extend_from_slice(&rest.segments);
                    let new_error = error.clone().with_path(real_path);
                    new_errors.push(add_subgraph_info_to_error(new_error, subgraph_name));
                }
                continue;
            }
        }

        // Unlocated errors land on the first entity of the batch
        let mut new_error = error;
        new_error.path = locations
            .iter()
            .find_map(|entity_locations| entity_locations.first())
            .cloned();
        new_errors.push(add_subgraph_info_to_error(new_error, subgraph_name));
    }

    new_errors
}

fn entity_error_location(error: &GraphQLError) -> Option<(usize, &[GraphQLErrorPathSegment])> {
    let segments = &error.path.as_ref()?.segments;
    match (segments.first(), segments.get(1)) {
        (
            Some(GraphQLErrorPathSegment::String(first)),
            Some(GraphQLErrorPathSegment::Index(entity_index)),
        ) if first == ENTITIES_FIELD => Some((*entity_index, &segments[2..])),
        _ => None,
    }
}

fn strip_internal_aliases(segments: &[GraphQLErrorPathSegment]) -> GraphQLErrorPath {
    GraphQLErrorPath::new(
        segments
            .iter()
            .map(|segment| match segment {
                GraphQLErrorPathSegment::String(name) => GraphQLErrorPathSegment::String(
                    name.strip_prefix(EXPORT_ALIAS_PREFIX)
                        .unwrap_or(name)
                        .to_string(),
                ),
                GraphQLErrorPathSegment::Index(index) => GraphQLErrorPathSegment::Index(*index),
            })
            .collect(),
    )
}

pub fn add_subgraph_info_to_error(mut error: GraphQLError, subgraph_name: &str) -> GraphQLError {
    error.add_extension_if_missing("serviceName", Value::from(subgraph_name));
    error.add_extension_if_missing("code", Value::from(DOWNSTREAM_SERVICE_ERROR_CODE));
    error
}
