use conductor_query_planner::ast::selection_path::SelectionPath;
use serde_json::{Map, Value};

use crate::response::graphql_error::{GraphQLErrorPath, GraphQLErrorPathSegment};

/// Collects the objects found at `path`, flattening lists at every level,
/// together with their concrete location in the response.
pub fn collect_objects_at<'a>(
    data: &'a Value,
    path: &SelectionPath,
) -> Vec<(GraphQLErrorPath, &'a Map<String, Value>)> {
    let mut objects = Vec::new();
    traverse_and_collect(
        data,
        path.segments(),
        GraphQLErrorPath::default(),
        &mut objects,
    );
    objects
}

fn traverse_and_collect<'a>(
    current_data: &'a Value,
    remaining_path: &[String],
    current_path: GraphQLErrorPath,
    objects: &mut Vec<(GraphQLErrorPath, &'a Map<String, Value>)>,
) {
    match current_data {
        Value::Array(arr) => {
            for (index, item) in arr.iter().enumerate() {
                traverse_and_collect(
                    item,
                    remaining_path,
                    current_path.concat_index(index),
                    objects,
                );
            }
        }
        Value::Object(map) => match remaining_path.split_first() {
            None => objects.push((current_path, map)),
            Some((field_name, rest_of_path)) => {
                if let Some(next_data) = map.get(field_name) {
                    traverse_and_collect(
                        next_data,
                        rest_of_path,
                        current_path.concat_str(field_name.as_str()),
                        objects,
                    );
                }
            }
        },
        // null or a scalar: nothing to collect below it
        _ => {}
    }
}

pub fn value_at<'a>(data: &'a Value, path: &GraphQLErrorPath) -> Option<&'a Value> {
    path.segments
        .iter()
        .try_fold(data, |current, segment| match (segment, current) {
            (GraphQLErrorPathSegment::String(field_name), Value::Object(map)) => {
                map.get(field_name)
            }
            (GraphQLErrorPathSegment::Index(index), Value::Array(arr)) => arr.get(*index),
            _ => None,
        })
}

pub fn value_at_mut<'a>(data: &'a mut Value, path: &GraphQLErrorPath) -> Option<&'a mut Value> {
    let mut current = data;
    for segment in &path.segments {
        current = match (segment, current) {
            (GraphQLErrorPathSegment::String(field_name), Value::Object(map)) => {
                map.get_mut(field_name)?
            }
            (GraphQLErrorPathSegment::Index(index), Value::Array(arr)) => arr.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `value` at `path`. The parent must exist; a missing last field is created.
/// Returns whether the value was written.
pub fn set_value_at(data: &mut Value, path: &GraphQLErrorPath, value: Value) -> bool {
    let Some((last, parent_segments)) = path.segments.split_last() else {
        *data = value;
        return true;
    };

    let parent_path = GraphQLErrorPath::new(parent_segments.to_vec());
    match (value_at_mut(data, &parent_path), last) {
        (Some(Value::Object(map)), GraphQLErrorPathSegment::String(field_name)) => {
            map.insert(field_name.clone(), value);
            true
        }
        (Some(Value::Array(arr)), GraphQLErrorPathSegment::Index(index)) => {
            match arr.get_mut(*index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use conductor_query_planner::ast::selection_path::SelectionPath;
    use serde_json::{json, Value};

    use super::{collect_objects_at, set_value_at, value_at, value_at_mut};

    #[test]
    fn collects_objects_through_nested_lists() {
        let data = json!({
            "products": [
                {"reviews": [{"author": {"id": "u1"}}, {"author": null}]},
                {"reviews": null},
                {"reviews": [{"author": {"id": "u2"}}]}
            ]
        });

        let objects = collect_objects_at(
            &data,
            &SelectionPath::from_segments(["products", "reviews", "author"]),
        );
        let found: Vec<(String, Option<&Value>)> = objects
            .iter()
            .map(|(path, object)| (path.to_string(), object.get("id")))
            .collect();

        assert_eq!(
            found,
            vec![
                ("products.0.reviews.0.author".to_string(), Some(&json!("u1"))),
                ("products.2.reviews.0.author".to_string(), Some(&json!("u2"))),
            ]
        );
    }

    #[test]
    fn writes_through_concrete_paths() {
        let mut data = json!({"products": [{"name": "a"}, {"name": "b"}]});
        let objects = collect_objects_at(&data, &SelectionPath::from_segments(["products"]));
        let second = objects[1].0.clone();

        assert!(set_value_at(&mut data, &second.concat_str("price"), json!(10)));
        assert!(!set_value_at(
            &mut data,
            &second.concat_str("missing").concat_str("price"),
            json!(10)
        ));
        assert_eq!(
            value_at_mut(&mut data, &second).cloned(),
            Some(json!({"name": "b", "price": 10}))
        );
        assert_eq!(value_at(&data, &second.concat_str("price")), Some(&json!(10)));
        assert_eq!(value_at(&data, &second.concat_index(0)), None);
    }
}
