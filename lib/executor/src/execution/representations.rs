use std::collections::hash_map::Entry;

use ahash::AHashMap;
use conductor_query_planner::{
    ast::selection_path::SelectionPath,
    planner::{plan::RepresentationShape, step::export_alias},
};
use serde_json::{Map, Value};
use tracing::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::{response::graphql_error::GraphQLErrorPath, utils::traverse::collect_objects_at};

const TYPENAME_FIELD: &str = "__typename";

/// The deduplicated representations sent to one entity lookup.
///
/// `locations[i]` lists every response location that produced `representations[i]`,
/// so the `i`-th returned entity is merged into all of them.
#[derive(Debug, Default, Clone)]
pub struct EntityBatch {
    pub representations: Vec<Value>,
    pub locations: Vec<Vec<GraphQLErrorPath>>,
    /// Objects of the entity type that lack a key field and cannot be looked up.
    pub keyless: Vec<GraphQLErrorPath>,
}

impl EntityBatch {
    /// Builds the batch from the objects found at `parent` in the response so far.
    /// Objects of another concrete type are left out; objects missing a key field end
    /// up in `keyless`.
    pub fn collect(data: &Value, parent: &SelectionPath, shape: &RepresentationShape) -> Self {
        let mut batch = EntityBatch::default();
        let mut index_by_hash: AHashMap<u64, usize> = AHashMap::new();

        for (location, object) in matching_objects(data, parent, &shape.type_name) {
            let Some(representation) = build_representation(object, shape) else {
                trace!(%location, type_name = %shape.type_name, "key fields missing, skipping entity");
                batch.keyless.push(location);
                continue;
            };

            let hash = xxh3_64(representation.to_string().as_bytes());
            match index_by_hash.entry(hash) {
                Entry::Occupied(entry) => batch.locations[*entry.get()].push(location),
                Entry::Vacant(entry) => {
                    entry.insert(batch.representations.len());
                    batch.representations.push(representation);
                    batch.locations.push(vec![location]);
                }
            }
        }

        batch
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    pub fn all_locations(&self) -> impl Iterator<Item = &GraphQLErrorPath> {
        self.locations.iter().flatten()
    }
}

/// Objects at `parent` that are (or may be) of `type_name`. An object without
/// `__typename` is assumed to match.
pub fn matching_objects<'a>(
    data: &'a Value,
    parent: &SelectionPath,
    type_name: &str,
) -> Vec<(GraphQLErrorPath, &'a Map<String, Value>)> {
    collect_objects_at(data, parent)
        .into_iter()
        .filter(|(_, object)| {
            object
                .get(TYPENAME_FIELD)
                .and_then(Value::as_str)
                .map_or(true, |concrete| concrete == type_name)
        })
        .collect()
}

fn build_representation(object: &Map<String, Value>, shape: &RepresentationShape) -> Option<Value> {
    let mut representation = Map::with_capacity(shape.fields.len() + 1);
    representation.insert(
        TYPENAME_FIELD.to_string(),
        Value::from(shape.type_name.as_str()),
    );

    for field in &shape.fields {
        let value = object.get(&export_alias(field))?;
        representation.insert(field.clone(), value.clone());
    }

    Some(Value::Object(representation))
}
