use conductor_query_planner::ast::selection_path::SelectionPath;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<GraphQLErrorPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError::from_message(message)
    }
}

impl GraphQLError {
    pub fn from_message(message: impl Into<String>) -> Self {
        GraphQLError {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    pub fn with_path(mut self, path: GraphQLErrorPath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_extension(mut self, key: &str, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    /// Sets the extension unless the error already carries one under that key.
    pub fn add_extension_if_missing(&mut self, key: &str, value: Value) {
        let extensions = self.extensions.get_or_insert_with(Map::new);
        if !extensions.contains_key(key) {
            extensions.insert(key.to_string(), value);
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.extension_str("code")
    }

    pub fn service_name(&self) -> Option<&str> {
        self.extension_str("serviceName")
    }

    fn extension_str(&self, key: &str) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get(key))
            .and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum GraphQLErrorPathSegment {
    String(String),
    Index(usize),
}

/// Concrete location in a response, list indices included.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GraphQLErrorPath {
    pub segments: Vec<GraphQLErrorPathSegment>,
}

impl GraphQLErrorPath {
    pub fn new(segments: Vec<GraphQLErrorPathSegment>) -> Self {
        Self { segments }
    }

    pub fn concat_str(&self, field_name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(GraphQLErrorPathSegment::String(field_name.into()));
        Self { segments }
    }

    pub fn concat_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(GraphQLErrorPathSegment::Index(index));
        Self { segments }
    }

    pub fn extend_from_slice(&mut self, segments: &[GraphQLErrorPathSegment]) {
        self.segments.extend_from_slice(segments);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl From<&SelectionPath> for GraphQLErrorPath {
    fn from(path: &SelectionPath) -> Self {
        GraphQLErrorPath::new(
            path.segments()
                .iter()
                .map(|segment| GraphQLErrorPathSegment::String(segment.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for GraphQLErrorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                GraphQLErrorPathSegment::String(field) => write!(f, "{}", field)?,
                GraphQLErrorPathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for GraphQLErrorPathSegment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PathSegmentVisitor;

        impl<'de> de::Visitor<'de> for PathSegmentVisitor {
            type Value = GraphQLErrorPathSegment;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or an integer for a GraphQL path segment")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(E::custom(format!(
                        "path segment must be a non-negative integer, but got {}",
                        value
                    )));
                }
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }
        }

        deserializer.deserialize_any(PathSegmentVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::{GraphQLError, GraphQLErrorPath, GraphQLErrorPathSegment};

    #[test]
    fn paths_mix_field_names_and_indices() {
        let error: GraphQLError = sonic_rs::from_str(
            r#"{"message":"boom","path":["_entities",1,"name"],"extensions":{"code":"X"}}"#,
        )
        .expect("valid error");

        assert_eq!(
            error.path,
            Some(GraphQLErrorPath::new(vec![
                GraphQLErrorPathSegment::String("_entities".to_string()),
                GraphQLErrorPathSegment::Index(1),
                GraphQLErrorPathSegment::String("name".to_string()),
            ]))
        );
        assert_eq!(error.code(), Some("X"));
        assert_eq!(
            sonic_rs::to_string(&error).expect("serializable"),
            r#"{"message":"boom","path":["_entities",1,"name"],"extensions":{"code":"X"}}"#
        );
    }
}
