use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
};

use serde::{Deserialize, Serialize};

use super::value::Value;

#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Hash)]
pub struct ArgumentsMap {
    arguments_map: BTreeMap<String, Value>,
}

impl ArgumentsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_argument(&mut self, key: String, value: Value) {
        self.arguments_map.insert(key, value);
    }

    pub fn has_argument(&self, key: &str) -> bool {
        self.arguments_map.contains_key(key)
    }

    pub fn get_argument(&self, key: &str) -> Option<&Value> {
        self.arguments_map.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.arguments_map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.arguments_map.iter()
    }

    pub fn variable_usages(&self) -> BTreeSet<String> {
        let mut usages = BTreeSet::new();
        for value in self.arguments_map.values() {
            value.collect_variable_usages(&mut usages);
        }
        usages
    }
}

impl Display for ArgumentsMap {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if self.arguments_map.is_empty() {
            return Ok(());
        }

        write!(f, "(")?;
        for (i, (name, value)) in self.arguments_map.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", name, value)?;
        }
        write!(f, ")")
    }
}
