use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult, Write},
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Value::Variable(name) => name.hash(state),
            Value::Int(i) => i.hash(state),
            // f64 is not Hash, the bit pattern is good enough for a cache key
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Null => {}
            Value::Enum(e) => e.hash(state),
            Value::List(items) => items.hash(state),
            Value::Object(fields) => fields.hash(state),
        }
    }
}

impl Value {
    pub fn variable(name: impl Into<String>) -> Self {
        Value::Variable(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn variable_usages(&self) -> BTreeSet<String> {
        let mut usages = BTreeSet::new();
        self.collect_variable_usages(&mut usages);
        usages
    }

    pub(crate) fn collect_variable_usages(&self, usages: &mut BTreeSet<String>) {
        match self {
            Value::Variable(name) => {
                usages.insert(name.clone());
            }
            Value::List(items) => {
                for item in items {
                    item.collect_variable_usages(usages);
                }
            }
            Value::Object(fields) => {
                for value in fields.values() {
                    value.collect_variable_usages(usages);
                }
            }
            _ => {}
        }
    }
}

fn write_graphql_string(f: &mut FmtFormatter<'_>, value: &str) -> FmtResult {
    f.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04X}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

impl Display for Value {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            Value::Variable(name) => write!(f, "${}", name),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write_graphql_string(f, s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Enum(e) => write!(f, "{}", e),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::Value;

    #[test]
    fn renders_graphql_literals() {
        let mut fields = BTreeMap::new();
        fields.insert("limit".to_string(), Value::Int(10));
        fields.insert("after".to_string(), Value::variable("cursor"));

        let value = Value::List(vec![
            Value::string("a \"quoted\"\nline"),
            Value::Enum("ASC".to_string()),
            Value::Object(fields),
        ]);

        assert_eq!(
            value.to_string(),
            r#"["a \"quoted\"\nline",ASC,{after:$cursor,limit:10}]"#
        );
        assert_eq!(
            value.variable_usages().into_iter().collect::<Vec<_>>(),
            vec!["cursor".to_string()]
        );
    }
}
