use std::{
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Output or input type of a field/variable, as written in SDL (`[Review!]!`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), TypeRef::List(_))
    }

    /// Strips the outer non-null wrapper, if any.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    /// The item type of a (possibly non-null) list type.
    pub fn list_item(&self) -> Option<&TypeRef> {
        match self.nullable() {
            TypeRef::List(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid type reference: '{0}'")]
pub struct TypeRefParseError(String);

impl FromStr for TypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some(inner) = trimmed.strip_suffix('!') {
            let inner: TypeRef = inner.parse()?;
            if inner.is_non_null() {
                return Err(TypeRefParseError(s.to_string()));
            }
            return Ok(TypeRef::non_null(inner));
        }

        if let Some(inner) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return Ok(TypeRef::list(inner.parse()?));
        }

        if trimmed.is_empty()
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(TypeRefParseError(s.to_string()));
        }

        Ok(TypeRef::named(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::TypeRef;

    #[test]
    fn parses_and_prints_wrapped_types() {
        let type_ref: TypeRef = "[Review!]!".parse().expect("valid type");

        assert!(type_ref.is_non_null());
        assert!(type_ref.is_list());
        assert_eq!(type_ref.named_type(), "Review");
        assert_eq!(
            type_ref.list_item(),
            Some(&TypeRef::non_null(TypeRef::named("Review")))
        );
        assert_eq!(type_ref.to_string(), "[Review!]!");
    }

    #[test]
    fn rejects_malformed_types() {
        assert!("[Review".parse::<TypeRef>().is_err());
        assert!("ID!!".parse::<TypeRef>().is_err());
        assert!("".parse::<TypeRef>().is_err());
    }
}
