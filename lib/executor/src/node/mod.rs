use std::fmt::Debug;

/// Splits a global object id into the concrete type it names and the entity key.
pub trait NodeIdParser: Debug + Send + Sync {
    fn parse<'a>(&self, id: &'a str) -> Option<NodeId<'a>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId<'a> {
    pub type_name: &'a str,
    pub key: &'a str,
}

/// Ids of the form `<Type>:<key>`. The key may contain further `:`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeNamePrefixedIdParser;

impl NodeIdParser for TypeNamePrefixedIdParser {
    fn parse<'a>(&self, id: &'a str) -> Option<NodeId<'a>> {
        let (type_name, key) = id.split_once(':')?;
        if type_name.is_empty() || key.is_empty() {
            return None;
        }

        Some(NodeId { type_name, key })
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, NodeIdParser, TypeNamePrefixedIdParser};

    #[test]
    fn splits_on_the_first_colon() {
        let parser = TypeNamePrefixedIdParser;

        assert_eq!(
            parser.parse("Product:sku:42"),
            Some(NodeId {
                type_name: "Product",
                key: "sku:42"
            })
        );
        assert_eq!(parser.parse("Product"), None);
        assert_eq!(parser.parse(":42"), None);
        assert_eq!(parser.parse("Product:"), None);
    }
}
