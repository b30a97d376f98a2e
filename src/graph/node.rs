//! Node implementation for the film graph

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};

/// A node in the property graph
///
/// Every node in the film graph carries exactly one label; the merge key
/// (`id` for films, `name` for everything else) lives in `properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: Label,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<Label>) -> Self {
        Node {
            id,
            label: label.into(),
            properties: PropertyMap::new(),
        }
    }

    /// Set a property value, returning the previous value if any
    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_property_overwrites() {
        let mut node = Node::new(NodeId(1), Label::FILM);
        assert_eq!(node.label.as_str(), Label::FILM);
        assert!(node.set_property("year", 1999i64).is_none());
        let old = node.set_property("year", 2000i64);
        assert_eq!(old, Some(PropertyValue::Integer(1999)));
        assert_eq!(node.get_property("year"), Some(&PropertyValue::Integer(2000)));
    }
}
