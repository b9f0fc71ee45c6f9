//! Schema introspection for capability input/output records.
//!
//! Every record type that crosses the orchestrator boundary implements
//! [`Describe`] and returns its own field list. [`derive_shape`] turns that
//! list into a [`ShapeDescriptor`], the structure published in the startup
//! catalog and used by the dispatcher to coerce raw input.
//!
//! A field holding a list of structured records carries a nested
//! `ShapeDescriptor` under `items`; scalar fields and scalar lists stay
//! leaves.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::String => "string",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        };
        f.write_str(name)
    }
}

/// Function returning the field list of a record type.
pub type FieldList = fn() -> Vec<FieldSpec>;

/// Element type of an array field.
#[derive(Clone, Copy)]
pub enum ItemSpec {
    /// List of plain scalars.
    Scalar(TypeTag),
    /// List of structured records.
    Records(FieldList),
}

impl fmt::Debug for ItemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSpec::Scalar(tag) => write!(f, "Scalar({})", tag),
            ItemSpec::Records(_) => f.write_str("Records(..)"),
        }
    }
}

/// Declared field of a record type.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub tag: TypeTag,
    /// `false` when the field has a default.
    pub required: bool,
    pub description: Option<&'static str>,
    pub items: Option<ItemSpec>,
}

impl FieldSpec {
    /// A required scalar field.
    pub fn new(name: &'static str, tag: TypeTag) -> Self {
        Self {
            name,
            tag,
            required: true,
            description: None,
            items: None,
        }
    }

    /// A required list of scalars.
    pub fn list(name: &'static str, item: TypeTag) -> Self {
        Self {
            items: Some(ItemSpec::Scalar(item)),
            ..Self::new(name, TypeTag::Array)
        }
    }

    /// A required list of structured records of type `T`.
    pub fn records<T: Describe>(name: &'static str) -> Self {
        Self {
            items: Some(ItemSpec::Records(T::fields)),
            ..Self::new(name, TypeTag::Array)
        }
    }

    /// Mark the field as having a default.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Explicit schema contract implemented by every capability input/output
/// record.
pub trait Describe {
    fn fields() -> Vec<FieldSpec>;
}

/// Element description of an array field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemShape {
    Scalar {
        #[serde(rename = "type")]
        type_tag: TypeTag,
    },
    Record(ShapeDescriptor),
}

/// Wire description of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldShape {
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemShape>,
}

impl FieldShape {
    /// Nested record shape, if this field is a list of records.
    pub fn nested(&self) -> Option<&ShapeDescriptor> {
        match &self.items {
            Some(ItemShape::Record(shape)) => Some(shape),
            _ => None,
        }
    }
}

/// Structural description of a record type, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeDescriptor(BTreeMap<String, FieldShape>);

impl ShapeDescriptor {
    pub fn get(&self, field: &str) -> Option<&FieldShape> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldShape)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Derive the shape of a record type.
pub fn derive_shape<T: Describe>() -> ShapeDescriptor {
    shape_from_fields(T::fields())
}

/// Build a shape from an explicit field list, recursing into record lists.
pub fn shape_from_fields(fields: Vec<FieldSpec>) -> ShapeDescriptor {
    let mut shape = BTreeMap::new();
    for field in fields {
        let items = field.items.map(|item| match item {
            ItemSpec::Scalar(type_tag) => ItemShape::Scalar { type_tag },
            ItemSpec::Records(nested) => ItemShape::Record(shape_from_fields(nested())),
        });
        shape.insert(
            field.name.to_string(),
            FieldShape {
                type_tag: field.tag,
                required: field.required,
                description: field.description.unwrap_or(field.name).to_string(),
                items,
            },
        );
    }
    ShapeDescriptor(shape)
}

/// The empty record, for capabilities that take or return nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

impl Describe for Empty {
    fn fields() -> Vec<FieldSpec> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Article;

    impl Describe for Article {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("title", TypeTag::String).describe("Headline"),
                FieldSpec::new("url", TypeTag::String),
            ]
        }
    }

    struct Digest;

    impl Describe for Digest {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("count", TypeTag::Integer),
                FieldSpec::list("tags", TypeTag::String).optional(),
                FieldSpec::records::<Article>("articles"),
            ]
        }
    }

    #[test]
    fn test_leaf_fields() {
        let shape = derive_shape::<Digest>();
        assert_eq!(shape.len(), 3);

        let count = shape.get("count").unwrap();
        assert_eq!(count.type_tag, TypeTag::Integer);
        assert!(count.required);
        assert_eq!(count.description, "count");
        assert!(count.items.is_none());

        let tags = shape.get("tags").unwrap();
        assert!(!tags.required);
        assert_eq!(
            tags.items,
            Some(ItemShape::Scalar {
                type_tag: TypeTag::String
            })
        );
        assert!(tags.nested().is_none());
    }

    #[test]
    fn test_nested_record_list_matches_nested_type() {
        let shape = derive_shape::<Digest>();
        let articles = shape.get("articles").unwrap();
        assert_eq!(articles.type_tag, TypeTag::Array);

        let nested = articles.nested().expect("record list should nest");
        assert_eq!(nested, &derive_shape::<Article>());
        assert_eq!(nested.get("title").unwrap().description, "Headline");
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(derive_shape::<Digest>()).unwrap();
        assert_eq!(json["count"]["type"], "integer");
        assert_eq!(json["count"]["required"], true);
        assert_eq!(json["tags"]["items"]["type"], "string");
        assert_eq!(json["articles"]["items"]["url"]["type"], "string");
        assert_eq!(json["articles"]["items"]["title"]["description"], "Headline");
        assert!(json["count"].get("items").is_none());
    }

    #[test]
    fn test_empty_record() {
        assert!(derive_shape::<Empty>().is_empty());
        let decoded: Empty = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(decoded, Empty {});
    }
}
