//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider and resource
//! schemas, including attribute types, nested attributes, validators and plan
//! modifiers.

use crate::plan_modifier::PlanModifier;
use crate::validator::Validator;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// cty type constraint in its JSON form, e.g. `["list","string"]`
    pub fn to_cty_json(&self) -> Value {
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(elem) => json!(["list", elem.to_cty_json()]),
            AttributeType::Set(elem) => json!(["set", elem.to_cty_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_cty_json()]),
            AttributeType::Object(attrs) => {
                let fields: serde_json::Map<String, Value> = attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_cty_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    /// Bytes placed in the `type` field of a schema attribute
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_cty_json().to_string().into_bytes()
    }

    pub fn list_of(elem: AttributeType) -> Self {
        AttributeType::List(Box::new(elem))
    }

    pub fn map_of(elem: AttributeType) -> Self {
        AttributeType::Map(Box::new(elem))
    }
}

/// Schema is returned by providers and resources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("description", &self.description)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .field("nested_type", &self.nested_type)
            .field("deprecated", &self.deprecated)
            .finish()
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug, Clone)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

impl NestedType {
    pub fn single(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Single,
        }
    }

    pub fn list(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::List,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Object type of a single element
    pub fn object_type(&self) -> AttributeType {
        AttributeType::Object(
            self.attributes
                .iter()
                .map(|a| (a.name.clone(), a.r#type.clone()))
                .collect(),
        )
    }

    /// Type of the whole attribute value
    pub fn value_type(&self) -> AttributeType {
        match self.nesting {
            ObjectNestingMode::List => AttributeType::List(Box::new(self.object_type())),
            ObjectNestingMode::Set => AttributeType::Set(Box::new(self.object_type())),
            ObjectNestingMode::Map => AttributeType::Map(Box::new(self.object_type())),
            ObjectNestingMode::Single | ObjectNestingMode::Invalid => self.object_type(),
        }
    }
}

/// ObjectNestingMode for nested attribute objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Invalid,
    Single,
    List,
    Set,
    Map,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                nested_type: None,
                deprecated: false,
            },
        }
    }

    /// Attribute whose value is one object or a list of objects
    pub fn nested(name: &str, nested: NestedType) -> Self {
        let type_ = nested.value_type();
        Self::new(name, type_).nested_type(nested)
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn plan_modifier<M: PlanModifier + 'static>(mut self, modifier: M) -> Self {
        self.attribute.plan_modifiers.push(Arc::new(modifier));
        self
    }

    pub fn nested_type(mut self, nested: NestedType) -> Self {
        self.attribute.nested_type = Some(nested);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    description_kind: StringKind::Plain,
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::UseStateForUnknown;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the group")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the group");
    }

    #[test]
    fn schema_builder_keeps_plan_modifiers_through_clone() {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .build()
            .clone();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 2);
        assert_eq!(schema.block.attribute("id").unwrap().plan_modifiers.len(), 1);
        assert!(schema.block.attribute("missing").is_none());
    }

    #[test]
    fn nested_list_attribute_type() {
        let attr = AttributeBuilder::nested(
            "owners",
            NestedType::list(vec![
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
                AttributeBuilder::new("type", AttributeType::String)
                    .required()
                    .build(),
            ]),
        )
        .optional()
        .build();

        match &attr.r#type {
            AttributeType::List(elem) => match elem.as_ref() {
                AttributeType::Object(fields) => {
                    assert_eq!(fields.len(), 2);
                    assert!(matches!(fields.get("name"), Some(AttributeType::String)));
                }
                other => panic!("Expected object element, got {:?}", other),
            },
            other => panic!("Expected list type, got {:?}", other),
        }
    }

    #[test]
    fn cty_type_json() {
        assert_eq!(AttributeType::String.to_bytes(), b"\"string\"".to_vec());
        assert_eq!(
            AttributeType::map_of(AttributeType::String).to_cty_json(),
            json!(["map", "string"])
        );

        let object = AttributeType::Object(HashMap::from([(
            "port".to_string(),
            AttributeType::Number,
        )]));
        assert_eq!(
            AttributeType::list_of(object).to_cty_json(),
            json!(["list", ["object", {"port": "number"}]])
        );
    }
}
