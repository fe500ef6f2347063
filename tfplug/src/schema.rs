//! Schema types and builders for tfplug
//!
//! Resources and data sources describe their configuration with a [`Schema`]
//! built through [`SchemaBuilder`] and [`AttributeBuilder`]. A schema can also
//! check a configuration value against itself: required attributes must be set
//! and attribute validators must pass.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::collections::HashMap;
use std::sync::Arc;

/// Terraform attribute types
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub deprecated: bool,
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    pub deprecated: bool,
    pub validators: Vec<Arc<dyn Validator>>,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("force_new", &self.force_new)
            .field(
                "validators",
                &self
                    .validators
                    .iter()
                    .map(|v| v.description())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Check required attributes and run validators against `config`
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        validate_block(&self.block, &config.value, &AttributePath::root(), &mut diagnostics);
        diagnostics
    }
}

fn validate_block(
    block: &Block,
    value: &Dynamic,
    base: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let empty = HashMap::new();
    let fields = value.as_map().unwrap_or(&empty);

    for attr in &block.attributes {
        let path = base.clone().attribute(&attr.name);
        match fields.get(&attr.name) {
            None | Some(Dynamic::Null) => {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument \"{}\" is required", path),
                        )
                        .with_attribute(path),
                    );
                }
            }
            Some(Dynamic::Unknown) => {}
            Some(v) => {
                for validator in &attr.validators {
                    validator.validate(v, &path, diagnostics);
                }
            }
        }
    }

    for nested in &block.block_types {
        let path = base.clone().attribute(&nested.type_name);
        let items: Vec<&Dynamic> = match fields.get(&nested.type_name) {
            None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => Vec::new(),
            Some(Dynamic::List(items)) => items.iter().collect(),
            Some(single) => vec![single],
        };

        if (items.len() as i64) < nested.min_items {
            diagnostics.push(
                Diagnostic::error(
                    "Insufficient blocks",
                    format!(
                        "At least {} \"{}\" blocks are required",
                        nested.min_items, nested.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }
        if nested.max_items > 0 && (items.len() as i64) > nested.max_items {
            diagnostics.push(
                Diagnostic::error(
                    "Too many blocks",
                    format!(
                        "No more than {} \"{}\" blocks are allowed",
                        nested.max_items, nested.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }

        for (idx, item) in items.into_iter().enumerate() {
            let item_path = match nested.nesting {
                NestingMode::Single => path.clone(),
                NestingMode::List | NestingMode::Set => path.clone().index(idx as i64),
            };
            validate_block(&nested.block, item, &item_path, diagnostics);
        }
    }
}

/// Fluent builder for [`Attribute`]
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
                force_new: false,
                deprecated: false,
                validators: Vec::new(),
            },
        }
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

    /// Changing this attribute replaces the resource
    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Fluent builder for [`Schema`]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
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

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for nested blocks, reusing [`SchemaBuilder`] for the inner block
pub struct NestedBlockBuilder {
    type_name: String,
    nesting: NestingMode,
    min_items: i64,
    max_items: i64,
    inner: SchemaBuilder,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            type_name: type_name.to_string(),
            nesting,
            min_items: 0,
            max_items: if nesting == NestingMode::Single { 1 } else { 0 },
            inner: SchemaBuilder::new(),
        }
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.max_items = max;
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.inner = self.inner.description(desc);
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.inner = self.inner.attribute(attr);
        self
    }

    pub fn build(self) -> NestedBlock {
        NestedBlock {
            type_name: self.type_name,
            block: self.inner.build().block,
            nesting: self.nesting,
            min_items: self.min_items,
            max_items: self.max_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{OneOfValidator, StringLengthValidator};

    fn listener_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Test schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .required()
                    .validator(OneOfValidator::new(&["http", "https", "tcp"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .validator(StringLengthValidator {
                        min: Some(1),
                        max: Some(63),
                    })
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("rules", NestingMode::List)
                    .attribute(
                        AttributeBuilder::new("value", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    #[test]
    fn builder_sets_flags() {
        let attr = AttributeBuilder::new("lb", AttributeType::String)
            .description("Load balancer ID")
            .required()
            .force_new()
            .build();

        assert_eq!(attr.name, "lb");
        assert!(attr.required);
        assert!(!attr.optional);
        assert!(attr.force_new);
        assert_eq!(attr.description, "Load balancer ID");
    }

    #[test]
    fn schema_collects_attributes_and_blocks() {
        let schema = listener_schema();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 3);
        assert_eq!(schema.block.block_types.len(), 1);
        assert!(schema.attribute("protocol").unwrap().required);
    }

    #[test]
    fn validate_reports_missing_required() {
        let schema = listener_schema();
        let diags = schema.validate(&DynamicValue::object());

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("protocol")));
    }

    #[test]
    fn validate_runs_attribute_validators() {
        let schema = listener_schema();
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("protocol"), "udp".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("name"), String::new())
            .unwrap();

        let diags = schema.validate(&config);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn validate_descends_into_list_blocks() {
        let schema = listener_schema();
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("protocol"), "http".to_string())
            .unwrap();
        config
            .set_value(
                &AttributePath::new("rules"),
                Dynamic::List(vec![Dynamic::Map(HashMap::new())]),
            )
            .unwrap();

        let diags = schema.validate(&config);
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].attribute,
            Some(AttributePath::new("rules").index(0).attribute("value"))
        );
    }

    #[test]
    fn unknown_values_skip_validation() {
        let schema = listener_schema();
        let mut config = DynamicValue::object();
        config
            .set_value(&AttributePath::new("protocol"), Dynamic::Unknown)
            .unwrap();

        assert!(schema.validate(&config).is_empty());
    }
}
