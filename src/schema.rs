//! Schema types for describing provider, resource and data source structure.
//!
//! Schemas describe the shape of provider configuration, resources, data
//! sources and identities. A block's [`Block::implied_type`] is the object
//! type every state, config and planned value for that block must have.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SchemaError;
use crate::refinement::Refinements;
use crate::value::{child_path, Type, Value};

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider.
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
    /// The attribute is accepted in configuration but never stored in state.
    pub write_only: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional+computed attribute (can be set, but has default from provider).
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Mark the attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Mark the attribute as write-only.
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    fn check(&self) -> Result<(), &'static str> {
        match (self.required, self.optional, self.computed) {
            (false, false, false) => Err("must be required, optional or computed"),
            (true, true, _) => Err("cannot be both required and optional"),
            (true, _, true) => Err("cannot be both required and computed"),
            _ if self.write_only && self.computed => {
                Err("write-only attributes cannot be computed")
            }
            _ => Ok(()),
        }
    }
}

/// A hint telling the plan engine how to treat an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Keep the prior state value instead of planning unknown on update.
    UseStateForUnknown,
    /// Any change to the attribute replaces the resource.
    RequiresReplace,
    /// Attach these refinements whenever the attribute is planned unknown.
    Refine(Refinements),
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: Type,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Default value for the attribute (JSON-encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Plan-time behavior hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: Type, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            plan_modifiers: Vec::new(),
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(Type::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(Type::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(Type::String, AttributeFlags::computed())
    }

    /// Create a required number attribute.
    pub fn required_number() -> Self {
        Self::new(Type::Number, AttributeFlags::required())
    }

    /// Create an optional number attribute.
    pub fn optional_number() -> Self {
        Self::new(Type::Number, AttributeFlags::optional())
    }

    /// Create a computed number attribute.
    pub fn computed_number() -> Self {
        Self::new(Type::Number, AttributeFlags::computed())
    }

    /// Create a required bool attribute.
    pub fn required_bool() -> Self {
        Self::new(Type::Bool, AttributeFlags::required())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(Type::Bool, AttributeFlags::optional())
    }

    /// Create a computed bool attribute.
    pub fn computed_bool() -> Self {
        Self::new(Type::Bool, AttributeFlags::computed())
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Mark this attribute as write-only.
    pub fn write_only(mut self) -> Self {
        self.flags.write_only = true;
        self
    }

    /// Add a plan modifier.
    pub fn with_plan_modifier(mut self, modifier: PlanModifier) -> Self {
        self.plan_modifiers.push(modifier);
        self
    }

    /// Whether a change to this attribute replaces the resource.
    pub fn requires_replace(&self) -> bool {
        self.force_new
            || self
                .plan_modifiers
                .iter()
                .any(|m| matches!(m, PlanModifier::RequiresReplace))
    }

    /// Whether the prior value is kept instead of planning unknown.
    pub fn uses_state_for_unknown(&self) -> bool {
        self.plan_modifiers
            .iter()
            .any(|m| matches!(m, PlanModifier::UseStateForUnknown))
    }

    /// The combined refinements to attach when this attribute is planned unknown.
    pub fn unknown_refinements(&self) -> Refinements {
        self.plan_modifiers
            .iter()
            .fold(Refinements::new(), |acc, m| match m {
                PlanModifier::Refine(r) => acc.intersect(r),
                _ => acc,
            })
    }

    /// The default decoded under the attribute's type.
    pub fn default_value(&self) -> Option<Value> {
        self.default
            .as_ref()
            .and_then(|json| Value::from_json(&self.attr_type, json).ok())
    }

    /// Computed and not settable from configuration.
    pub fn is_computed_only(&self) -> bool {
        self.flags.computed && !self.flags.optional && !self.flags.required
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// A single nested block (at most one).
    #[default]
    Single,
    /// A list of nested blocks (zero or more, ordered).
    List,
    /// A set of nested blocks (zero or more, unordered, unique).
    Set,
    /// A map of nested blocks keyed by string.
    Map,
}

/// A block: named attributes plus named nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The attributes within this block, ordered by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The object type implied by this block.
    pub fn implied_type(&self) -> Type {
        let mut attrs: BTreeMap<String, Type> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
            .collect();
        for (name, nested) in &self.blocks {
            attrs.insert(name.clone(), nested.implied_type());
        }
        Type::Object(attrs)
    }

    /// Check the block for self-consistency.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.validate_at("")
    }

    fn validate_at(&self, path: &str) -> Result<(), SchemaError> {
        for name in self.blocks.keys() {
            if self.attributes.contains_key(name) {
                return Err(SchemaError::DuplicateName(child_path(path, name)));
            }
        }
        for (name, attr) in &self.attributes {
            let attr_path = child_path(path, name);
            attr.flags.check().map_err(|reason| SchemaError::InvalidFlags {
                name: attr_path.clone(),
                reason: reason.to_string(),
            })?;
            if let Some(default) = &attr.default {
                if !attr.flags.computed {
                    return Err(SchemaError::InvalidFlags {
                        name: attr_path,
                        reason: "attributes with a default must be computed".to_string(),
                    });
                }
                Value::from_json(&attr.attr_type, default).map_err(|err| {
                    SchemaError::InvalidFlags {
                        name: attr_path.clone(),
                        reason: format!("default does not match type: {}", err),
                    }
                })?;
            }
        }
        for (name, nested) in &self.blocks {
            nested.block.validate_at(&child_path(path, name))?;
        }
        Ok(())
    }

    /// Names of the write-only attributes directly in this block.
    pub fn write_only_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.flags.write_only)
            .map(|(name, _)| name.as_str())
    }

    /// Whether this block or any nested block has a write-only attribute.
    pub fn has_write_only(&self) -> bool {
        self.write_only_attributes().next().is_some()
            || self.blocks.values().any(|nested| nested.block.has_write_only())
    }
}

/// A nested block with its nesting mode and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested (single, list, set, map).
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Minimum number of blocks required.
    #[serde(default)]
    pub min_items: u32,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    /// Create a single nested block (0 or 1 allowed).
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            min_items: 0,
            max_items: 1,
        }
    }

    /// Create a list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Create a set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Set,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Create a map of nested blocks.
    pub fn map(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Map,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// The type this nested block contributes to its parent object.
    pub fn implied_type(&self) -> Type {
        let object = self.block.implied_type();
        match self.nesting_mode {
            BlockNestingMode::Single => object,
            BlockNestingMode::List => Type::list(object),
            BlockNestingMode::Set => Type::set(object),
            BlockNestingMode::Map => Type::map(object),
        }
    }
}

/// Schema for a resource, data source, action or the provider itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The version of this schema (for state upgrades).
    #[serde(default)]
    pub version: u64,
    /// The root block containing all attributes and nested blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create a new schema with the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Set the description of the root block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// The object type of values under this schema.
    pub fn implied_type(&self) -> Type {
        self.block.implied_type()
    }

    /// Check the schema for self-consistency.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.block.validate()
    }

    /// Look up a top-level attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// One attribute of a resource identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityAttribute {
    /// The attribute's type.
    #[serde(rename = "type")]
    pub attr_type: Type,
    /// Must be supplied when importing by identity.
    #[serde(default)]
    pub required_for_import: bool,
    /// May be supplied when importing by identity.
    #[serde(default)]
    pub optional_for_import: bool,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IdentityAttribute {
    /// An attribute that must be supplied on import.
    pub fn required(attr_type: Type) -> Self {
        Self {
            attr_type,
            required_for_import: true,
            optional_for_import: false,
            description: None,
        }
    }

    /// An attribute that may be supplied on import.
    pub fn optional(attr_type: Type) -> Self {
        Self {
            attr_type,
            required_for_import: false,
            optional_for_import: true,
            description: None,
        }
    }
}

/// A stable, versioned description of how a resource instance is identified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IdentitySchema {
    /// Identity schema version.
    #[serde(default)]
    pub version: u64,
    /// Identity attributes by name.
    pub attributes: BTreeMap<String, IdentityAttribute>,
}

impl IdentitySchema {
    /// Create an empty identity schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an identity attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: IdentityAttribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// The object type of identities under this schema.
    pub fn implied_type(&self) -> Type {
        Type::Object(
            self.attributes
                .iter()
                .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
                .collect(),
        )
    }

    /// Check that every attribute is either required or optional for import.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (name, attr) in &self.attributes {
            if attr.required_for_import == attr.optional_for_import {
                return Err(SchemaError::InvalidFlags {
                    name: name.clone(),
                    reason: "identity attributes must be exactly one of \
                             required or optional for import"
                        .to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error diagnostic.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_flags() {
        let required = AttributeFlags::required();
        assert!(required.required);
        assert!(!required.optional);
        assert!(!required.computed);

        let optional_computed = AttributeFlags::optional_computed();
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);

        let write_only = AttributeFlags::optional().write_only();
        assert!(write_only.write_only);
        assert!(write_only.check().is_ok());
    }

    #[test]
    fn test_flag_rules() {
        assert!(AttributeFlags::default().check().is_err());
        let both = AttributeFlags {
            required: true,
            optional: true,
            ..Default::default()
        };
        assert!(both.check().is_err());
        assert!(AttributeFlags::computed().write_only().check().is_err());
        assert!(AttributeFlags::optional_computed().write_only().check().is_err());
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("A test attribute")
            .with_force_new();

        assert_eq!(attr.attr_type, Type::String);
        assert!(attr.flags.required);
        assert_eq!(attr.description, Some("A test attribute".to_string()));
        assert!(attr.requires_replace());
    }

    #[test]
    fn test_plan_modifier_helpers() {
        let attr = Attribute::computed_string()
            .with_plan_modifier(PlanModifier::UseStateForUnknown)
            .with_plan_modifier(PlanModifier::Refine(Refinements::new().not_null()))
            .with_plan_modifier(PlanModifier::Refine(
                Refinements::new().with_string_prefix("x-"),
            ));
        assert!(attr.uses_state_for_unknown());
        let r = attr.unknown_refinements();
        assert!(r.definitely_not_null);
        assert_eq!(r.string_prefix.as_deref(), Some("x-"));
    }

    #[test]
    fn test_implied_type() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("age", Attribute::optional_number())
            .with_block(
                "rule",
                NestedBlock::list(
                    Block::new().with_attribute("port", Attribute::required_number()),
                ),
            )
            .with_block(
                "settings",
                NestedBlock::single(Block::new().with_attribute("on", Attribute::optional_bool())),
            );

        let rule = Type::object([("port", Type::Number)]);
        assert_eq!(
            schema.implied_type(),
            Type::object([
                ("name", Type::String),
                ("age", Type::Number),
                ("rule", Type::list(rule)),
                ("settings", Type::object([("on", Type::Bool)])),
            ])
        );
    }

    #[test]
    fn test_validate_duplicate_names() {
        let schema = Schema::v0()
            .with_attribute("rule", Attribute::optional_string())
            .with_block("rule", NestedBlock::list(Block::new()));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::DuplicateName("rule".to_string()))
        );
    }

    #[test]
    fn test_validate_write_only_computed() {
        let schema = Schema::v0().with_attribute(
            "password",
            Attribute::new(Type::String, AttributeFlags::computed()).write_only(),
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidFlags { ref name, .. }) if name == "password"
        ));
    }

    #[test]
    fn test_validate_nested_path() {
        let schema = Schema::v0().with_block(
            "outer",
            NestedBlock::single(Block::new().with_attribute(
                "bad",
                Attribute::new(Type::String, AttributeFlags::default()),
            )),
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidFlags { ref name, .. }) if name == "outer.bad"
        ));
    }

    #[test]
    fn test_validate_default_rules() {
        let bad = Schema::v0().with_attribute(
            "region",
            Attribute::optional_string().with_default(serde_json::json!("UK")),
        );
        assert!(bad.validate().is_err());

        let good = Schema::v0().with_attribute(
            "region",
            Attribute::new(Type::String, AttributeFlags::optional_computed())
                .with_default(serde_json::json!("UK")),
        );
        assert!(good.validate().is_ok());
        assert_eq!(
            good.attribute("region").unwrap().default_value(),
            Some(Value::string("UK"))
        );
    }

    #[test]
    fn test_write_only_attributes() {
        let schema = Schema::v0()
            .with_attribute("password", Attribute::optional_string().write_only())
            .with_attribute("name", Attribute::required_string());
        let names: Vec<_> = schema.block.write_only_attributes().collect();
        assert_eq!(names, vec!["password"]);
        assert!(schema.block.has_write_only());
    }

    #[test]
    fn test_identity_schema() {
        let identity = IdentitySchema::new(1)
            .with_attribute("local_part", IdentityAttribute::required(Type::String))
            .with_attribute("domain", IdentityAttribute::required(Type::String));
        assert!(identity.validate().is_ok());
        assert_eq!(
            identity.implied_type(),
            Type::object([("local_part", Type::String), ("domain", Type::String)])
        );
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("The value must be positive")
            .with_attribute("count");

        assert_eq!(err.severity, DiagnosticSeverity::Error);
        assert_eq!(err.summary, "Invalid configuration");
        assert_eq!(err.detail, Some("The value must be positive".to_string()));
        assert_eq!(err.attribute, Some("count".to_string()));
        assert!(has_errors(&[Diagnostic::warning("w"), err]));
        assert!(!has_errors(&[Diagnostic::warning("w")]));
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new())
            .with_min_items(1)
            .with_max_items(5);
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.min_items, 1);
        assert_eq!(list.max_items, 5);
    }
}
