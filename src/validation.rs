//! Schema validation helpers.
//!
//! This module checks a configuration [`Value`] against a [`Schema`] and
//! reports problems as diagnostics. Configuration may contain unknown values
//! during validation; an unknown is never an error on its own.
//!
//! # Example
//!
//! ```
//! use corner_provider::schema::{Attribute, Schema};
//! use corner_provider::validation::validate;
//! use corner_provider::value::Value;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("age", Attribute::optional_number());
//!
//! let config = Value::object([
//!     ("name", Value::string("Ford Prefect")),
//!     ("age", Value::number(200.0)),
//! ]);
//! assert!(validate(&schema, &config).is_empty());
//!
//! let config = Value::object([
//!     ("name", Value::null(corner_provider::value::Type::String)),
//!     ("age", Value::number(200.0)),
//! ]);
//! let diagnostics = validate(&schema, &config);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
//! ```

use crate::schema::{Attribute, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use crate::value::{child_path, Value};

/// Validate a configuration value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - The value must have the schema's implied type
/// - Required attributes must be non-null (unknown is accepted)
/// - Computed-only attributes must be null (the provider sets these)
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if let Err(err) = value.check_type(&schema.implied_type(), "") {
        diagnostics
            .push(Diagnostic::error("Invalid Configuration Type").with_detail(err.to_string()));
        return diagnostics;
    }
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a configuration value, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a configuration value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Paths of write-only attributes that are set in `value`.
pub fn write_only_values(block: &Block, value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_write_only(block, value, "", &mut paths);
    paths
}

fn collect_write_only(block: &Block, value: &Value, path: &str, paths: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        return;
    };
    for name in block.write_only_attributes() {
        if obj.get(name).is_some_and(|v| !v.is_null()) {
            paths.push(child_path(path, name));
        }
    }
    for (name, nested) in &block.blocks {
        let Some(inner) = obj.get(name) else {
            continue;
        };
        let nested_path = child_path(path, name);
        match nested.nesting_mode {
            BlockNestingMode::Single => {
                collect_write_only(&nested.block, inner, &nested_path, paths)
            }
            BlockNestingMode::List | BlockNestingMode::Set => {
                for (i, item) in inner.as_elements().unwrap_or_default().iter().enumerate() {
                    let item_path = child_path(&nested_path, &i.to_string());
                    collect_write_only(&nested.block, item, &item_path, paths);
                }
            }
            BlockNestingMode::Map => {
                if let Some(items) = inner.as_map() {
                    for (key, item) in items {
                        let item_path = child_path(&nested_path, key);
                        collect_write_only(&nested.block, item, &item_path, paths);
                    }
                }
            }
        }
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        // Null blocks are checked by the parent's min_items, unknown ones can't be checked yet
        _ => return,
    };

    for (name, attr) in &block.attributes {
        let attr_path = child_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = child_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let is_null = value.map_or(true, Value::is_null);

    if attr.is_computed_only() {
        if !is_null {
            diagnostics.push(
                Diagnostic::error("Invalid Configuration for Read-Only Attribute")
                    .with_detail(format!(
                        "Cannot set value for attribute '{}' \
                         because it is computed by the provider",
                        path
                    ))
                    .with_attribute(path),
            );
        }
        return;
    }

    if is_null && attr.flags.required {
        diagnostics.push(
            Diagnostic::error(format!("Missing required attribute '{}'", path))
                .with_detail("This attribute is required and must be provided")
                .with_attribute(path),
        );
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None => return check_item_count(nested, 0, path, diagnostics),
        Some(v) if v.is_null() => return check_item_count(nested, 0, path, diagnostics),
        Some(v) if v.is_unknown() => return,
        Some(v) => v,
    };

    match nested.nesting_mode {
        BlockNestingMode::Single => {
            validate_block(&nested.block, value, path, diagnostics);
        }
        BlockNestingMode::List | BlockNestingMode::Set => {
            let items = value.as_elements().unwrap_or_default();
            check_item_count(nested, items.len(), path, diagnostics);
            for (i, item) in items.iter().enumerate() {
                let item_path = child_path(path, &i.to_string());
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        BlockNestingMode::Map => {
            if let Some(items) = value.as_map() {
                check_item_count(nested, items.len(), path, diagnostics);
                for (key, item) in items {
                    let item_path = child_path(path, key);
                    validate_block(&nested.block, item, &item_path, diagnostics);
                }
            }
        }
    }
}

fn check_item_count(
    nested: &NestedBlock,
    len: usize,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let len = len as u32;

    if len < nested.min_items {
        let summary = if nested.nesting_mode == BlockNestingMode::Single {
            format!("Missing required block '{}'", path)
        } else {
            format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            )
        };
        diagnostics.push(Diagnostic::error(summary).with_attribute(path));
    }

    // 0 means unlimited
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use crate::value::Type;

    fn user_schema() -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("age", Attribute::optional_number())
            .with_attribute("id", Attribute::computed_string())
    }

    fn user(name: Value, age: Value, id: Value) -> Value {
        Value::object([("name", name), ("age", age), ("id", id)])
    }

    #[test]
    fn test_validate_required_string() {
        let schema = user_schema();

        let diagnostics = validate(
            &schema,
            &user(Value::string("test"), Value::null(Type::Number), Value::null(Type::String)),
        );
        assert!(diagnostics.is_empty());

        let diagnostics = validate(
            &schema,
            &user(Value::null(Type::String), Value::null(Type::Number), Value::null(Type::String)),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
    }

    #[test]
    fn test_unknown_required_is_accepted() {
        let diagnostics = validate(
            &user_schema(),
            &user(
                Value::unknown(Type::String),
                Value::null(Type::Number),
                Value::null(Type::String),
            ),
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_computed_only_set_in_config() {
        let diagnostics = validate(
            &user_schema(),
            &user(Value::string("a"), Value::null(Type::Number), Value::string("id-1")),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Configuration for Read-Only Attribute");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("id"));
    }

    #[test]
    fn test_type_mismatch() {
        let config = Value::object([("name", Value::number(1.0))]);
        let diagnostics = validate(&user_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Configuration Type");
    }

    #[test]
    fn test_nested_list_block_min_max() {
        let rule = Block::new().with_attribute("port", Attribute::required_number());
        let schema = Schema::v0().with_block(
            "rule",
            NestedBlock::list(rule.clone()).with_min_items(1).with_max_items(2),
        );
        let rule_ty = rule.implied_type();

        let empty = Value::object([("rule", Value::list(rule_ty.clone(), vec![]).unwrap())]);
        let diagnostics = validate(&schema, &empty);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let port = |p: f64| Value::object([("port", Value::number(p))]);
        let three = Value::object([(
            "rule",
            Value::list(rule_ty.clone(), vec![port(1.0), port(2.0), port(3.0)]).unwrap(),
        )]);
        let diagnostics = validate(&schema, &three);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let missing_port = Value::object([(
            "rule",
            Value::list(
                rule_ty,
                vec![Value::object([("port", Value::null(Type::Number))])],
            )
            .unwrap(),
        )]);
        let diagnostics = validate(&schema, &missing_port);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("rule.0.port"));
    }

    #[test]
    fn test_single_block_required() {
        let settings = Block::new().with_attribute("enabled", Attribute::optional_bool());
        let schema = Schema::v0()
            .with_block("settings", NestedBlock::single(settings.clone()).with_min_items(1));
        let config = Value::object([("settings", Value::null(settings.implied_type()))]);
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing required block 'settings'");
    }

    #[test]
    fn test_write_only_values() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "password",
                Attribute::new(Type::String, AttributeFlags::optional()).write_only(),
            );
        let set =
            Value::object([("name", Value::string("a")), ("password", Value::string("secret"))]);
        assert_eq!(write_only_values(&schema.block, &set), vec!["password".to_string()]);

        let unset =
            Value::object([("name", Value::string("a")), ("password", Value::null(Type::String))]);
        assert!(write_only_values(&schema.block, &unset).is_empty());
    }

    #[test]
    fn test_validate_result_and_is_valid() {
        let schema = user_schema();
        let good = user(Value::string("a"), Value::number(1.0), Value::null(Type::String));
        assert!(is_valid(&schema, &good));
        assert!(validate_result(&schema, &good).is_ok());
        let bad = user(Value::null(Type::String), Value::number(1.0), Value::null(Type::String));
        assert!(validate_result(&schema, &bad).is_err());
    }
}
