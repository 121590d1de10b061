//! `corner_refinement`: computed attributes planned as refined unknowns.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::refinement::{RangeInclusivity, Refinements};
use crate::resource::Resource;
use crate::schema::{Attribute, AttributeFlags, PlanModifier, Schema};
use crate::session::SessionContext;
use crate::value::{Type, Value};

/// Prefix every generated `prefixed` value starts with.
pub const PREFIX: &str = "corner-";

/// The `corner_refinement` resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefinementResource;

fn fill(state: Value, name: &str, value: Value) -> Value {
    match state.get_attr(name) {
        Some(current) if current.is_unknown() => state.with_attr(name, value),
        _ => state,
    }
}

fn resolve(planned_state: &Value) -> Result<Value, ProviderError> {
    let name = planned_state
        .get_attr("name")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::Validation("attribute \"name\" must be a known string".to_string())
        })?
        .to_string();
    let tags = Value::list(Type::String, vec![Value::string(name.clone())])?;

    let state = fill(planned_state.clone(), "id", Value::string(format!("refinement-{}", name)));
    let state = fill(state, "str_value", Value::string("hello"));
    let state = fill(state, "prefixed", Value::string(format!("{}{}", PREFIX, name)));
    let state = fill(state, "count", Value::number(name.len().min(10) as f64));
    Ok(fill(state, "tags", tags))
}

#[async_trait]
impl Resource for RefinementResource {
    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_plan_modifier(PlanModifier::UseStateForUnknown)
                    .with_plan_modifier(PlanModifier::Refine(Refinements::new().not_null())),
            )
            .with_attribute(
                "str_value",
                Attribute::new(Type::String, AttributeFlags::optional_computed())
                    .with_plan_modifier(PlanModifier::Refine(Refinements::new().not_null())),
            )
            .with_attribute(
                "prefixed",
                Attribute::computed_string().with_plan_modifier(PlanModifier::Refine(
                    Refinements::new().not_null().with_string_prefix(PREFIX),
                )),
            )
            .with_attribute(
                "count",
                Attribute::computed_number().with_plan_modifier(PlanModifier::Refine(
                    Refinements::new().with_number_range(
                        Some(0.0),
                        Some(10.0),
                        RangeInclusivity::CLOSED,
                    ),
                )),
            )
            .with_attribute(
                "tags",
                Attribute::new(Type::list(Type::String), AttributeFlags::computed())
                    .with_plan_modifier(PlanModifier::Refine(
                        Refinements::new().not_null().with_length_range(Some(1), Some(3)),
                    )),
            )
    }

    async fn create(
        &self,
        _ctx: &SessionContext,
        planned_state: &Value,
        _config: &Value,
    ) -> Result<Value, ProviderError> {
        resolve(planned_state)
    }

    async fn read(
        &self,
        _ctx: &SessionContext,
        current_state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        Ok(Some(current_state.clone()))
    }

    async fn update(
        &self,
        _ctx: &SessionContext,
        _prior_state: &Value,
        planned_state: &Value,
        _config: &Value,
    ) -> Result<Value, ProviderError> {
        resolve(planned_state)
    }

    async fn delete(
        &self,
        _ctx: &SessionContext,
        _prior_state: &Value) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fills_only_unknowns() {
        let planned = Value::object([
            ("name", Value::string("abc")),
            ("id", Value::unknown(Type::String)),
            ("str_value", Value::string("kept")),
            ("prefixed", Value::unknown(Type::String)),
            ("count", Value::unknown(Type::Number)),
            ("tags", Value::unknown(Type::list(Type::String))),
        ]);
        let state = resolve(&planned).unwrap();
        assert!(state.is_fully_known());
        assert_eq!(state.get_attr("str_value"), Some(&Value::string("kept")));
        assert_eq!(state.get_attr("prefixed"), Some(&Value::string("corner-abc")));
        assert_eq!(state.get_attr("count"), Some(&Value::number(3.0)));
    }

    #[test]
    fn test_declared_refinements_admit_resolved_values() {
        let schema = RefinementResource.schema();
        let state = resolve(&Value::object([
            ("name", Value::string("abc")),
            ("id", Value::unknown(Type::String)),
            ("str_value", Value::unknown(Type::String)),
            ("prefixed", Value::unknown(Type::String)),
            ("count", Value::unknown(Type::Number)),
            ("tags", Value::unknown(Type::list(Type::String))),
        ]))
        .unwrap();
        for (name, attr) in &schema.block.attributes {
            let value = state.get_attr(name).unwrap();
            assert!(attr.unknown_refinements().admits(value), "{} = {}", name, value);
        }
    }
}
