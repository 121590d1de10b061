//! `corner_user`: a store-backed resource with state and identity upgrades
//! and a move whitelist.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::ProviderError;
use crate::resource::{ImportTarget, JsonMap, MoveSource, Resource, Upgrader};
use crate::schema::{Attribute, Diagnostic, IdentityAttribute, IdentitySchema, Schema};
use crate::session::SessionContext;
use crate::store::Record;
use crate::value::{Type, Value};

/// Store kind holding users.
pub const USER_KIND: &str = "user";

/// Address under which this provider is published.
pub const PROVIDER_ADDRESS: &str = "registry.terraform.io/hashicorp/corner";

/// The retired resource type whose state may be moved into `corner_user`.
pub const LEGACY_USER_TYPE: &str = "corner_legacy_user";

/// A user, keyed by email.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserResource;

pub(crate) fn user_state(email: &str, name: &str, age: f64) -> Value {
    Value::object([
        ("email", Value::string(email)),
        ("name", Value::string(name)),
        ("age", Value::number(age)),
    ])
}

pub(crate) fn user_record(email: &str, name: &str, age: f64) -> Record {
    Record::new(email)
        .with_field("name", json!(name))
        .with_field("age", json!(age))
}

pub(crate) fn state_from_record(record: &Record) -> Value {
    let name = record.field("name").and_then(serde_json::Value::as_str).unwrap_or_default();
    let age = record.field("age").and_then(serde_json::Value::as_f64).unwrap_or_default();
    user_state(&record.key, name, age)
}

fn string_attr<'a>(state: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    state
        .get_attr(name)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::Validation(format!("attribute \"{}\" must be a known string", name))
        })
}

fn number_attr(state: &Value, name: &str) -> Result<f64, ProviderError> {
    state
        .get_attr(name)
        .and_then(Value::as_number)
        .ok_or_else(|| {
            ProviderError::Validation(format!("attribute \"{}\" must be a known number", name))
        })
}

fn split_email(email: &str) -> Option<(&str, &str)> {
    email.split_once('@').filter(|(local, domain)| !local.is_empty() && !domain.is_empty())
}

fn take_string(attrs: &mut JsonMap, name: &str) -> String {
    match attrs.remove(name) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

#[async_trait]
impl Resource for UserResource {
    fn schema(&self) -> Schema {
        Schema::new(1)
            .with_attribute(
                "email",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The user's email address, unique across users"),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute("age", Attribute::required_number())
    }

    fn identity_schema(&self) -> Option<IdentitySchema> {
        Some(
            IdentitySchema::new(1)
                .with_attribute("local_part", IdentityAttribute::required(Type::String))
                .with_attribute("domain", IdentityAttribute::required(Type::String)),
        )
    }

    fn state_upgraders(&self) -> Vec<Upgrader> {
        // v0 stored first_name and last_name separately, plus an id copied from email.
        vec![Upgrader::new(0, |mut attrs| {
            let first = take_string(&mut attrs, "first_name");
            let last = take_string(&mut attrs, "last_name");
            let name = format!("{} {}", first, last).trim().to_string();
            attrs.insert("name".to_string(), json!(name));
            attrs.remove("id");
            Ok(attrs)
        })]
    }

    fn identity_upgraders(&self) -> Vec<Upgrader> {
        // v0 identities were the bare email.
        vec![Upgrader::new(0, |mut attrs| {
            let email = take_string(&mut attrs, "email");
            let (local, domain) = split_email(&email).ok_or_else(|| {
                ProviderError::Validation(format!("\"{}\" is not an email address", email))
            })?;
            let mut upgraded = JsonMap::new();
            upgraded.insert("local_part".to_string(), json!(local));
            upgraded.insert("domain".to_string(), json!(domain));
            Ok(upgraded)
        })]
    }

    fn move_sources(&self) -> Vec<MoveSource> {
        vec![MoveSource::new(PROVIDER_ADDRESS, LEGACY_USER_TYPE)]
    }

    fn identity(&self, state: &Value) -> Option<Value> {
        let (local, domain) = split_email(state.get_attr("email")?.as_str()?)?;
        Some(Value::object([
            ("local_part", Value::string(local)),
            ("domain", Value::string(domain)),
        ]))
    }

    async fn validate_config(
        &self,
        _ctx: &SessionContext,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = Vec::new();
        if let Some(email) = config.get_attr("email").and_then(Value::as_str) {
            if split_email(email).is_none() {
                diagnostics.push(
                    Diagnostic::error("Invalid Email")
                        .with_detail(format!("\"{}\" is not an email address", email))
                        .with_attribute("email"),
                );
            }
        }
        if let Some(age) = config.get_attr("age").and_then(Value::as_number) {
            if age < 0.0 {
                diagnostics.push(Diagnostic::error("Invalid Age").with_attribute("age"));
            }
        }
        Ok(diagnostics)
    }

    async fn create(
        &self,
        ctx: &SessionContext,
        planned_state: &Value,
        _config: &Value,
    ) -> Result<Value, ProviderError> {
        let email = string_attr(planned_state, "email")?;
        let name = string_attr(planned_state, "name")?;
        let age = number_attr(planned_state, "age")?;

        let mut txn = ctx.write_txn().await?;
        txn.put(USER_KIND, user_record(email, name, age))?;
        txn.commit()?;
        debug!(email, "user created");
        Ok(user_state(email, name, age))
    }

    async fn read(
        &self,
        ctx: &SessionContext,
        current_state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let email = string_attr(current_state, "email")?;
        let txn = ctx.read_txn().await?;
        Ok(txn.get(USER_KIND, email)?.as_ref().map(state_from_record))
    }

    async fn update(
        &self,
        ctx: &SessionContext,
        _prior_state: &Value,
        planned_state: &Value,
        _config: &Value,
    ) -> Result<Value, ProviderError> {
        let email = string_attr(planned_state, "email")?;
        let name = string_attr(planned_state, "name")?;
        let age = number_attr(planned_state, "age")?;

        let mut txn = ctx.write_txn().await?;
        txn.update(USER_KIND, user_record(email, name, age))?;
        txn.commit()?;
        Ok(user_state(email, name, age))
    }

    async fn delete(&self, ctx: &SessionContext, prior_state: &Value) -> Result<(), ProviderError> {
        let email = string_attr(prior_state, "email")?;
        let mut txn = ctx.write_txn().await?;
        txn.delete(USER_KIND, email)?;
        txn.commit()?;
        Ok(())
    }

    async fn import(
        &self,
        ctx: &SessionContext,
        target: &ImportTarget,
    ) -> Result<Value, ProviderError> {
        let email = match target {
            ImportTarget::Id(id) => id.clone(),
            ImportTarget::Identity(identity) => format!(
                "{}@{}",
                string_attr(identity, "local_part")?,
                string_attr(identity, "domain")?
            ),
        };
        let txn = ctx.read_txn().await?;
        match txn.get(USER_KIND, &email)? {
            Some(record) => Ok(state_from_record(&record)),
            None => Err(ProviderError::NotFound(format!("user \"{}\"", email))),
        }
    }

    async fn move_state(
        &self,
        _ctx: &SessionContext,
        _source: &MoveSource,
        _source_schema_version: u64,
        mut source_state: JsonMap,
    ) -> Result<JsonMap, ProviderError> {
        if let Some(full_name) = source_state.remove("full_name") {
            source_state.insert("name".to_string(), full_name);
        }
        Ok(source_state)
    }
}
