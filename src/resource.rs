//! Managed resource handlers and their registrations.
//!
//! A [`Resource`] implements the CRUD side of a resource type. Everything the
//! protocol requires around those calls (null/unknown handling, write-only
//! nulling, upgrades, moves, deferral) is done by the lifecycle engine in
//! [`crate::lifecycle`], so handlers only ever see well-typed values.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ProviderError, SchemaError};
use crate::schema::{Diagnostic, IdentitySchema, Schema};
use crate::session::SessionContext;
use crate::value::{Type, Value};

/// A JSON attribute map, the currency of upgraders and moves.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

type UpgradeFn = dyn Fn(JsonMap) -> Result<JsonMap, ProviderError> + Send + Sync;

/// Transforms state (or identity) stored at `from_version` to `from_version + 1`.
#[derive(Clone)]
pub struct Upgrader {
    /// The version this upgrader reads.
    pub from_version: u64,
    upgrade: Arc<UpgradeFn>,
}

impl Upgrader {
    /// Create an upgrader from `from_version` to the next version.
    pub fn new<F>(from_version: u64, upgrade: F) -> Self
    where
        F: Fn(JsonMap) -> Result<JsonMap, ProviderError> + Send + Sync + 'static,
    {
        Self {
            from_version,
            upgrade: Arc::new(upgrade),
        }
    }

    /// Run the upgrader.
    pub fn apply(&self, attributes: JsonMap) -> Result<JsonMap, ProviderError> {
        (self.upgrade)(attributes)
    }
}

impl fmt::Debug for Upgrader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgrader")
            .field("from_version", &self.from_version)
            .finish_non_exhaustive()
    }
}

/// A foreign resource type whose state may be moved into this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSource {
    /// Provider address, e.g. `registry.terraform.io/hashicorp/corner`.
    pub provider_address: String,
    /// Resource type name under that provider.
    pub type_name: String,
}

impl MoveSource {
    /// Create a move source.
    pub fn new(provider_address: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            provider_address: provider_address.into(),
            type_name: type_name.into(),
        }
    }

    /// Whether this entry allows moving from `(provider_address, type_name)`.
    pub fn matches(&self, provider_address: &str, type_name: &str) -> bool {
        self.provider_address == provider_address && self.type_name == type_name
    }
}

/// Where import copies the import id (or identity) without calling the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPassthrough {
    /// State attribute that receives the import id.
    pub attribute: Option<String>,
    /// Identity attribute that receives the import id, and is read back on identity import.
    pub identity_attribute: Option<String>,
}

impl ImportPassthrough {
    /// Pass the id through to `attribute`.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            attribute: Some(name.into()),
            identity_attribute: None,
        }
    }

    /// Also pass the id through to an identity attribute.
    pub fn with_identity_attribute(mut self, name: impl Into<String>) -> Self {
        self.identity_attribute = Some(name.into());
        self
    }
}

/// What an import targets.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportTarget {
    /// Import by the host-supplied id string.
    Id(String),
    /// Import by a typed identity.
    Identity(Value),
}

/// Trait implemented by every managed resource type.
///
/// Only [`Resource::schema`] and the four CRUD methods are required.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// The resource schema. Its version is the current state version.
    fn schema(&self) -> Schema;

    /// The identity schema, if the resource supports identities.
    fn identity_schema(&self) -> Option<IdentitySchema> {
        None
    }

    /// One upgrader per prior state version.
    fn state_upgraders(&self) -> Vec<Upgrader> {
        Vec::new()
    }

    /// One upgrader per prior identity version.
    fn identity_upgraders(&self) -> Vec<Upgrader> {
        Vec::new()
    }

    /// Foreign resource types whose state may be moved into this one.
    fn move_sources(&self) -> Vec<MoveSource> {
        Vec::new()
    }

    /// Import without calling [`Resource::import`].
    fn import_passthrough(&self) -> Option<ImportPassthrough> {
        None
    }

    /// Opaque flag copied into plan and apply responses.
    fn legacy_type_system(&self) -> bool {
        false
    }

    /// Whether the engine nulls write-only attributes in returned states.
    ///
    /// Returning `false` lets a test resource leak a write-only value so the
    /// host-side check can be exercised.
    fn enforce_write_only(&self) -> bool {
        true
    }

    /// Schema for list queries, if the resource can be listed.
    fn list_schema(&self) -> Option<Schema> {
        None
    }

    /// Derive the identity of a state. Returning `None` keeps the previous identity.
    fn identity(&self, state: &Value) -> Option<Value> {
        let _ = state;
        None
    }

    /// Resource-specific configuration checks, run after schema validation.
    async fn validate_config(
        &self,
        ctx: &SessionContext,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (ctx, config);
        Ok(vec![])
    }

    /// Adjust the engine's planned state. Not called for destroy plans.
    async fn modify_plan(
        &self,
        ctx: &SessionContext,
        prior_state: &Value,
        config: &Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (ctx, prior_state, config);
        Ok(planned_state)
    }

    /// Create the remote object. `config` carries write-only values.
    async fn create(
        &self,
        ctx: &SessionContext,
        planned_state: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError>;

    /// Refresh from the remote object. `Ok(None)` means it no longer exists.
    async fn read(&self, ctx: &SessionContext, current_state: &Value)
        -> Result<Option<Value>, ProviderError>;

    /// Update the remote object in place.
    async fn update(
        &self,
        ctx: &SessionContext,
        prior_state: &Value,
        planned_state: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, ctx: &SessionContext, prior_state: &Value) -> Result<(), ProviderError>;

    /// Build the initial state for an import.
    async fn import(
        &self,
        ctx: &SessionContext,
        target: &ImportTarget,
    ) -> Result<Value, ProviderError> {
        let _ = (ctx, target);
        Err(ProviderError::Unimplemented(
            "import is not supported by this resource".to_string(),
        ))
    }

    /// Translate a moved source state into this resource's attribute map.
    ///
    /// The default keeps attributes as they are; the engine drops any the
    /// target schema does not declare.
    async fn move_state(
        &self,
        ctx: &SessionContext,
        source: &MoveSource,
        source_schema_version: u64,
        source_state: JsonMap,
    ) -> Result<JsonMap, ProviderError> {
        let _ = (ctx, source, source_schema_version);
        Ok(source_state)
    }
}

/// A resource registration, resolved once at server construction.
#[derive(Clone)]
pub struct ResourceType {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) state_type: Type,
    pub(crate) identity_schema: Option<IdentitySchema>,
    pub(crate) state_upgraders: Vec<Upgrader>,
    pub(crate) identity_upgraders: Vec<Upgrader>,
    pub(crate) move_sources: Vec<MoveSource>,
    pub(crate) import_passthrough: Option<ImportPassthrough>,
    pub(crate) list_schema: Option<Schema>,
    pub(crate) legacy_type_system: bool,
    pub(crate) enforce_write_only: bool,
    pub(crate) handler: Arc<dyn Resource>,
}

impl ResourceType {
    /// Resolve a handler's schemas and check them for consistency.
    pub fn new(name: impl Into<String>, handler: Arc<dyn Resource>) -> Result<Self, SchemaError> {
        let name = name.into();
        let schema = handler.schema();
        schema.validate()?;

        let identity_schema = handler.identity_schema();
        if let Some(identity) = &identity_schema {
            identity.validate()?;
        }

        let mut state_upgraders = handler.state_upgraders();
        state_upgraders.sort_by_key(|u| u.from_version);
        check_upgrader_chain(&name, schema.version, &state_upgraders)?;

        let mut identity_upgraders = handler.identity_upgraders();
        identity_upgraders.sort_by_key(|u| u.from_version);
        let identity_version = identity_schema.as_ref().map_or(0, |i| i.version);
        check_upgrader_chain(&name, identity_version, &identity_upgraders)?;

        if let Some(list_schema) = handler.list_schema() {
            list_schema.validate()?;
        }

        Ok(Self {
            state_type: schema.implied_type(),
            schema,
            identity_schema,
            state_upgraders,
            identity_upgraders,
            move_sources: handler.move_sources(),
            import_passthrough: handler.import_passthrough(),
            list_schema: handler.list_schema(),
            legacy_type_system: handler.legacy_type_system(),
            enforce_write_only: handler.enforce_write_only(),
            handler,
            name,
        })
    }

    /// The registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The object type of states.
    pub fn state_type(&self) -> &Type {
        &self.state_type
    }

    /// The identity schema, if any.
    pub fn identity_schema(&self) -> Option<&IdentitySchema> {
        self.identity_schema.as_ref()
    }

    /// The list schema, if any.
    pub fn list_schema(&self) -> Option<&Schema> {
        self.list_schema.as_ref()
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("name", &self.name)
            .field("version", &self.schema.version)
            .field("identity", &self.identity_schema.is_some())
            .finish_non_exhaustive()
    }
}

/// Every version below `current` needs exactly one upgrader.
fn check_upgrader_chain(
    type_name: &str,
    current: u64,
    upgraders: &[Upgrader]) -> Result<(), SchemaError> {
    for version in 0..current {
        if !upgraders.iter().any(|u| u.from_version == version) {
            return Err(SchemaError::MissingUpgrader {
                type_name: type_name.to_string(),
                version,
            });
        }
    }
    if let Some(extra) = upgraders.iter().find(|u| u.from_version >= current) {
        return Err(SchemaError::InvalidFlags {
            name: type_name.to_string(),
            reason: format!(
                "upgrader from version {} is not below the current version {}",
                extra.from_version, current
            ),
        });
    }
    if upgraders.windows(2).any(|w| w[0].from_version == w[1].from_version) {
        return Err(SchemaError::InvalidFlags {
            name: type_name.to_string(),
            reason: "more than one upgrader for the same version".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, IdentityAttribute};

    struct Versioned {
        version: u64,
        upgraders: Vec<u64>,
    }

    #[async_trait]
    impl Resource for Versioned {
        fn schema(&self) -> Schema {
            Schema::new(self.version).with_attribute("name", Attribute::required_string())
        }

        fn state_upgraders(&self) -> Vec<Upgrader> {
            self.upgraders
                .iter()
                .map(|v| Upgrader::new(*v, Ok))
                .collect()
        }

        fn identity_schema(&self) -> Option<IdentitySchema> {
            Some(
                IdentitySchema::new(0)
                    .with_attribute("name", IdentityAttribute::required(Type::String)),
            )
        }

        async fn create(
            &self,
            _: &SessionContext,
            planned: &Value,
            _: &Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned.clone())
        }

        async fn read(
            &self,
            _: &SessionContext,
            current: &Value,
        ) -> Result<Option<Value>, ProviderError> {
            Ok(Some(current.clone()))
        }

        async fn update(
            &self,
            _: &SessionContext,
            _: &Value,
            planned: &Value,
            _: &Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned.clone())
        }

        async fn delete(&self, _: &SessionContext, _: &Value) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_resolves_schema() {
        let rt = ResourceType::new(
            "versioned",
            Arc::new(Versioned {
                version: 2,
                upgraders: vec![1, 0],
            }),
        )
        .unwrap();
        assert_eq!(rt.name(), "versioned");
        assert_eq!(rt.state_type(), &Type::object([("name", Type::String)]));
        assert_eq!(
            rt.state_upgraders.iter().map(|u| u.from_version).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(rt.identity_schema().is_some());
    }

    #[test]
    fn test_missing_upgrader_rejected() {
        let err = ResourceType::new(
            "versioned",
            Arc::new(Versioned {
                version: 2,
                upgraders: vec![0],
            }),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingUpgrader {
                type_name: "versioned".to_string(),
                version: 1,
            }
        );
    }

    #[test]
    fn test_upgrader_beyond_current_rejected() {
        let err = ResourceType::new(
            "versioned",
            Arc::new(Versioned {
                version: 0,
                upgraders: vec![0],
            }),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFlags { .. }));
    }

    #[test]
    fn test_upgrader_apply() {
        let upgrader = Upgrader::new(0, |mut attrs: JsonMap| {
            attrs.insert("added".to_string(), serde_json::json!(true));
            Ok(attrs)
        });
        let out = upgrader.apply(JsonMap::new()).unwrap();
        assert_eq!(out.get("added"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_move_source_matches() {
        let source =
            MoveSource::new("registry.terraform.io/hashicorp/corner", "corner_legacy_user");
        assert!(source.matches("registry.terraform.io/hashicorp/corner", "corner_legacy_user"));
        assert!(!source.matches("registry.terraform.io/hashicorp/corner", "corner_user"));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        struct Bad;

        #[async_trait]
        impl Resource for Bad {
            fn schema(&self) -> Schema {
                Schema::v0().with_attribute(
                    "secret",
                    Attribute::new(Type::String, AttributeFlags::computed()).write_only(),
                )
            }

            async fn create(
                &self,
                _: &SessionContext,
                p: &Value,
                _: &Value,
            ) -> Result<Value, ProviderError> {
                Ok(p.clone())
            }

            async fn read(
                &self,
                _: &SessionContext,
                c: &Value,
            ) -> Result<Option<Value>, ProviderError> {
                Ok(Some(c.clone()))
            }

            async fn update(
                &self,
                _: &SessionContext,
                _: &Value,
                p: &Value,
                _: &Value,
            ) -> Result<Value, ProviderError> {
                Ok(p.clone())
            }

            async fn delete(&self, _: &SessionContext, _: &Value) -> Result<(), ProviderError> {
                Ok(())
            }
        }

        assert!(ResourceType::new("bad", Arc::new(Bad)).is_err());
    }
}
