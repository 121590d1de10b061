//! Request and response types for the server core.
//!
//! These are the typed forms of the protocol messages: values are already
//! decoded into [`Value`]s under the relevant schema, and diagnostics are
//! [`Diagnostic`]s. The protocol surfaces convert to and from the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionSchema;
use crate::function::FunctionSignature;
use crate::schema::{Diagnostic, Schema};
use crate::value::Value;

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The host may skip GetProviderSchema when it has a cached copy.
    pub get_provider_schema_optional: bool,
    /// The provider wants PlanResourceChange called for destroy plans.
    pub plan_destroy: bool,
    /// The provider implements MoveResourceState.
    pub move_resource_state: bool,
}

impl ServerCapabilities {
    /// Every capability this server implements.
    pub fn all() -> Self {
        Self {
            get_provider_schema_optional: true,
            plan_destroy: true,
            move_resource_state: true,
        }
    }
}

/// Capability flags declared by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {
    /// The host understands deferred responses.
    pub deferral_allowed: bool,
    /// The host supports write-only attributes.
    pub write_only_attributes_allowed: bool,
}

/// Why a response was deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeferredReason {
    /// No specific reason.
    #[default]
    Unknown,
    /// The resource configuration contains unknowns the provider can't plan around.
    ResourceConfigUnknown,
    /// The provider configuration is not yet known.
    ProviderConfigUnknown,
    /// A prerequisite is absent.
    AbsentPrereq,
}

/// A signal that the host should retry the operation in a later round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deferred {
    /// Why the response was deferred.
    pub reason: DeferredReason,
}

impl Deferred {
    /// A deferral caused by unknown provider configuration.
    pub fn provider_config_unknown() -> Self {
        Self {
            reason: DeferredReason::ProviderConfigUnknown,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Function names.
    pub functions: Vec<String>,
    /// Action type names.
    pub actions: Vec<String>,
    /// Resource type names that publish a list schema.
    pub list_resources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Every schema the provider publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    pub provider: Schema,
    /// Schema for provider_meta blocks in modules, if any.
    pub provider_meta: Option<Schema>,
    /// Resource schemas by type name.
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas by type name.
    pub data_sources: BTreeMap<String, Schema>,
    /// List-resource schemas by type name.
    pub list_resources: BTreeMap<String, Schema>,
    /// Function signatures by name.
    pub functions: BTreeMap<String, FunctionSignature>,
    /// Action schemas by type name.
    pub actions: BTreeMap<String, ActionSchema>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Result of ValidateProviderConfig.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateProviderConfigResponse {
    /// The configuration, unchanged.
    pub prepared_config: Value,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
}

/// ConfigureProvider input.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureProviderRequest {
    /// Host version string, informational.
    pub host_version: String,
    /// Provider configuration under the provider schema.
    pub config: Value,
    /// Capabilities declared by the host.
    pub client_capabilities: ClientCapabilities,
}

/// ValidateResourceConfig input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateResourceConfigRequest {
    /// Resource type name.
    pub type_name: String,
    /// Resource configuration.
    pub config: Value,
    /// Capabilities declared by the host.
    pub client_capabilities: Option<ClientCapabilities>,
}

/// UpgradeResourceState input.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeResourceStateRequest {
    /// Resource type name.
    pub type_name: String,
    /// Schema version the state was stored under.
    pub version: u64,
    /// The stored state as raw JSON.
    pub raw_state: serde_json::Value,
}

/// UpgradeResourceState result.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeResourceStateResponse {
    /// The state re-typed under the current schema.
    pub upgraded_state: Option<Value>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
}

/// ReadResource input.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResourceRequest {
    /// Resource type name.
    pub type_name: String,
    /// The state recorded by the host.
    pub current_state: Value,
    /// Opaque provider data stored alongside the state.
    pub private: Vec<u8>,
    /// provider_meta value, if the module set one.
    pub provider_meta: Option<Value>,
    /// Capabilities declared by the host for this call.
    pub client_capabilities: Option<ClientCapabilities>,
    /// The identity recorded by the host.
    pub current_identity: Option<Value>,
}

/// ReadResource result.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResourceResponse {
    /// The refreshed state; null when the remote object is gone.
    pub new_state: Value,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Opaque provider data.
    pub private: Vec<u8>,
    /// Set when the read was deferred.
    pub deferred: Option<Deferred>,
    /// The refreshed identity.
    pub new_identity: Option<Value>,
}

/// PlanResourceChange input.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResourceChangeRequest {
    /// Resource type name.
    pub type_name: String,
    /// Current state; null on create.
    pub prior_state: Value,
    /// The host's proposal; null on destroy.
    pub proposed_new_state: Value,
    /// Configuration; may contain unknowns.
    pub config: Value,
    /// Opaque provider data from the prior state.
    pub prior_private: Vec<u8>,
    /// provider_meta value, if the module set one.
    pub provider_meta: Option<Value>,
    /// Capabilities declared by the host for this call.
    pub client_capabilities: Option<ClientCapabilities>,
    /// Identity of the prior state.
    pub prior_identity: Option<Value>,
}

/// PlanResourceChange result.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResourceChangeResponse {
    /// The predicted new state; may contain refined unknowns.
    pub planned_state: Value,
    /// Attribute paths whose change forces replacement.
    pub requires_replace: Vec<String>,
    /// Opaque provider data to hand to apply.
    pub planned_private: Vec<u8>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Copied from the resource registration without interpretation.
    pub legacy_type_system: bool,
    /// Set when the plan was deferred.
    pub deferred: Option<Deferred>,
    /// The predicted identity.
    pub planned_identity: Option<Value>,
}

/// ApplyResourceChange input.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResourceChangeRequest {
    /// Resource type name.
    pub type_name: String,
    /// Current state; null on create.
    pub prior_state: Value,
    /// The plan being applied; null on destroy.
    pub planned_state: Value,
    /// Configuration, fully known.
    pub config: Value,
    /// Opaque provider data returned by plan.
    pub planned_private: Vec<u8>,
    /// provider_meta value, if the module set one.
    pub provider_meta: Option<Value>,
    /// Identity returned by plan.
    pub planned_identity: Option<Value>,
}

/// ApplyResourceChange result.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResourceChangeResponse {
    /// The state after apply; equal to the prior state when the handler failed.
    pub new_state: Value,
    /// Opaque provider data.
    pub private: Vec<u8>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Copied from the resource registration without interpretation.
    pub legacy_type_system: bool,
    /// The identity after apply.
    pub new_identity: Option<Value>,
}

/// ImportResourceState input.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResourceStateRequest {
    /// Resource type name.
    pub type_name: String,
    /// Import id; empty when importing by identity.
    pub id: String,
    /// Identity to import by.
    pub identity: Option<Value>,
    /// Capabilities declared by the host for this call.
    pub client_capabilities: Option<ClientCapabilities>,
}

/// One resource produced by import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedResource {
    /// The resource type.
    pub type_name: String,
    /// The imported state.
    pub state: Value,
    /// Opaque provider data.
    pub private: Vec<u8>,
    /// The imported identity.
    pub identity: Option<Value>,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(type_name: impl Into<String>, state: Value) -> Self {
        Self {
            type_name: type_name.into(),
            state,
            private: Vec::new(),
            identity: None,
        }
    }

    /// Attach an identity.
    pub fn with_identity(mut self, identity: Option<Value>) -> Self {
        self.identity = identity;
        self
    }
}

/// ImportResourceState result.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResourceStateResponse {
    /// The imported resources.
    pub imported_resources: Vec<ImportedResource>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the import was deferred.
    pub deferred: Option<Deferred>,
}

/// MoveResourceState input.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveResourceStateRequest {
    /// Provider address of the source resource.
    pub source_provider_address: String,
    /// Source resource type name.
    pub source_type_name: String,
    /// Schema version of the source state.
    pub source_schema_version: u64,
    /// Source state as raw JSON under the source schema.
    pub source_state: serde_json::Value,
    /// Target resource type name.
    pub target_type_name: String,
    /// Opaque provider data of the source.
    pub source_private: Vec<u8>,
    /// Source identity as raw JSON.
    pub source_identity: Option<serde_json::Value>,
    /// Identity schema version of the source identity.
    pub source_identity_schema_version: u64,
}

/// MoveResourceState result.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveResourceStateResponse {
    /// The state under the target schema.
    pub target_state: Option<Value>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Opaque provider data for the target.
    pub target_private: Vec<u8>,
    /// The identity under the target identity schema.
    pub target_identity: Option<Value>,
}

/// UpgradeResourceIdentity input.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeResourceIdentityRequest {
    /// Resource type name.
    pub type_name: String,
    /// Identity schema version the identity was stored under.
    pub version: u64,
    /// The stored identity as raw JSON.
    pub raw_identity: serde_json::Value,
}

/// UpgradeResourceIdentity result.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeResourceIdentityResponse {
    /// The identity re-typed under the current identity schema.
    pub upgraded_identity: Option<Value>,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
}

/// ReadDataSource input.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDataSourceRequest {
    /// Data source type name.
    pub type_name: String,
    /// Configuration.
    pub config: Value,
    /// provider_meta value, if the module set one.
    pub provider_meta: Option<Value>,
    /// Capabilities declared by the host for this call.
    pub client_capabilities: Option<ClientCapabilities>,
}

/// ReadDataSource result.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDataSourceResponse {
    /// The data source state.
    pub state: Value,
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the read was deferred.
    pub deferred: Option<Deferred>,
}

/// Result of an operation that only reports diagnostics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticsResponse {
    /// Problems found.
    pub diagnostics: Vec<Diagnostic>,
}

impl From<Vec<Diagnostic>> for DiagnosticsResponse {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Type;

    #[test]
    fn test_server_capabilities() {
        let caps = ServerCapabilities::all();
        assert!(caps.get_provider_schema_optional);
        assert!(caps.plan_destroy);
        assert!(caps.move_resource_state);
        assert!(!ServerCapabilities::default().plan_destroy);
    }

    #[test]
    fn test_deferred_reason_serde() {
        let deferred = Deferred::provider_config_unknown();
        let json = serde_json::to_value(deferred).unwrap();
        assert_eq!(json, serde_json::json!({"reason": "provider_config_unknown"}));
    }

    #[test]
    fn test_imported_resource() {
        let state = Value::object([("email", Value::string("ford@prefect.co"))]);
        let imported = ImportedResource::new("corner_user", state.clone())
            .with_identity(Some(Value::object([("email", Value::string("ford@prefect.co"))])));
        assert_eq!(imported.type_name, "corner_user");
        assert_eq!(imported.state, state);
        assert!(imported.identity.is_some());
        assert_eq!(imported.state.get_attr("email").unwrap().ty(), Type::String);
    }
}
