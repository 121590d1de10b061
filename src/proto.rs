//! Wire messages for the v5 and v6 protocol surfaces.
//!
//! The messages are declared by hand with `prost` derives so the crate does
//! not need `protoc` at build time. Both surfaces share the same messages,
//! except for the data source validation pair whose name differs between
//! versions.
//!
//! The conversion helpers at the bottom of this module translate between the
//! wire messages and the core types.

use std::collections::HashMap;

use crate::action::{ActionEvent, ActionSchema, LinkedResource};
use crate::codec;
use crate::error::ValueError;
use crate::function::{FunctionError, FunctionSignature, Parameter};
use crate::schema::{self as core_schema, BlockNestingMode, DiagnosticSeverity, IdentitySchema};
use crate::types::{self as core_types, DeferredReason};
use crate::value::{Type, Value};

// =========================================================================
// Common
// =========================================================================

/// A value encoded as MessagePack or JSON.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DynamicValue {
    #[prost(bytes = "vec", tag = "1")]
    pub msgpack: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub json: ::prost::alloc::vec::Vec<u8>,
}

/// Stored state as written by an older provider version.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawState {
    #[prost(bytes = "vec", tag = "1")]
    pub json: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Diagnostic {
    #[prost(enumeration = "diagnostic::Severity", tag = "1")]
    pub severity: i32,
    #[prost(string, tag = "2")]
    pub summary: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub detail: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub attribute: ::prost::alloc::string::String,
}

/// Nested message and enum types in `Diagnostic`.
pub mod diagnostic {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Severity {
        Invalid = 0,
        Error = 1,
        Warning = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Schema {
    #[prost(int64, tag = "1")]
    pub version: i64,
    #[prost(message, optional, tag = "2")]
    pub block: ::core::option::Option<Block>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Block {
    #[prost(message, repeated, tag = "1")]
    pub attributes: ::prost::alloc::vec::Vec<Attribute>,
    #[prost(message, repeated, tag = "2")]
    pub block_types: ::prost::alloc::vec::Vec<NestedBlock>,
    #[prost(string, tag = "3")]
    pub description: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Attribute {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub r#type: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "3")]
    pub description: ::prost::alloc::string::String,
    #[prost(bool, tag = "4")]
    pub required: bool,
    #[prost(bool, tag = "5")]
    pub optional: bool,
    #[prost(bool, tag = "6")]
    pub computed: bool,
    #[prost(bool, tag = "7")]
    pub sensitive: bool,
    #[prost(bool, tag = "8")]
    pub write_only: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NestedBlock {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub block: ::core::option::Option<Block>,
    #[prost(enumeration = "nested_block::NestingMode", tag = "3")]
    pub nesting: i32,
    #[prost(int64, tag = "4")]
    pub min_items: i64,
    #[prost(int64, tag = "5")]
    pub max_items: i64,
}

/// Nested message and enum types in `NestedBlock`.
pub mod nested_block {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum NestingMode {
        Invalid = 0,
        Single = 1,
        List = 2,
        Set = 3,
        Map = 4,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceIdentitySchema {
    #[prost(int64, tag = "1")]
    pub version: i64,
    #[prost(message, repeated, tag = "2")]
    pub identity_attributes: ::prost::alloc::vec::Vec<IdentityAttribute>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IdentityAttribute {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub r#type: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "3")]
    pub required_for_import: bool,
    #[prost(bool, tag = "4")]
    pub optional_for_import: bool,
    #[prost(string, tag = "5")]
    pub description: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceIdentityData {
    #[prost(message, optional, tag = "1")]
    pub identity_data: ::core::option::Option<DynamicValue>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerCapabilities {
    #[prost(bool, tag = "1")]
    pub plan_destroy: bool,
    #[prost(bool, tag = "2")]
    pub get_provider_schema_optional: bool,
    #[prost(bool, tag = "3")]
    pub move_resource_state: bool,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ClientCapabilities {
    #[prost(bool, tag = "1")]
    pub deferral_allowed: bool,
    #[prost(bool, tag = "2")]
    pub write_only_attributes_allowed: bool,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Deferred {
    #[prost(enumeration = "deferred::Reason", tag = "1")]
    pub reason: i32,
}

/// Nested message and enum types in `Deferred`.
pub mod deferred {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Reason {
        Unknown = 0,
        ResourceConfigUnknown = 1,
        ProviderConfigUnknown = 2,
        AbsentPrereq = 3,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Function {
    #[prost(message, repeated, tag = "1")]
    pub parameters: ::prost::alloc::vec::Vec<FunctionParameter>,
    #[prost(message, optional, tag = "2")]
    pub variadic_parameter: ::core::option::Option<FunctionParameter>,
    #[prost(bytes = "vec", tag = "3")]
    pub return_type: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "4")]
    pub summary: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub description: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionParameter {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub r#type: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "3")]
    pub allow_null_value: bool,
    #[prost(string, tag = "4")]
    pub description: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionErrorMessage {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
    #[prost(int64, optional, tag = "2")]
    pub function_argument: ::core::option::Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionSchemaMessage {
    #[prost(message, optional, tag = "1")]
    pub schema: ::core::option::Option<Schema>,
    #[prost(message, repeated, tag = "2")]
    pub linked_resources: ::prost::alloc::vec::Vec<LinkedResourceSchemaMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LinkedResourceSchemaMessage {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub description: ::prost::alloc::string::String,
}

// =========================================================================
// Schema & Metadata
// =========================================================================

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetMetadataRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMetadataResponse {
    #[prost(message, optional, tag = "1")]
    pub server_capabilities: ::core::option::Option<ServerCapabilities>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(string, repeated, tag = "3")]
    pub resources: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "4")]
    pub data_sources: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "5")]
    pub functions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "6")]
    pub actions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "7")]
    pub list_resources: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetProviderSchemaRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetProviderSchemaResponse {
    #[prost(message, optional, tag = "1")]
    pub provider: ::core::option::Option<Schema>,
    #[prost(map = "string, message", tag = "2")]
    pub resource_schemas: HashMap<::prost::alloc::string::String, Schema>,
    #[prost(map = "string, message", tag = "3")]
    pub data_source_schemas: HashMap<::prost::alloc::string::String, Schema>,
    #[prost(message, repeated, tag = "4")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(message, optional, tag = "5")]
    pub provider_meta: ::core::option::Option<Schema>,
    #[prost(message, optional, tag = "6")]
    pub server_capabilities: ::core::option::Option<ServerCapabilities>,
    #[prost(map = "string, message", tag = "7")]
    pub functions: HashMap<::prost::alloc::string::String, Function>,
    #[prost(map = "string, message", tag = "8")]
    pub list_resource_schemas: HashMap<::prost::alloc::string::String, Schema>,
    #[prost(map = "string, message", tag = "9")]
    pub action_schemas: HashMap<::prost::alloc::string::String, ActionSchemaMessage>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetFunctionsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetFunctionsResponse {
    #[prost(map = "string, message", tag = "1")]
    pub functions: HashMap<::prost::alloc::string::String, Function>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetResourceIdentitySchemasRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResourceIdentitySchemasResponse {
    #[prost(map = "string, message", tag = "1")]
    pub identity_schemas: HashMap<::prost::alloc::string::String, ResourceIdentitySchema>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

// =========================================================================
// Provider Lifecycle
// =========================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateProviderConfigRequest {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateProviderConfigResponse {
    #[prost(message, optional, tag = "1")]
    pub prepared_config: ::core::option::Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureProviderRequest {
    #[prost(string, tag = "1")]
    pub terraform_version: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureProviderResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct StopProviderRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopProviderResponse {
    #[prost(string, tag = "1")]
    pub error: ::prost::alloc::string::String,
}

// =========================================================================
// Resource Operations
// =========================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateResourceConfigRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateResourceConfigResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpgradeResourceStateRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub version: i64,
    #[prost(message, optional, tag = "3")]
    pub raw_state: ::core::option::Option<RawState>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpgradeResourceStateResponse {
    #[prost(message, optional, tag = "1")]
    pub upgraded_state: ::core::option::Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResourceRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub current_state: ::core::option::Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "3")]
    pub private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub provider_meta: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "5")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
    #[prost(message, optional, tag = "6")]
    pub current_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResourceResponse {
    #[prost(message, optional, tag = "1")]
    pub new_state: ::core::option::Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(bytes = "vec", tag = "3")]
    pub private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub deferred: ::core::option::Option<Deferred>,
    #[prost(message, optional, tag = "5")]
    pub new_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanResourceChangeRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub prior_state: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub proposed_new_state: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "4")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "5")]
    pub prior_private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "6")]
    pub provider_meta: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "7")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
    #[prost(message, optional, tag = "8")]
    pub prior_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanResourceChangeResponse {
    #[prost(message, optional, tag = "1")]
    pub planned_state: ::core::option::Option<DynamicValue>,
    #[prost(string, repeated, tag = "2")]
    pub requires_replace: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(bytes = "vec", tag = "3")]
    pub planned_private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "4")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(bool, tag = "5")]
    pub legacy_type_system: bool,
    #[prost(message, optional, tag = "6")]
    pub deferred: ::core::option::Option<Deferred>,
    #[prost(message, optional, tag = "7")]
    pub planned_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplyResourceChangeRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub prior_state: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub planned_state: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "4")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "5")]
    pub planned_private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "6")]
    pub provider_meta: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "7")]
    pub planned_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplyResourceChangeResponse {
    #[prost(message, optional, tag = "1")]
    pub new_state: ::core::option::Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "2")]
    pub private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(bool, tag = "4")]
    pub legacy_type_system: bool,
    #[prost(message, optional, tag = "5")]
    pub new_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportResourceStateRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
    #[prost(message, optional, tag = "4")]
    pub identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportedResource {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub state: ::core::option::Option<DynamicValue>,
    #[prost(bytes = "vec", tag = "3")]
    pub private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImportResourceStateResponse {
    #[prost(message, repeated, tag = "1")]
    pub imported_resources: ::prost::alloc::vec::Vec<ImportedResource>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(message, optional, tag = "3")]
    pub deferred: ::core::option::Option<Deferred>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MoveResourceStateRequest {
    #[prost(string, tag = "1")]
    pub source_provider_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub source_type_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub source_schema_version: i64,
    #[prost(message, optional, tag = "4")]
    pub source_state: ::core::option::Option<RawState>,
    #[prost(string, tag = "5")]
    pub target_type_name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "6")]
    pub source_private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "7")]
    pub source_identity: ::core::option::Option<RawState>,
    #[prost(int64, tag = "8")]
    pub source_identity_schema_version: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MoveResourceStateResponse {
    #[prost(message, optional, tag = "1")]
    pub target_state: ::core::option::Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(bytes = "vec", tag = "3")]
    pub target_private: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub target_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpgradeResourceIdentityRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub version: i64,
    #[prost(message, optional, tag = "3")]
    pub raw_identity: ::core::option::Option<RawState>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpgradeResourceIdentityResponse {
    #[prost(message, optional, tag = "1")]
    pub upgraded_identity: ::core::option::Option<ResourceIdentityData>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

// =========================================================================
// Data Source Operations
// =========================================================================

/// v5 name of the data source validation request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateDataSourceConfigRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateDataSourceConfigResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

/// v6 name of the data source validation request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateDataResourceConfigRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateDataResourceConfigResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadDataSourceRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub provider_meta: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "4")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadDataSourceResponse {
    #[prost(message, optional, tag = "1")]
    pub state: ::core::option::Option<DynamicValue>,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(message, optional, tag = "3")]
    pub deferred: ::core::option::Option<Deferred>,
}

// =========================================================================
// Function Operations
// =========================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallFunctionRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub arguments: ::prost::alloc::vec::Vec<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallFunctionResponse {
    #[prost(message, optional, tag = "1")]
    pub result: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "2")]
    pub error: ::core::option::Option<FunctionErrorMessage>,
}

// =========================================================================
// Action Operations
// =========================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LinkedResourceData {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub prior_state: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub planned_state: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "4")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "5")]
    pub prior_identity: ::core::option::Option<ResourceIdentityData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateActionConfigRequest {
    #[prost(string, tag = "1")]
    pub action_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateActionConfigResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanActionRequest {
    #[prost(string, tag = "1")]
    pub action_type: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub linked_resources: ::prost::alloc::vec::Vec<LinkedResourceData>,
    #[prost(message, optional, tag = "3")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "4")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanActionResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(message, optional, tag = "2")]
    pub deferred: ::core::option::Option<Deferred>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeActionRequest {
    #[prost(string, tag = "1")]
    pub action_type: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub linked_resources: ::prost::alloc::vec::Vec<LinkedResourceData>,
    #[prost(message, optional, tag = "3")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(string, tag = "4")]
    pub invocation_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvokeActionEvent {
    #[prost(oneof = "invoke_action_event::Type", tags = "1, 2, 3")]
    pub r#type: ::core::option::Option<invoke_action_event::Type>,
}

/// Nested message and enum types in `InvokeActionEvent`.
pub mod invoke_action_event {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Progress {
        #[prost(string, repeated, tag = "1")]
        pub stdout: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(string, repeated, tag = "2")]
        pub stderr: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Completed {
        #[prost(message, repeated, tag = "1")]
        pub diagnostics: ::prost::alloc::vec::Vec<super::Diagnostic>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Progress(Progress),
        #[prost(message, tag = "2")]
        Finished(Completed),
        #[prost(message, tag = "3")]
        Error(Completed),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CancelActionRequest {
    #[prost(string, tag = "1")]
    pub invocation_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CancelActionResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

// =========================================================================
// Ephemeral Resource Operations
// =========================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateEphemeralResourceConfigRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateEphemeralResourceConfigResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenEphemeralResourceRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<DynamicValue>,
    #[prost(message, optional, tag = "3")]
    pub client_capabilities: ::core::option::Option<ClientCapabilities>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenEphemeralResourceResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(message, optional, tag = "2")]
    pub result: ::core::option::Option<DynamicValue>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub private: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(message, optional, tag = "4")]
    pub deferred: ::core::option::Option<Deferred>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RenewEphemeralResourceRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub private: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RenewEphemeralResourceResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub private: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloseEphemeralResourceRequest {
    #[prost(string, tag = "1")]
    pub type_name: ::prost::alloc::string::String,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub private: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloseEphemeralResourceResponse {
    #[prost(message, repeated, tag = "1")]
    pub diagnostics: ::prost::alloc::vec::Vec<Diagnostic>,
}

// =========================================================================
// Conversions
// =========================================================================

fn type_bytes(ty: &Type) -> Vec<u8> {
    ty.to_json().to_string().into_bytes()
}

/// Encode a value for the wire as MessagePack.
pub fn encode_value(value: &Value, ty: &Type) -> Result<DynamicValue, ValueError> {
    Ok(DynamicValue {
        msgpack: codec::encode(value, ty)?,
        json: Vec::new(),
    })
}

/// Decode an optional wire value. An absent value is null.
pub fn decode_value(ty: &Type, value: Option<&DynamicValue>) -> Result<Value, ValueError> {
    match value {
        Some(dv) => codec::decode_dynamic(ty, &dv.msgpack, &dv.json),
        None => Ok(Value::null(ty.clone())),
    }
}

/// Decode stored JSON. An absent or empty payload is JSON null.
pub fn decode_raw_state(raw: Option<&RawState>) -> Result<serde_json::Value, ValueError> {
    match raw {
        Some(raw) if !raw.json.is_empty() => {
            serde_json::from_slice(&raw.json).map_err(|e| ValueError::Malformed(e.to_string()))
        }
        _ => Ok(serde_json::Value::Null),
    }
}

/// Wrap an identity for the wire.
pub fn encode_identity(identity: &Value, ty: &Type) -> Result<ResourceIdentityData, ValueError> {
    Ok(ResourceIdentityData {
        identity_data: Some(encode_value(identity, ty)?),
    })
}

/// Unwrap an identity from the wire.
pub fn decode_identity(
    ty: &Type,
    identity: Option<&ResourceIdentityData>,
) -> Result<Option<Value>, ValueError> {
    match identity.and_then(|i| i.identity_data.as_ref()) {
        Some(dv) => decode_value(ty, Some(dv)).map(Some),
        None => Ok(None),
    }
}

pub fn diagnostics_to_proto(diagnostics: Vec<core_schema::Diagnostic>) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

pub fn diagnostics_from_proto(diagnostics: &[Diagnostic]) -> Vec<core_schema::Diagnostic> {
    diagnostics
        .iter()
        .map(|d| {
            let mut out = if d.severity == diagnostic::Severity::Warning as i32 {
                core_schema::Diagnostic::warning(d.summary.clone())
            } else {
                core_schema::Diagnostic::error(d.summary.clone())
            };
            if !d.detail.is_empty() {
                out = out.with_detail(d.detail.clone());
            }
            if !d.attribute.is_empty() {
                out = out.with_attribute(d.attribute.clone());
            }
            out
        })
        .collect()
}

pub fn schema_to_proto(schema: &core_schema::Schema) -> Schema {
    Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &core_schema::Block) -> Block {
    Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| Attribute {
                name: name.clone(),
                r#type: type_bytes(&attr.attr_type),
                description: attr.description.clone().unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                write_only: attr.flags.write_only,
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting: match nested.nesting_mode {
                    BlockNestingMode::Single => nested_block::NestingMode::Single as i32,
                    BlockNestingMode::List => nested_block::NestingMode::List as i32,
                    BlockNestingMode::Set => nested_block::NestingMode::Set as i32,
                    BlockNestingMode::Map => nested_block::NestingMode::Map as i32,
                },
                min_items: nested.min_items as i64,
                max_items: nested.max_items as i64,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

pub fn identity_schema_to_proto(schema: &IdentitySchema) -> ResourceIdentitySchema {
    ResourceIdentitySchema {
        version: schema.version as i64,
        identity_attributes: schema
            .attributes
            .iter()
            .map(|(name, attr)| IdentityAttribute {
                name: name.clone(),
                r#type: type_bytes(&attr.attr_type),
                required_for_import: attr.required_for_import,
                optional_for_import: attr.optional_for_import,
                description: attr.description.clone().unwrap_or_default(),
            })
            .collect(),
    }
}

fn parameter_to_proto(param: &Parameter) -> FunctionParameter {
    FunctionParameter {
        name: param.name.clone(),
        r#type: type_bytes(&param.ty),
        allow_null_value: param.allow_null,
        description: param.description.clone().unwrap_or_default(),
    }
}

pub fn function_to_proto(signature: &FunctionSignature) -> Function {
    Function {
        parameters: signature.parameters.iter().map(parameter_to_proto).collect(),
        variadic_parameter: signature.variadic_parameter.as_ref().map(parameter_to_proto),
        return_type: type_bytes(&signature.return_type),
        summary: signature.summary.clone().unwrap_or_default(),
        description: signature.description.clone().unwrap_or_default(),
    }
}

pub fn function_error_to_proto(err: FunctionError) -> FunctionErrorMessage {
    FunctionErrorMessage {
        text: err.text,
        function_argument: err.argument.map(|i| i as i64),
    }
}

pub fn action_schema_to_proto(schema: &ActionSchema) -> ActionSchemaMessage {
    ActionSchemaMessage {
        schema: Some(schema_to_proto(&schema.schema)),
        linked_resources: schema
            .linked_resources
            .iter()
            .map(|l| LinkedResourceSchemaMessage {
                type_name: l.type_name.clone(),
                description: l.description.clone().unwrap_or_default(),
            })
            .collect(),
    }
}

pub fn action_event_to_proto(event: ActionEvent) -> InvokeActionEvent {
    let event = match event {
        ActionEvent::Progress { stdout, stderr } => {
            invoke_action_event::Type::Progress(invoke_action_event::Progress { stdout, stderr })
        }
        ActionEvent::Finished { diagnostics } => {
            invoke_action_event::Type::Finished(invoke_action_event::Completed {
                diagnostics: diagnostics_to_proto(diagnostics),
            })
        }
        ActionEvent::Error { diagnostics } => {
            invoke_action_event::Type::Error(invoke_action_event::Completed {
                diagnostics: diagnostics_to_proto(diagnostics),
            })
        }
    };
    InvokeActionEvent { r#type: Some(event) }
}

/// Decode linked resources against the state types of their resource types.
pub fn linked_resource_from_proto(
    data: &LinkedResourceData,
    state_type: &Type,
    identity_type: Option<&Type>,
) -> Result<LinkedResource, ValueError> {
    Ok(LinkedResource {
        type_name: data.type_name.clone(),
        prior_state: decode_value(state_type, data.prior_state.as_ref())?,
        planned_state: decode_value(state_type, data.planned_state.as_ref())?,
        config: decode_value(state_type, data.config.as_ref())?,
        prior_identity: match identity_type {
            Some(ty) => decode_identity(ty, data.prior_identity.as_ref())?,
            None => None,
        },
    })
}

impl From<core_types::ServerCapabilities> for ServerCapabilities {
    fn from(caps: core_types::ServerCapabilities) -> Self {
        Self {
            plan_destroy: caps.plan_destroy,
            get_provider_schema_optional: caps.get_provider_schema_optional,
            move_resource_state: caps.move_resource_state,
        }
    }
}

impl From<ClientCapabilities> for core_types::ClientCapabilities {
    fn from(caps: ClientCapabilities) -> Self {
        Self {
            deferral_allowed: caps.deferral_allowed,
            write_only_attributes_allowed: caps.write_only_attributes_allowed,
        }
    }
}

impl From<core_types::Deferred> for Deferred {
    fn from(deferred: core_types::Deferred) -> Self {
        let reason = match deferred.reason {
            DeferredReason::Unknown => deferred::Reason::Unknown,
            DeferredReason::ResourceConfigUnknown => deferred::Reason::ResourceConfigUnknown,
            DeferredReason::ProviderConfigUnknown => deferred::Reason::ProviderConfigUnknown,
            DeferredReason::AbsentPrereq => deferred::Reason::AbsentPrereq,
        };
        Self { reason: reason as i32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute as CoreAttribute, NestedBlock as CoreNestedBlock};
    use prost::Message;

    #[test]
    fn test_schema_to_proto() {
        let schema = core_schema::Schema::new(2)
            .with_attribute("name", CoreAttribute::required_string())
            .with_attribute("password", CoreAttribute::optional_string().write_only().sensitive())
            .with_block(
                "tag",
                CoreNestedBlock::list(
                    core_schema::Block::new()
                        .with_attribute("key", CoreAttribute::required_string()),
                )
                .with_max_items(3),
            );
        let proto = schema_to_proto(&schema);
        assert_eq!(proto.version, 2);
        let block = proto.block.unwrap();
        assert_eq!(block.attributes.len(), 2);
        let password = block.attributes.iter().find(|a| a.name == "password").unwrap();
        assert!(password.write_only && password.sensitive && password.optional);
        assert_eq!(password.r#type, b"\"string\"".to_vec());
        assert_eq!(block.block_types[0].nesting, nested_block::NestingMode::List as i32);
        assert_eq!(block.block_types[0].max_items, 3);
    }

    #[test]
    fn test_diagnostics_round_trip() {
        let diagnostics = vec![
            core_schema::Diagnostic::error("bad").with_detail("very bad").with_attribute("name"),
            core_schema::Diagnostic::warning("meh"),
        ];
        let proto = diagnostics_to_proto(diagnostics.clone());
        assert_eq!(proto[0].severity, diagnostic::Severity::Error as i32);
        assert_eq!(diagnostics_from_proto(&proto), diagnostics);
    }

    #[test]
    fn test_messages_survive_the_wire() {
        let ty = Type::object([("name", Type::String)]);
        let value = Value::object([("name", Value::string("Arthur"))]);
        let req = PlanResourceChangeRequest {
            type_name: "corner_user".to_string(),
            proposed_new_state: Some(encode_value(&value, &ty).unwrap()),
            client_capabilities: Some(ClientCapabilities {
                deferral_allowed: true,
                write_only_attributes_allowed: false,
            }),
            ..Default::default()
        };
        let decoded = PlanResourceChangeRequest::decode(req.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decode_value(&ty, decoded.proposed_new_state.as_ref()).unwrap(), value);
        assert!(decode_value(&ty, decoded.prior_state.as_ref()).unwrap().is_null());
    }

    #[test]
    fn test_raw_state() {
        assert_eq!(decode_raw_state(None).unwrap(), serde_json::Value::Null);
        let raw = RawState {
            json: br#"{"a":1}"#.to_vec(),
        };
        assert_eq!(decode_raw_state(Some(&raw)).unwrap(), serde_json::json!({"a": 1}));
        let bad = RawState { json: b"{".to_vec() };
        assert!(decode_raw_state(Some(&bad)).is_err());
    }

    #[test]
    fn test_action_event_to_proto() {
        let event = action_event_to_proto(ActionEvent::Progress {
            stdout: vec!["hello".to_string()],
            stderr: vec![],
        });
        assert!(matches!(
            event.r#type,
            Some(invoke_action_event::Type::Progress(ref p)) if p.stdout == ["hello"]
        ));

        let event = action_event_to_proto(ActionEvent::Error {
            diagnostics: vec![core_schema::Diagnostic::error("boom")],
        });
        assert!(matches!(
            event.r#type,
            Some(invoke_action_event::Type::Error(ref c)) if c.diagnostics.len() == 1
        ));
    }
}
