//! Protocol surfaces.
//!
//! [`ProtocolV5`] and [`ProtocolV6`] translate wire messages into calls on a
//! shared [`ProviderServer`] and encode the results back. Operations common
//! to both versions live on [`ProviderProtocol`] as default methods.
//!
//! Structural failures (unknown type names, undecodable values, handler
//! output that does not match its schema) are returned as [`Status`];
//! everything else travels as diagnostics on the response.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument};

use crate::error::{ProviderError, ValueError};
use crate::function;
use crate::proto;
use crate::resource::ResourceType;
use crate::server::ProviderServer;
use crate::types;
use crate::value::{Type, Value};

/// Stream of action events returned by `InvokeAction`.
pub type InvokeActionStream =
    Pin<Box<dyn Stream<Item = Result<proto::InvokeActionEvent, Status>> + Send>>;

fn decode_err(err: ValueError) -> Status {
    ProviderError::from(err).into()
}

fn decode(ty: &Type, value: Option<&proto::DynamicValue>) -> Result<Value, Status> {
    proto::decode_value(ty, value).map_err(decode_err)
}

fn encode(value: &Value, ty: &Type) -> Result<Option<proto::DynamicValue>, Status> {
    proto::encode_value(value, ty).map(Some).map_err(decode_err)
}

fn identity_type(rt: &ResourceType) -> Option<Type> {
    rt.identity_schema().map(|schema| schema.implied_type())
}

fn decode_identity(
    rt: &ResourceType,
    identity: Option<&proto::ResourceIdentityData>,
) -> Result<Option<Value>, Status> {
    match identity_type(rt) {
        Some(ty) => proto::decode_identity(&ty, identity).map_err(decode_err),
        None => Ok(None),
    }
}

fn encode_identity(
    rt: &ResourceType,
    identity: Option<&Value>,
) -> Result<Option<proto::ResourceIdentityData>, Status> {
    match (identity_type(rt), identity) {
        (Some(ty), Some(identity)) => {
            proto::encode_identity(identity, &ty).map(Some).map_err(decode_err)
        }
        _ => Ok(None),
    }
}

fn raw_json(raw: Option<&proto::RawState>) -> Result<serde_json::Value, Status> {
    proto::decode_raw_state(raw).map_err(decode_err)
}

/// Operations shared by every protocol version.
#[async_trait]
pub trait ProviderProtocol: Send + Sync + 'static {
    /// The server core the surface dispatches to.
    fn server(&self) -> &ProviderServer;

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Serve `GetMetadata`.
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<proto::GetMetadataRequest>,
    ) -> Result<Response<proto::GetMetadataResponse>, Status> {
        debug!("GetMetadata called");
        let metadata = self.server().get_metadata();
        Ok(Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(metadata.capabilities.into()),
            diagnostics: vec![],
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            functions: metadata.functions,
            actions: metadata.actions,
            list_resources: metadata.list_resources,
        }))
    }

    /// Serve `GetProviderSchema`.
    #[instrument(skip(self, _request), name = "grpc.get_provider_schema")]
    async fn get_provider_schema(
        &self,
        _request: Request<proto::GetProviderSchemaRequest>,
    ) -> Result<Response<proto::GetProviderSchemaResponse>, Status> {
        debug!("GetProviderSchema called");
        let schema = self.server().get_provider_schema();
        let schemas = |m: std::collections::BTreeMap<String, crate::schema::Schema>| {
            m.iter()
                .map(|(name, s)| (name.clone(), proto::schema_to_proto(s)))
                .collect::<HashMap<_, _>>()
        };
        let resp = proto::GetProviderSchemaResponse {
            provider: Some(proto::schema_to_proto(&schema.provider)),
            resource_schemas: schemas(schema.resources),
            data_source_schemas: schemas(schema.data_sources),
            diagnostics: vec![],
            provider_meta: schema.provider_meta.as_ref().map(proto::schema_to_proto),
            server_capabilities: Some(schema.capabilities.into()),
            functions: schema
                .functions
                .iter()
                .map(|(name, sig)| (name.clone(), proto::function_to_proto(sig)))
                .collect(),
            list_resource_schemas: schemas(schema.list_resources),
            action_schemas: schema
                .actions
                .iter()
                .map(|(name, a)| (name.clone(), proto::action_schema_to_proto(a)))
                .collect(),
        };
        info!(
            resources = resp.resource_schemas.len(),
            data_sources = resp.data_source_schemas.len(),
            functions = resp.functions.len(),
            "GetProviderSchema completed"
        );
        Ok(Response::new(resp))
    }

    /// Serve `GetFunctions`.
    #[instrument(skip(self, _request), name = "grpc.get_functions")]
    async fn get_functions(
        &self,
        _request: Request<proto::GetFunctionsRequest>,
    ) -> Result<Response<proto::GetFunctionsResponse>, Status> {
        Ok(Response::new(proto::GetFunctionsResponse {
            functions: self
                .server()
                .get_functions()
                .iter()
                .map(|(name, sig)| (name.clone(), proto::function_to_proto(sig)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Serve `ValidateProviderConfig`.
    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<Response<proto::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let ty = self.server().get_provider_schema().provider.implied_type();
        let config = decode(&ty, req.config.as_ref())?;
        let resp = self.server().validate_provider_config(config).await?;
        Ok(Response::new(proto::ValidateProviderConfigResponse {
            prepared_config: encode(&resp.prepared_config, &ty)?,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
        }))
    }

    /// Serve `ConfigureProvider`.
    #[instrument(skip(self, request), name = "grpc.configure_provider")]
    async fn configure_provider(
        &self,
        request: Request<proto::ConfigureProviderRequest>,
    ) -> Result<Response<proto::ConfigureProviderResponse>, Status> {
        let req = request.into_inner();
        let ty = self.server().get_provider_schema().provider.implied_type();
        let config = decode(&ty, req.config.as_ref())?;
        let diagnostics = self
            .server()
            .configure_provider(types::ConfigureProviderRequest {
                host_version: req.terraform_version,
                config,
                client_capabilities: req.client_capabilities.map(Into::into).unwrap_or_default(),
            })
            .await?;
        Ok(Response::new(proto::ConfigureProviderResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }

    /// Serve `StopProvider`.
    #[instrument(skip(self, _request), name = "grpc.stop_provider")]
    async fn stop_provider(
        &self,
        _request: Request<proto::StopProviderRequest>,
    ) -> Result<Response<proto::StopProviderResponse>, Status> {
        self.server().stop().await;
        Ok(Response::new(proto::StopProviderResponse { error: String::new() }))
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Serve `ValidateResourceConfig`.
    #[instrument(skip(self, request), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<Response<proto::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.type_name)?;
        let config = decode(rt.state_type(), req.config.as_ref())?;
        let diagnostics = self
            .server()
            .validate_resource_config(types::ValidateResourceConfigRequest {
                type_name: req.type_name,
                config,
                client_capabilities: req.client_capabilities.map(Into::into),
            })
            .await?;
        Ok(Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }

    /// Serve `UpgradeResourceState`.
    #[instrument(skip(self, request), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: Request<proto::UpgradeResourceStateRequest>,
    ) -> Result<Response<proto::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.type_name)?;
        let version = u64::try_from(req.version).map_err(|_| {
            ProviderError::InvalidRequest(format!("negative schema version {}", req.version))
        })?;
        let resp = self
            .server()
            .upgrade_resource_state(types::UpgradeResourceStateRequest {
                type_name: req.type_name.clone(),
                version,
                raw_state: raw_json(req.raw_state.as_ref())?,
            })
            .await?;
        Ok(Response::new(proto::UpgradeResourceStateResponse {
            upgraded_state: match &resp.upgraded_state {
                Some(state) => encode(state, rt.state_type())?,
                None => None,
            },
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
        }))
    }

    /// Serve `ReadResource`.
    #[instrument(skip(self, request), name = "grpc.read_resource")]
    async fn read_resource(
        &self,
        request: Request<proto::ReadResourceRequest>,
    ) -> Result<Response<proto::ReadResourceResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.type_name)?;
        let resp = self
            .server()
            .read_resource(types::ReadResourceRequest {
                current_state: decode(rt.state_type(), req.current_state.as_ref())?,
                current_identity: decode_identity(rt, req.current_identity.as_ref())?,
                type_name: req.type_name,
                private: req.private,
                provider_meta: None,
                client_capabilities: req.client_capabilities.map(Into::into),
            })
            .await?;
        Ok(Response::new(proto::ReadResourceResponse {
            new_state: encode(&resp.new_state, rt.state_type())?,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
            private: resp.private,
            deferred: resp.deferred.map(Into::into),
            new_identity: encode_identity(rt, resp.new_identity.as_ref())?,
        }))
    }

    /// Serve `PlanResourceChange`.
    #[instrument(skip(self, request), name = "grpc.plan_resource_change")]
    async fn plan_resource_change(
        &self,
        request: Request<proto::PlanResourceChangeRequest>,
    ) -> Result<Response<proto::PlanResourceChangeResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.type_name)?;
        let ty = rt.state_type();
        let resp = self
            .server()
            .plan_resource_change(types::PlanResourceChangeRequest {
                prior_state: decode(ty, req.prior_state.as_ref())?,
                proposed_new_state: decode(ty, req.proposed_new_state.as_ref())?,
                config: decode(ty, req.config.as_ref())?,
                prior_identity: decode_identity(rt, req.prior_identity.as_ref())?,
                type_name: req.type_name,
                prior_private: req.prior_private,
                provider_meta: None,
                client_capabilities: req.client_capabilities.map(Into::into),
            })
            .await?;
        Ok(Response::new(proto::PlanResourceChangeResponse {
            planned_state: encode(&resp.planned_state, ty)?,
            requires_replace: resp.requires_replace,
            planned_private: resp.planned_private,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
            legacy_type_system: resp.legacy_type_system,
            deferred: resp.deferred.map(Into::into),
            planned_identity: encode_identity(rt, resp.planned_identity.as_ref())?,
        }))
    }

    /// Serve `ApplyResourceChange`.
    #[instrument(skip(self, request), name = "grpc.apply_resource_change")]
    async fn apply_resource_change(
        &self,
        request: Request<proto::ApplyResourceChangeRequest>,
    ) -> Result<Response<proto::ApplyResourceChangeResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.type_name)?;
        let ty = rt.state_type();
        let resp = self
            .server()
            .apply_resource_change(types::ApplyResourceChangeRequest {
                prior_state: decode(ty, req.prior_state.as_ref())?,
                planned_state: decode(ty, req.planned_state.as_ref())?,
                config: decode(ty, req.config.as_ref())?,
                planned_identity: decode_identity(rt, req.planned_identity.as_ref())?,
                type_name: req.type_name,
                planned_private: req.planned_private,
                provider_meta: None,
            })
            .await?;
        Ok(Response::new(proto::ApplyResourceChangeResponse {
            new_state: encode(&resp.new_state, ty)?,
            private: resp.private,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
            legacy_type_system: resp.legacy_type_system,
            new_identity: encode_identity(rt, resp.new_identity.as_ref())?,
        }))
    }

    /// Serve `ImportResourceState`.
    #[instrument(skip(self, request), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: Request<proto::ImportResourceStateRequest>,
    ) -> Result<Response<proto::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.type_name)?;
        let resp = self
            .server()
            .import_resource_state(types::ImportResourceStateRequest {
                identity: decode_identity(rt, req.identity.as_ref())?,
                type_name: req.type_name,
                id: req.id,
                client_capabilities: req.client_capabilities.map(Into::into),
            })
            .await?;

        let mut imported_resources = Vec::with_capacity(resp.imported_resources.len());
        for imported in resp.imported_resources {
            let target = self.server().resource(&imported.type_name)?;
            imported_resources.push(proto::ImportedResource {
                state: encode(&imported.state, target.state_type())?,
                identity: encode_identity(target, imported.identity.as_ref())?,
                type_name: imported.type_name,
                private: imported.private,
            });
        }
        Ok(Response::new(proto::ImportResourceStateResponse {
            imported_resources,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
            deferred: resp.deferred.map(Into::into),
        }))
    }

    /// Serve `MoveResourceState`.
    #[instrument(skip(self, request), name = "grpc.move_resource_state")]
    async fn move_resource_state(
        &self,
        request: Request<proto::MoveResourceStateRequest>,
    ) -> Result<Response<proto::MoveResourceStateResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server().resource(&req.target_type_name)?;
        let source_identity = match req.source_identity.as_ref() {
            Some(raw) if !raw.json.is_empty() => Some(raw_json(Some(raw))?),
            _ => None,
        };
        let resp = self
            .server()
            .move_resource_state(types::MoveResourceStateRequest {
                source_schema_version: u64::try_from(req.source_schema_version).unwrap_or_default(),
                source_identity_schema_version: u64::try_from(req.source_identity_schema_version)
                    .unwrap_or_default(),
                source_state: raw_json(req.source_state.as_ref())?,
                source_provider_address: req.source_provider_address,
                source_type_name: req.source_type_name,
                target_type_name: req.target_type_name,
                source_private: req.source_private,
                source_identity,
            })
            .await?;
        Ok(Response::new(proto::MoveResourceStateResponse {
            target_state: match &resp.target_state {
                Some(state) => encode(state, rt.state_type())?,
                None => None,
            },
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
            target_private: resp.target_private,
            target_identity: encode_identity(rt, resp.target_identity.as_ref())?,
        }))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Serve `ReadDataSource`.
    #[instrument(skip(self, request), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: Request<proto::ReadDataSourceRequest>,
    ) -> Result<Response<proto::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        let ty = self.server().data_source(&req.type_name)?.schema().implied_type();
        let resp = self
            .server()
            .read_data_source(types::ReadDataSourceRequest {
                config: decode(&ty, req.config.as_ref())?,
                type_name: req.type_name,
                provider_meta: None,
                client_capabilities: req.client_capabilities.map(Into::into),
            })
            .await?;
        Ok(Response::new(proto::ReadDataSourceResponse {
            state: encode(&resp.state, &ty)?,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
            deferred: resp.deferred.map(Into::into),
        }))
    }

    // =========================================================================
    // Function Operations
    // =========================================================================

    /// Serve `CallFunction`.
    #[instrument(
        skip(self, request),
        fields(name = %request.get_ref().name),
        name = "grpc.call_function"
    )]
    async fn call_function(
        &self,
        request: Request<proto::CallFunctionRequest>,
    ) -> Result<Response<proto::CallFunctionResponse>, Status> {
        let req = request.into_inner();
        let signature = self.server().function(&req.name)?.signature().clone();
        let args = match function::decode_arguments(&signature, &req.arguments) {
            Ok(args) => args,
            Err(err) => {
                return Ok(Response::new(proto::CallFunctionResponse {
                    result: None,
                    error: Some(proto::function_error_to_proto(err)),
                }))
            }
        };
        let resp = match self.server().call_function(&req.name, &args).await? {
            Ok(value) => proto::CallFunctionResponse {
                result: encode(&value, &signature.return_type)?,
                error: None,
            },
            Err(err) => proto::CallFunctionResponse {
                result: None,
                error: Some(proto::function_error_to_proto(err)),
            },
        };
        Ok(Response::new(resp))
    }
}

/// The v5 protocol surface.
#[derive(Debug, Clone)]
pub struct ProtocolV5 {
    server: Arc<ProviderServer>,
}

impl ProtocolV5 {
    /// Wrap `server`.
    pub fn new(server: Arc<ProviderServer>) -> Self {
        Self { server }
    }

    /// Serve `ValidateDataSourceConfig`.
    #[instrument(skip(self, request), name = "grpc.validate_data_source_config")]
    pub async fn validate_data_source_config(
        &self,
        request: Request<proto::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<proto::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        let ty = self.server.data_source(&req.type_name)?.schema().implied_type();
        let config = decode(&ty, req.config.as_ref())?;
        let diagnostics = self.server.validate_data_source_config(&req.type_name, &config).await?;
        Ok(Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }
}

impl ProviderProtocol for ProtocolV5 {
    fn server(&self) -> &ProviderServer {
        &self.server
    }
}

/// The v6 protocol surface. Adds identities, actions and the ephemeral
/// resource operations.
#[derive(Debug, Clone)]
pub struct ProtocolV6 {
    server: Arc<ProviderServer>,
}

impl ProviderProtocol for ProtocolV6 {
    fn server(&self) -> &ProviderServer {
        &self.server
    }
}

impl ProtocolV6 {
    /// Wrap `server`.
    pub fn new(server: Arc<ProviderServer>) -> Self {
        Self { server }
    }

    /// Serve `ValidateDataResourceConfig`.
    #[instrument(skip(self, request), name = "grpc.validate_data_resource_config")]
    pub async fn validate_data_resource_config(
        &self,
        request: Request<proto::ValidateDataResourceConfigRequest>,
    ) -> Result<Response<proto::ValidateDataResourceConfigResponse>, Status> {
        let req = request.into_inner();
        let ty = self.server.data_source(&req.type_name)?.schema().implied_type();
        let config = decode(&ty, req.config.as_ref())?;
        let diagnostics = self.server.validate_data_source_config(&req.type_name, &config).await?;
        Ok(Response::new(proto::ValidateDataResourceConfigResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }

    // =========================================================================
    // Identity Operations
    // =========================================================================

    /// Serve `GetResourceIdentitySchemas`.
    #[instrument(skip(self, _request), name = "grpc.get_resource_identity_schemas")]
    pub async fn get_resource_identity_schemas(
        &self,
        _request: Request<proto::GetResourceIdentitySchemasRequest>,
    ) -> Result<Response<proto::GetResourceIdentitySchemasResponse>, Status> {
        Ok(Response::new(proto::GetResourceIdentitySchemasResponse {
            identity_schemas: self
                .server
                .get_resource_identity_schemas()
                .iter()
                .map(|(name, schema)| (name.clone(), proto::identity_schema_to_proto(schema)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    /// Serve `UpgradeResourceIdentity`.
    #[instrument(skip(self, request), name = "grpc.upgrade_resource_identity")]
    pub async fn upgrade_resource_identity(
        &self,
        request: Request<proto::UpgradeResourceIdentityRequest>,
    ) -> Result<Response<proto::UpgradeResourceIdentityResponse>, Status> {
        let req = request.into_inner();
        let rt = self.server.resource(&req.type_name)?;
        let version = u64::try_from(req.version).map_err(|_| {
            ProviderError::InvalidRequest(format!("negative identity version {}", req.version))
        })?;
        let resp = self
            .server
            .upgrade_resource_identity(types::UpgradeResourceIdentityRequest {
                type_name: req.type_name.clone(),
                version,
                raw_identity: raw_json(req.raw_identity.as_ref())?,
            })
            .await?;
        Ok(Response::new(proto::UpgradeResourceIdentityResponse {
            upgraded_identity: encode_identity(rt, resp.upgraded_identity.as_ref())?,
            diagnostics: proto::diagnostics_to_proto(resp.diagnostics),
        }))
    }

    // =========================================================================
    // Action Operations
    // =========================================================================

    fn action_config(
        &self,
        name: &str,
        config: Option<&proto::DynamicValue>,
    ) -> Result<Value, Status> {
        let ty = self.server.action(name)?.schema().schema.implied_type();
        decode(&ty, config)
    }

    fn linked_resources(
        &self,
        linked: &[proto::LinkedResourceData],
    ) -> Result<Vec<crate::action::LinkedResource>, Status> {
        linked
            .iter()
            .map(|data| {
                let rt = self.server.resource(&data.type_name)?;
                proto::linked_resource_from_proto(data, rt.state_type(), identity_type(rt).as_ref())
                    .map_err(decode_err)
            })
            .collect()
    }

    /// Serve `ValidateActionConfig`.
    #[instrument(skip(self, request), name = "grpc.validate_action_config")]
    pub async fn validate_action_config(
        &self,
        request: Request<proto::ValidateActionConfigRequest>,
    ) -> Result<Response<proto::ValidateActionConfigResponse>, Status> {
        let req = request.into_inner();
        let config = self.action_config(&req.action_type, req.config.as_ref())?;
        let diagnostics = self.server.validate_action_config(&req.action_type, &config).await?;
        Ok(Response::new(proto::ValidateActionConfigResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }

    /// Serve `PlanAction`.
    #[instrument(skip(self, request), name = "grpc.plan_action")]
    pub async fn plan_action(
        &self,
        request: Request<proto::PlanActionRequest>,
    ) -> Result<Response<proto::PlanActionResponse>, Status> {
        let req = request.into_inner();
        let config = self.action_config(&req.action_type, req.config.as_ref())?;
        let linked = self.linked_resources(&req.linked_resources)?;
        let diagnostics = self
            .server
            .plan_action(
                &req.action_type,
                &config,
                &linked,
                req.client_capabilities.map(Into::into),
            )
            .await?;
        Ok(Response::new(proto::PlanActionResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
            deferred: None,
        }))
    }

    /// Serve `InvokeAction`.
    #[instrument(
        skip(self, request),
        fields(invocation_id = %request.get_ref().invocation_id),
        name = "grpc.invoke_action"
    )]
    pub async fn invoke_action(
        &self,
        request: Request<proto::InvokeActionRequest>,
    ) -> Result<Response<InvokeActionStream>, Status> {
        let req = request.into_inner();
        let config = self.action_config(&req.action_type, req.config.as_ref())?;
        let linked = self.linked_resources(&req.linked_resources)?;
        let events = self
            .server
            .invoke_action(&req.action_type, &req.invocation_id, config, linked)
            .await?;
        let stream: InvokeActionStream =
            Box::pin(events.map(|event| Ok(proto::action_event_to_proto(event))));
        Ok(Response::new(stream))
    }

    /// Serve `CancelAction`.
    #[instrument(
        skip(self, request),
        fields(invocation_id = %request.get_ref().invocation_id),
        name = "grpc.cancel_action"
    )]
    pub async fn cancel_action(
        &self,
        request: Request<proto::CancelActionRequest>,
    ) -> Result<Response<proto::CancelActionResponse>, Status> {
        self.server.cancel_action(&request.get_ref().invocation_id).await;
        Ok(Response::new(proto::CancelActionResponse { diagnostics: vec![] }))
    }

    // =========================================================================
    // Ephemeral Resource Operations
    // =========================================================================

    /// Serve `ValidateEphemeralResourceConfig`.
    pub async fn validate_ephemeral_resource_config(
        &self,
        request: Request<proto::ValidateEphemeralResourceConfigRequest>,
    ) -> Result<Response<proto::ValidateEphemeralResourceConfigResponse>, Status> {
        let diagnostics = self.server.unsupported_ephemeral_resource(
            "ValidateEphemeralResourceConfig",
            &request.get_ref().type_name,
        );
        Ok(Response::new(proto::ValidateEphemeralResourceConfigResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }

    /// Serve `OpenEphemeralResource`.
    pub async fn open_ephemeral_resource(
        &self,
        request: Request<proto::OpenEphemeralResourceRequest>,
    ) -> Result<Response<proto::OpenEphemeralResourceResponse>, Status> {
        let diagnostics = self
            .server
            .unsupported_ephemeral_resource("OpenEphemeralResource", &request.get_ref().type_name);
        Ok(Response::new(proto::OpenEphemeralResourceResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
            ..Default::default()
        }))
    }

    /// Serve `RenewEphemeralResource`.
    pub async fn renew_ephemeral_resource(
        &self,
        request: Request<proto::RenewEphemeralResourceRequest>,
    ) -> Result<Response<proto::RenewEphemeralResourceResponse>, Status> {
        let diagnostics = self
            .server
            .unsupported_ephemeral_resource("RenewEphemeralResource", &request.get_ref().type_name);
        Ok(Response::new(proto::RenewEphemeralResourceResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
            private: None,
        }))
    }

    /// Serve `CloseEphemeralResource`.
    pub async fn close_ephemeral_resource(
        &self,
        request: Request<proto::CloseEphemeralResourceRequest>,
    ) -> Result<Response<proto::CloseEphemeralResourceResponse>, Status> {
        let diagnostics = self
            .server
            .unsupported_ephemeral_resource("CloseEphemeralResource", &request.get_ref().type_name);
        Ok(Response::new(proto::CloseEphemeralResourceResponse {
            diagnostics: proto::diagnostics_to_proto(diagnostics),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corner;
    use crate::refinement::Refinements;

    fn v6() -> ProtocolV6 {
        ProtocolV6::new(Arc::new(corner::provider().unwrap()))
    }

    fn dv(value: &Value, ty: &Type) -> Option<proto::DynamicValue> {
        encode(value, ty).unwrap()
    }

    #[tokio::test]
    async fn test_metadata_lists_registrations() {
        let resp = v6()
            .get_metadata(Request::new(proto::GetMetadataRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.resources.contains(&"corner_user".to_string()));
        assert!(resp.actions.contains(&"corner_progress".to_string()));
        let caps = resp.server_capabilities.unwrap();
        assert!(caps.plan_destroy && caps.get_provider_schema_optional && caps.move_resource_state);
    }

    #[tokio::test]
    async fn test_plan_keeps_arrived_not_null_over_the_wire() {
        let v6 = v6();
        let ty = v6.server().resource("corner_refinement").unwrap().state_type().clone();
        let not_null = Value::unknown_refined(Type::String, Refinements::new().not_null());
        let config = Value::object([
            ("name", Value::string("abc")),
            ("id", Value::null(Type::String)),
            ("str_value", not_null.clone()),
            ("prefixed", Value::null(Type::String)),
            ("count", Value::null(Type::Number)),
            ("tags", Value::null(Type::list(Type::String))),
        ]);

        let resp = v6
            .plan_resource_change(Request::new(proto::PlanResourceChangeRequest {
                type_name: "corner_refinement".to_string(),
                prior_state: dv(&Value::null(ty.clone()), &ty),
                proposed_new_state: dv(&config, &ty),
                config: dv(&config, &ty),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.diagnostics.is_empty());

        let planned = decode(&ty, resp.planned_state.as_ref()).unwrap();
        assert_eq!(planned.get_attr("str_value"), Some(&not_null));
        assert_eq!(planned.get_attr("name"), Some(&Value::string("abc")));
    }

    #[tokio::test]
    async fn test_unknown_type_is_unimplemented() {
        let err = v6()
            .read_resource(Request::new(proto::ReadResourceRequest {
                type_name: "does_not_exist".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_invalid_argument() {
        let err = v6()
            .validate_resource_config(Request::new(proto::ValidateResourceConfigRequest {
                type_name: "corner_user".to_string(),
                config: Some(proto::DynamicValue {
                    msgpack: vec![0xc1],
                    json: vec![],
                }),
                client_capabilities: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_call_function_reports_argument() {
        let v6 = v6();
        let resp = v6
            .call_function(Request::new(proto::CallFunctionRequest {
                name: "email_domain".to_string(),
                arguments: vec![dv(&Value::string("no-at-sign"), &Type::String).unwrap()],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().function_argument, Some(0));

        let resp = v6
            .call_function(Request::new(proto::CallFunctionRequest {
                name: "string".to_string(),
                arguments: vec![dv(&Value::string("hello"), &Type::String).unwrap()],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.error.is_none());
        assert_eq!(decode(&Type::String, resp.result.as_ref()).unwrap(), Value::string("hello"));
    }

    #[tokio::test]
    async fn test_ephemeral_operations_are_unsupported() {
        let resp = v6()
            .open_ephemeral_resource(Request::new(proto::OpenEphemeralResourceRequest {
                type_name: "corner_secret".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "Unsupported Ephemeral Resource");
        assert!(resp.diagnostics[0].detail.contains("OpenEphemeralResource"));
        assert!(resp.diagnostics[0].detail.contains("corner_secret"));
    }

    #[tokio::test]
    async fn test_v5_validate_data_source_config() {
        let v5 = ProtocolV5::new(Arc::new(corner::provider().unwrap()));
        let ty = v5.server().data_source("corner_regions").unwrap().schema().implied_type();
        let config = Value::object([("names", Value::null(Type::list(Type::String)))]);
        let resp = v5
            .validate_data_source_config(Request::new(proto::ValidateDataSourceConfigRequest {
                type_name: "corner_regions".to_string(),
                config: dv(&config, &ty),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.diagnostics.is_empty());
    }
}
