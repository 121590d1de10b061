//! The protocol server core.
//!
//! [`ProviderServer`] owns every registration, the shared store and the
//! session installed by `ConfigureProvider`. Each operation resolves its
//! target through a [`Router`], builds a per-call [`SessionContext`] and
//! hands off to the matching engine. The wire surfaces in
//! [`crate::protocol`] are thin translations on top of this type.
//!
//! # Example
//!
//! ```ignore
//! use corner_provider::{Configured, Provider, ProviderServer, ProviderError};
//! use corner_provider::schema::{Attribute, Schema};
//! use corner_provider::value::Value;
//!
//! struct MyProvider;
//!
//! #[async_trait::async_trait]
//! impl Provider for MyProvider {
//!     fn schema(&self) -> Schema {
//!         Schema::v0().with_attribute("region", Attribute::optional_string())
//!     }
//!
//!     async fn configure(&self, _config: &Value) -> Result<Configured, ProviderError> {
//!         Ok(Configured::default())
//!     }
//! }
//!
//! let server = ProviderServer::builder(MyProvider)
//!     .with_resource("my_thing", MyThing)
//!     .build()?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::action::{Action, ActionEngine, ActionEventStream, ActionType, LinkedResource};
use crate::data_source::{self, DataSource, DataSourceType};
use crate::error::ProviderError;
use crate::function::{self, Function, FunctionError, FunctionSignature, FunctionType};
use crate::lifecycle;
use crate::resource::{Resource, ResourceType};
use crate::router::{RouteKind, Router};
use crate::schema::{has_errors, Diagnostic, IdentitySchema, Schema};
use crate::session::{CancellationToken, SessionContext};
use crate::store::{MemoryStore, Store};
use crate::types::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, ClientCapabilities,
    ConfigureProviderRequest, ImportResourceStateRequest, ImportResourceStateResponse,
    MoveResourceStateRequest, MoveResourceStateResponse, PlanResourceChangeRequest,
    PlanResourceChangeResponse, ProviderMetadata, ProviderSchema, ReadDataSourceRequest,
    ReadDataSourceResponse, ReadResourceRequest, ReadResourceResponse, ServerCapabilities,
    UpgradeResourceIdentityRequest, UpgradeResourceIdentityResponse, UpgradeResourceStateRequest,
    UpgradeResourceStateResponse, ValidateProviderConfigResponse, ValidateResourceConfigRequest,
};
use crate::validation;
use crate::value::Value;

/// What a provider reports back from configure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configured {
    /// Defer every plan, read and import in this session.
    pub defer: bool,
    /// Warnings or errors raised while configuring.
    pub diagnostics: Vec<Diagnostic>,
}

impl Configured {
    /// A configuration that defers all work.
    pub fn deferred() -> Self {
        Self {
            defer: true,
            diagnostics: Vec::new(),
        }
    }
}

/// Provider-level behavior: the provider config schema and configure hook.
///
/// Resources, data sources, functions and actions are registered separately
/// on the [`ProviderServerBuilder`].
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    // =========================================================================
    // Schema
    // =========================================================================

    /// The provider configuration schema.
    fn schema(&self) -> Schema;

    /// The provider-meta schema modules may set, if any.
    fn meta_schema(&self) -> Option<Schema> {
        None
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Provider-specific config checks, run after schema validation.
    async fn validate_config(&self, config: &Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider for this session.
    async fn configure(&self, config: &Value) -> Result<Configured, ProviderError>;
}

/// Options for the provider server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Events an action invocation may queue before it waits for the host.
    /// Default: 16.
    pub action_event_buffer: usize,
    /// Upper bound on any single handler call. Default: none.
    pub handler_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            action_event_buffer: 16,
            handler_timeout: None,
        }
    }
}

impl ServerOptions {
    /// Create new server options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action event buffer size.
    pub fn with_action_event_buffer(mut self, buffer: usize) -> Self {
        self.action_event_buffer = buffer;
        self
    }

    /// Bound every handler call by `timeout`.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
struct Session {
    configured: bool,
    config: Option<Value>,
    client_capabilities: ClientCapabilities,
    deferral_requested: bool,
    stop: CancellationToken,
}

impl Session {
    fn unconfigured() -> Self {
        Self {
            configured: false,
            config: None,
            client_capabilities: ClientCapabilities::default(),
            deferral_requested: false,
            stop: CancellationToken::new(),
        }
    }
}

/// Builder for [`ProviderServer`].
pub struct ProviderServerBuilder {
    provider: Arc<dyn Provider>,
    store: Option<Arc<dyn Store>>,
    resources: Vec<(String, Arc<dyn Resource>)>,
    data_sources: Vec<(String, Arc<dyn DataSource>)>,
    functions: Vec<(String, Arc<dyn Function>)>,
    actions: Vec<(String, Arc<dyn Action>)>,
    options: ServerOptions,
}

impl ProviderServerBuilder {
    /// Use `store` for the session store. Defaults to an empty [`MemoryStore`].
    pub fn with_store(mut self, store: impl Store) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Register a managed resource type.
    pub fn with_resource(mut self, name: impl Into<String>, resource: impl Resource) -> Self {
        self.resources.push((name.into(), Arc::new(resource)));
        self
    }

    /// Register a data source.
    pub fn with_data_source(
        mut self,
        name: impl Into<String>,
        data_source: impl DataSource,
    ) -> Self {
        self.data_sources.push((name.into(), Arc::new(data_source)));
        self
    }

    /// Register a function.
    pub fn with_function(mut self, name: impl Into<String>, function: impl Function) -> Self {
        self.functions.push((name.into(), Arc::new(function)));
        self
    }

    /// Register an action.
    pub fn with_action(mut self, name: impl Into<String>, action: impl Action) -> Self {
        self.actions.push((name.into(), Arc::new(action)));
        self
    }

    /// Set server options.
    pub fn with_options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve every registration and freeze the routers.
    ///
    /// Fails with [`ProviderError::Schema`] on an invalid schema, a bad
    /// function signature, an incomplete upgrader chain or a duplicate name.
    pub fn build(self) -> Result<ProviderServer, ProviderError> {
        let provider_schema = self.provider.schema();
        provider_schema.validate()?;
        let meta_schema = self.provider.meta_schema();
        if let Some(meta) = &meta_schema {
            meta.validate()?;
        }

        let mut resources = Router::builder(RouteKind::Resource);
        for (name, handler) in self.resources {
            resources.insert(name.clone(), ResourceType::new(name, handler)?)?;
        }
        let mut data_sources = Router::builder(RouteKind::DataSource);
        for (name, handler) in self.data_sources {
            data_sources.insert(name.clone(), DataSourceType::new(name, handler)?)?;
        }
        let mut functions = Router::builder(RouteKind::Function);
        for (name, handler) in self.functions {
            functions.insert(name.clone(), FunctionType::new(name, handler)?)?;
        }
        let mut actions = Router::builder(RouteKind::Action);
        for (name, handler) in self.actions {
            actions.insert(name.clone(), ActionType::new(name, handler)?)?;
        }

        let server = ProviderServer {
            provider: self.provider,
            provider_schema,
            meta_schema,
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            resources: resources.build(),
            data_sources: data_sources.build(),
            functions: functions.build(),
            actions: actions.build(),
            action_engine: ActionEngine::new(self.options.action_event_buffer),
            options: self.options,
            session: RwLock::new(Session::unconfigured()),
        };
        info!(
            resources = server.resources.len(),
            data_sources = server.data_sources.len(),
            functions = server.functions.len(),
            actions = server.actions.len(),
            "provider server built"
        );
        Ok(server)
    }
}

/// The protocol server core.
pub struct ProviderServer {
    provider: Arc<dyn Provider>,
    provider_schema: Schema,
    meta_schema: Option<Schema>,
    store: Arc<dyn Store>,
    resources: Router<ResourceType>,
    data_sources: Router<DataSourceType>,
    functions: Router<FunctionType>,
    actions: Router<ActionType>,
    action_engine: ActionEngine,
    options: ServerOptions,
    session: RwLock<Session>,
}

impl ProviderServer {
    /// Start building a server around `provider`.
    pub fn builder(provider: impl Provider) -> ProviderServerBuilder {
        ProviderServerBuilder {
            provider: Arc::new(provider),
            store: None,
            resources: Vec::new(),
            data_sources: Vec::new(),
            functions: Vec::new(),
            actions: Vec::new(),
            options: ServerOptions::default(),
        }
    }

    /// Build the per-call context. Request capabilities override the
    /// capabilities negotiated at configure time.
    async fn context(&self, capabilities: Option<ClientCapabilities>) -> SessionContext {
        let session = self.session.read().await;
        let mut ctx = SessionContext::new(session.stop.clone())
            .with_client_capabilities(capabilities.unwrap_or(session.client_capabilities))
            .with_deferral_requested(session.deferral_requested)
            .with_deadline(self.options.handler_timeout.map(|timeout| Instant::now() + timeout));
        if session.configured {
            ctx = ctx.with_store(Arc::clone(&self.store));
        }
        if let Some(config) = &session.config {
            ctx = ctx.with_provider_config(config.clone());
        }
        ctx
    }

    /// Whether `ConfigureProvider` has succeeded since the last stop.
    pub async fn is_configured(&self) -> bool {
        self.session.read().await.configured
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Names of everything registered, plus server capabilities.
    pub fn get_metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.names(),
            data_sources: self.data_sources.names(),
            functions: self.functions.names(),
            actions: self.actions.names(),
            list_resources: self
                .resources
                .iter()
                .filter(|(_, rt)| rt.list_schema.is_some())
                .map(|(name, _)| name.to_string())
                .collect(),
            capabilities: ServerCapabilities::all(),
        }
    }

    /// Every schema the provider publishes.
    pub fn get_provider_schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: self.provider_schema.clone(),
            provider_meta: self.meta_schema.clone(),
            resources: self
                .resources
                .iter()
                .map(|(name, rt)| (name.to_string(), rt.schema.clone()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, ds)| (name.to_string(), ds.schema.clone()))
                .collect(),
            list_resources: self
                .resources
                .iter()
                .filter_map(|(name, rt)| rt.list_schema.clone().map(|s| (name.to_string(), s)))
                .collect(),
            functions: self.get_functions(),
            actions: self
                .actions
                .iter()
                .map(|(name, action)| (name.to_string(), action.schema.clone()))
                .collect(),
            capabilities: ServerCapabilities::all(),
        }
    }

    /// Function signatures by name.
    pub fn get_functions(&self) -> BTreeMap<String, FunctionSignature> {
        self.functions
            .iter()
            .map(|(name, f)| (name.to_string(), f.signature.clone()))
            .collect()
    }

    /// Identity schemas of every resource that has one.
    pub fn get_resource_identity_schemas(&self) -> BTreeMap<String, IdentitySchema> {
        self.resources
            .iter()
            .filter_map(|(name, rt)| rt.identity_schema.clone().map(|s| (name.to_string(), s)))
            .collect()
    }

    /// Look up a resource registration.
    pub fn resource(&self, name: &str) -> Result<&ResourceType, ProviderError> {
        self.resources.route(name)
    }

    /// Look up a data source registration.
    pub fn data_source(&self, name: &str) -> Result<&DataSourceType, ProviderError> {
        self.data_sources.route(name)
    }

    /// Look up a function registration.
    pub fn function(&self, name: &str) -> Result<&FunctionType, ProviderError> {
        self.functions.route(name)
    }

    /// Look up an action registration.
    pub fn action(&self, name: &str) -> Result<&ActionType, ProviderError> {
        self.actions.route(name)
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate a provider configuration. The config is returned unchanged.
    #[instrument(skip(self, config), name = "core.validate_provider_config")]
    pub async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<ValidateProviderConfigResponse, ProviderError> {
        debug!("ValidateProviderConfig called");
        config.check_type(&self.provider_schema.implied_type(), "config")?;
        let mut diagnostics = validation::validate(&self.provider_schema, &config);
        match self.provider.validate_config(&config).await {
            Ok(extra) => diagnostics.extend(extra),
            Err(e) => diagnostics.push(e.to_diagnostic()),
        }
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "ValidateProviderConfig completed with errors");
        } else {
            info!("ValidateProviderConfig completed successfully");
        }
        Ok(ValidateProviderConfigResponse {
            prepared_config: config,
            diagnostics,
        })
    }

    /// Configure the session: install the config, the store handle, the
    /// client capabilities and any deferral request.
    #[instrument(
        skip(self, req),
        fields(host_version = %req.host_version),
        name = "core.configure_provider"
    )]
    pub async fn configure_provider(
        &self,
        req: ConfigureProviderRequest,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        debug!("ConfigureProvider called");
        req.config.check_type(&self.provider_schema.implied_type(), "config")?;
        let mut diagnostics = validation::validate(&self.provider_schema, &req.config);
        if has_errors(&diagnostics) {
            warn!(
                diagnostics = diagnostics.len(),
                "ConfigureProvider rejected invalid configuration"
            );
            return Ok(diagnostics);
        }

        let configured = match self.provider.configure(&req.config).await {
            Ok(configured) => configured,
            Err(e) => {
                error!(error = %e, "ConfigureProvider failed");
                diagnostics.push(e.to_diagnostic());
                return Ok(diagnostics);
            }
        };
        diagnostics.extend(configured.diagnostics);
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "ConfigureProvider completed with errors");
            return Ok(diagnostics);
        }

        let mut session = self.session.write().await;
        session.configured = true;
        session.config = Some(req.config);
        session.client_capabilities = req.client_capabilities;
        session.deferral_requested = configured.defer;
        info!(
            deferral_requested = configured.defer,
            deferral_allowed = req.client_capabilities.deferral_allowed,
            "ConfigureProvider completed successfully"
        );
        Ok(diagnostics)
    }

    /// End the session: cancel every in-flight call and action and release
    /// the store handle. A later configure starts a fresh session.
    #[instrument(skip(self), name = "core.stop")]
    pub async fn stop(&self) {
        info!("Stop called");
        let mut session = self.session.write().await;
        session.stop.cancel();
        *session = Session::unconfigured();
        drop(session);
        self.action_engine.cancel_all().await;
        info!("Stop completed");
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        req: ValidateResourceConfigRequest,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(req.client_capabilities).await;
        lifecycle::validate_resource_config(rt, &ctx, req).await
    }

    /// Upgrade stored state to the current schema version.
    pub async fn upgrade_resource_state(
        &self,
        req: UpgradeResourceStateRequest,
    ) -> Result<UpgradeResourceStateResponse, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(None).await;
        lifecycle::upgrade_resource_state(rt, &ctx, req).await
    }

    /// Refresh a resource.
    pub async fn read_resource(
        &self,
        req: ReadResourceRequest,
    ) -> Result<ReadResourceResponse, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(req.client_capabilities).await;
        lifecycle::read_resource(rt, &ctx, req).await
    }

    /// Plan a resource change.
    pub async fn plan_resource_change(
        &self,
        req: PlanResourceChangeRequest,
    ) -> Result<PlanResourceChangeResponse, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(req.client_capabilities).await;
        lifecycle::plan_resource_change(rt, &ctx, req).await
    }

    /// Apply a planned resource change.
    pub async fn apply_resource_change(
        &self,
        req: ApplyResourceChangeRequest,
    ) -> Result<ApplyResourceChangeResponse, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(None).await;
        lifecycle::apply_resource_change(rt, &ctx, req).await
    }

    /// Import an existing object.
    pub async fn import_resource_state(
        &self,
        req: ImportResourceStateRequest,
    ) -> Result<ImportResourceStateResponse, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(req.client_capabilities).await;
        lifecycle::import_resource_state(rt, &ctx, req).await
    }

    /// Move state from another resource type into `req.target_type_name`.
    pub async fn move_resource_state(
        &self,
        req: MoveResourceStateRequest,
    ) -> Result<MoveResourceStateResponse, ProviderError> {
        let rt = self.resources.route(&req.target_type_name)?;
        let ctx = self.context(None).await;
        lifecycle::move_resource_state(rt, &ctx, req).await
    }

    /// Upgrade a stored identity to the current identity version.
    pub async fn upgrade_resource_identity(
        &self,
        req: UpgradeResourceIdentityRequest,
    ) -> Result<UpgradeResourceIdentityResponse, ProviderError> {
        let rt = self.resources.route(&req.type_name)?;
        let ctx = self.context(None).await;
        lifecycle::upgrade_resource_identity(rt, &ctx, req).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let ds = self.data_sources.route(type_name)?;
        let ctx = self.context(None).await;
        data_source::validate_data_source_config(ds, &ctx, config).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        req: ReadDataSourceRequest,
    ) -> Result<ReadDataSourceResponse, ProviderError> {
        let ds = self.data_sources.route(&req.type_name)?;
        let ctx = self.context(req.client_capabilities).await;
        data_source::read_data_source(ds, &ctx, req).await
    }

    // =========================================================================
    // Function Operations
    // =========================================================================

    /// Call a function with decoded arguments.
    pub async fn call_function(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<Result<Value, FunctionError>, ProviderError> {
        let f = self.functions.route(name)?;
        let ctx = self.context(None).await;
        function::call_function(f, &ctx, args).await
    }

    // =========================================================================
    // Action Operations
    // =========================================================================

    /// Validate an action configuration.
    pub async fn validate_action_config(
        &self,
        name: &str,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let action = self.actions.route(name)?;
        let ctx = self.context(None).await;
        self.action_engine.validate_config(action, &ctx, config).await
    }

    /// Plan an action.
    pub async fn plan_action(
        &self,
        name: &str,
        config: &Value,
        linked: &[LinkedResource],
        capabilities: Option<ClientCapabilities>,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let action = self.actions.route(name)?;
        let ctx = self.context(capabilities).await;
        self.action_engine.plan(action, &ctx, config, linked).await
    }

    /// Start an action and return its event stream.
    pub async fn invoke_action(
        &self,
        name: &str,
        invocation_id: &str,
        config: Value,
        linked: Vec<LinkedResource>,
    ) -> Result<ActionEventStream, ProviderError> {
        let action = self.actions.route(name)?;
        let ctx = self.context(None).await;
        self.action_engine
            .invoke(action, &ctx, invocation_id, config, linked)
            .await
    }

    /// Cancel a running action. Unknown ids are ignored.
    pub async fn cancel_action(&self, invocation_id: &str) {
        self.action_engine.cancel(invocation_id).await;
    }

    // =========================================================================
    // Ephemeral Resource Operations
    // =========================================================================

    /// The response to every ephemeral resource operation: this provider
    /// registers none.
    pub fn unsupported_ephemeral_resource(
        &self,
        operation: &str,
        type_name: &str,
    ) -> Vec<Diagnostic> {
        warn!(operation, type_name, "ephemeral resource operation rejected");
        vec![Diagnostic::error("Unsupported Ephemeral Resource").with_detail(format!(
            "{}: the provider does not support ephemeral resource \"{}\"",
            operation, type_name
        ))]
    }
}

impl std::fmt::Debug for ProviderServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderServer")
            .field("resources", &self.resources.names())
            .field("data_sources", &self.data_sources.names())
            .field("functions", &self.functions.names())
            .field("actions", &self.actions.names())
            .field("options", &self.options)
            .finish()
    }
}
