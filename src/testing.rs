//! Testing utilities for providers built on [`ProviderServer`].
//!
//! [`ProviderTester`] drives the server core directly, without a transport,
//! and fills in the parts of each request a host would normally supply.
//!
//! # Example
//!
//! ```ignore
//! use corner_provider::testing::ProviderTester;
//! use corner_provider::value::Value;
//!
//! #[tokio::test]
//! async fn test_create_user() {
//!     let tester = ProviderTester::new(corner_provider::corner::provider().unwrap());
//!     tester.configure(Value::object([("deferral", Value::bool(false))])).await.unwrap();
//!
//!     let config = tester.resource_config("corner_user", [
//!         ("email", Value::string("ford@prefect.co")),
//!         ("name", Value::string("Ford")),
//!         ("age", Value::number(200.0)),
//!     ]).unwrap();
//!     let state = tester.create("corner_user", config).await.unwrap();
//!     assert_eq!(state.get_attr("name"), Some(&Value::string("Ford")));
//! }
//! ```

use std::sync::Arc;

use tokio_stream::StreamExt;

use crate::action::{ActionEvent, LinkedResource};
use crate::error::ProviderError;
use crate::lifecycle::null_object;
use crate::schema::{Diagnostic, DiagnosticSeverity};
use crate::server::ProviderServer;
use crate::types::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, ClientCapabilities,
    ConfigureProviderRequest, ImportResourceStateRequest, ImportedResource,
    PlanResourceChangeRequest, PlanResourceChangeResponse, ReadDataSourceRequest,
    ReadResourceRequest, ValidateResourceConfigRequest,
};
use crate::value::Value;

/// A test harness around a [`ProviderServer`].
pub struct ProviderTester {
    server: Arc<ProviderServer>,
    capabilities: ClientCapabilities,
}

impl ProviderTester {
    /// Create a tester for the given server. The tester declares every
    /// client capability.
    pub fn new(server: ProviderServer) -> Self {
        Self {
            server: Arc::new(server),
            capabilities: ClientCapabilities {
                deferral_allowed: true,
                write_only_attributes_allowed: true,
            },
        }
    }

    /// Declare a different set of client capabilities on later calls.
    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The server under test.
    pub fn server(&self) -> &Arc<ProviderServer> {
        &self.server
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Registered resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.server.get_metadata().resources
    }

    /// Registered data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.server.get_metadata().data_sources
    }

    /// A complete resource config: the given attributes, everything else null.
    pub fn resource_config<K: Into<String>>(
        &self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Value, ProviderError> {
        let rt = self.server.resource(type_name)?;
        Ok(fill(null_object(rt.state_type()), attributes))
    }

    /// A complete data source config: the given attributes, everything else null.
    pub fn data_source_config<K: Into<String>>(
        &self,
        type_name: &str,
        attributes: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Value, ProviderError> {
        let ds = self.server.data_source(type_name)?;
        Ok(fill(null_object(&ds.schema().implied_type()), attributes))
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let resp = self.server.validate_provider_config(config).await?;
        check_diagnostics(resp.diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self
            .server
            .configure_provider(ConfigureProviderRequest {
                host_version: "test".to_string(),
                config,
                client_capabilities: self.capabilities,
            })
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) {
        self.server.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        type_name: &str,
        config: Value) -> Result<(), TestError> {
        let diagnostics = self
            .server
            .validate_resource_config(ValidateResourceConfigRequest {
                type_name: type_name.to_string(),
                config,
                client_capabilities: Some(self.capabilities),
            })
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a change, returning the raw response.
    pub async fn plan(
        &self,
        type_name: &str,
        prior_state: Value,
        proposed_new_state: Value,
        config: Value,
    ) -> Result<PlanResourceChangeResponse, ProviderError> {
        self.server
            .plan_resource_change(PlanResourceChangeRequest {
                type_name: type_name.to_string(),
                prior_state,
                proposed_new_state,
                config,
                prior_private: Vec::new(),
                provider_meta: None,
                client_capabilities: Some(self.capabilities),
                prior_identity: None,
            })
            .await
    }

    /// Plan creating a resource from `config`.
    pub async fn plan_create(
        &self,
        type_name: &str,
        config: Value,
    ) -> Result<PlanResourceChangeResponse, TestError> {
        let prior = Value::null(self.server.resource(type_name)?.state_type().clone());
        let plan = self.plan(type_name, prior, config.clone(), config).await?;
        check_diagnostics(plan.diagnostics.clone())?;
        Ok(plan)
    }

    /// Plan updating `prior_state` to `config`. Computed attributes the
    /// config leaves null are proposed from the prior state, as a host would.
    pub async fn plan_update(
        &self,
        type_name: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResourceChangeResponse, TestError> {
        let proposed = self.propose(type_name, &prior_state, &config)?;
        let plan = self.plan(type_name, prior_state, proposed, config).await?;
        check_diagnostics(plan.diagnostics.clone())?;
        Ok(plan)
    }

    /// Plan destroying `prior_state`.
    pub async fn plan_delete(
        &self,
        type_name: &str,
        prior_state: Value,
    ) -> Result<PlanResourceChangeResponse, TestError> {
        let ty = self.server.resource(type_name)?.state_type().clone();
        let plan = self
            .plan(type_name, prior_state, Value::null(ty.clone()), Value::null(ty))
            .await?;
        check_diagnostics(plan.diagnostics.clone())?;
        Ok(plan)
    }

    fn propose(
        &self,
        type_name: &str,
        prior_state: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        let rt = self.server.resource(type_name)?;
        let mut proposed = config.clone();
        for (name, attr) in &rt.schema().block.attributes {
            let config_null = config.get_attr(name).map_or(true, Value::is_null);
            if attr.flags.computed && config_null {
                if let Some(prior) = prior_state.get_attr(name) {
                    proposed = proposed.with_attr(name.clone(), prior.clone());
                }
            }
        }
        Ok(proposed)
    }

    /// Apply a change, returning the raw response.
    pub async fn apply(
        &self,
        type_name: &str,
        prior_state: Value,
        planned_state: Value,
        config: Value,
    ) -> Result<ApplyResourceChangeResponse, ProviderError> {
        self.server
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: type_name.to_string(),
                prior_state,
                planned_state,
                config,
                planned_private: Vec::new(),
                provider_meta: None,
                planned_identity: None,
            })
            .await
    }

    /// Plan and apply a create. Returns the new state.
    pub async fn create(&self, type_name: &str, config: Value) -> Result<Value, TestError> {
        let plan = self.plan_create(type_name, config.clone()).await?;
        let prior = Value::null(self.server.resource(type_name)?.state_type().clone());
        let resp = self.apply(type_name, prior, plan.planned_state, config).await?;
        check_diagnostics(resp.diagnostics)?;
        Ok(resp.new_state)
    }

    /// Refresh a resource. Returns the new state, null when it is gone.
    pub async fn read(&self, type_name: &str, current_state: Value) -> Result<Value, TestError> {
        let resp = self
            .server
            .read_resource(ReadResourceRequest {
                type_name: type_name.to_string(),
                current_state,
                private: Vec::new(),
                provider_meta: None,
                client_capabilities: Some(self.capabilities),
                current_identity: None,
            })
            .await?;
        check_diagnostics(resp.diagnostics)?;
        Ok(resp.new_state)
    }

    /// Plan and apply an update. Returns the new state.
    pub async fn update(
        &self,
        type_name: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self.plan_update(type_name, prior_state.clone(), config.clone()).await?;
        let resp = self.apply(type_name, prior_state, plan.planned_state, config).await?;
        check_diagnostics(resp.diagnostics)?;
        Ok(resp.new_state)
    }

    /// Plan and apply a destroy.
    pub async fn delete(&self, type_name: &str, prior_state: Value) -> Result<(), TestError> {
        let plan = self.plan_delete(type_name, prior_state.clone()).await?;
        let config = Value::null(plan.planned_state.ty());
        let resp = self.apply(type_name, prior_state, plan.planned_state, config).await?;
        check_diagnostics(resp.diagnostics)
    }

    /// Import a resource by id.
    pub async fn import(
        &self,
        type_name: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, TestError> {
        let resp = self
            .server
            .import_resource_state(ImportResourceStateRequest {
                type_name: type_name.to_string(),
                id: id.to_string(),
                identity: None,
                client_capabilities: Some(self.capabilities),
            })
            .await?;
        check_diagnostics(resp.diagnostics)?;
        Ok(resp.imported_resources)
    }

    // =========================================================================
    // Data Sources, Functions & Actions
    // =========================================================================

    /// Read a data source. Returns its state.
    pub async fn read_data_source(
        &self,
        type_name: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        let resp = self
            .server
            .read_data_source(ReadDataSourceRequest {
                type_name: type_name.to_string(),
                config,
                provider_meta: None,
                client_capabilities: Some(self.capabilities),
            })
            .await?;
        check_diagnostics(resp.diagnostics)?;
        Ok(resp.state)
    }

    /// Call a function.
    pub async fn call_function(&self, name: &str, args: &[Value]) -> Result<Value, TestError> {
        self.server
            .call_function(name, args)
            .await?
            .map_err(|err| TestError::Diagnostics(vec![Diagnostic::error(err.to_string())]))
    }

    /// Invoke an action and collect every event it emits.
    pub async fn invoke_action(
        &self,
        name: &str,
        invocation_id: &str,
        config: Value,
        linked: Vec<LinkedResource>,
    ) -> Result<Vec<ActionEvent>, ProviderError> {
        let stream = self.server.invoke_action(name, invocation_id, config, linked).await?;
        Ok(stream.collect().await)
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run create → read → update → read → delete.
    ///
    /// Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        type_name: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, TestError> {
        let created = self.create(type_name, initial_config).await?;
        let created = self.read(type_name, created).await?;
        let updated = self.update(type_name, created, updated_config).await?;
        let updated = self.read(type_name, updated).await?;
        self.delete(type_name, updated.clone()).await?;
        Ok(updated)
    }
}

impl std::fmt::Debug for ProviderTester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTester")
            .field("server", &self.server)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

fn fill<K: Into<String>>(
    mut value: Value,
    attributes: impl IntoIterator<Item = (K, Value)>,
) -> Value {
    for (name, attr) in attributes {
        value = value.with_attr(name, attr);
    }
    value
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan destroys the resource.
///
/// # Panics
///
/// Panics if the planned state is not null.
pub fn assert_plan_destroys(plan: &PlanResourceChangeResponse) {
    assert!(
        plan.planned_state.is_null(),
        "Expected a destroy plan, but the planned state is {}",
        plan.planned_state
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if no attribute forces replacement.
pub fn assert_plan_replaces(plan: &PlanResourceChangeResponse) {
    assert!(
        !plan.requires_replace.is_empty(),
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if any attribute forces replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResourceChangeResponse) {
    assert!(
        plan.requires_replace.is_empty(),
        "Expected plan to update in place, but it requires replacement of {:?}",
        plan.requires_replace
    );
}

/// Assert that `path` is among the attributes forcing replacement.
///
/// # Panics
///
/// Panics if `path` does not force replacement.
pub fn assert_plan_replaces_attribute(plan: &PlanResourceChangeResponse, path: &str) {
    assert!(
        plan.requires_replace.iter().any(|p| p == path),
        "Expected '{}' to force replacement, but only {:?} do",
        path,
        plan.requires_replace
    );
}

/// Assert that an attribute is planned unknown.
///
/// # Panics
///
/// Panics if the attribute is missing or known.
pub fn assert_plan_unknown(plan: &PlanResourceChangeResponse, attribute: &str) {
    let value = plan.planned_state.get_attr(attribute);
    assert!(
        value.is_some_and(Value::is_unknown),
        "Expected '{}' to be planned unknown, but got {:?}",
        attribute,
        value
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
