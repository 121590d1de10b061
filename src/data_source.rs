//! Data source registrations and their read path.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ProviderError, SchemaError};
use crate::lifecycle::{check_deferral, Deferral};
use crate::schema::{has_errors, Diagnostic, Schema};
use crate::session::SessionContext;
use crate::types::{ReadDataSourceRequest, ReadDataSourceResponse};
use crate::validation;
use crate::value::{Type, Value};

/// Trait implemented by every data source.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Data-source-specific checks, run after schema validation.
    async fn validate_config(
        &self,
        ctx: &SessionContext,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (ctx, config);
        Ok(vec![])
    }

    /// Produce the data source state from its configuration.
    async fn read(&self, ctx: &SessionContext, config: &Value) -> Result<Value, ProviderError>;
}

/// A data source registration.
#[derive(Clone)]
pub struct DataSourceType {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) state_type: Type,
    pub(crate) handler: Arc<dyn DataSource>,
}

impl DataSourceType {
    /// Resolve and check a data source's schema.
    pub fn new(name: impl Into<String>, handler: Arc<dyn DataSource>) -> Result<Self, SchemaError> {
        let schema = handler.schema();
        schema.validate()?;
        Ok(Self {
            name: name.into(),
            state_type: schema.implied_type(),
            schema,
            handler,
        })
    }

    /// The registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The data source schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Validate a data source configuration.
#[instrument(
    skip(ds, ctx, config),
    fields(type_name = %ds.name),
    name = "core.validate_data_source_config"
)]
pub async fn validate_data_source_config(
    ds: &DataSourceType,
    ctx: &SessionContext,
    config: &Value,
) -> Result<Vec<Diagnostic>, ProviderError> {
    config.check_type(&ds.state_type, "config")?;
    let mut diagnostics = validation::validate(&ds.schema, config);
    match ctx.run(ds.handler.validate_config(ctx, config)).await {
        Ok(extra) => diagnostics.extend(extra),
        Err(e) => diagnostics.push(e.to_diagnostic()),
    }
    if has_errors(&diagnostics) {
        warn!(diagnostics = diagnostics.len(), "ValidateDataSourceConfig completed with errors");
    }
    Ok(diagnostics)
}

/// Read a data source.
#[instrument(skip(ds, ctx, req), fields(type_name = %ds.name), name = "core.read_data_source")]
pub async fn read_data_source(
    ds: &DataSourceType,
    ctx: &SessionContext,
    req: ReadDataSourceRequest,
) -> Result<ReadDataSourceResponse, ProviderError> {
    req.config.check_type(&ds.state_type, "config")?;
    let mut resp = ReadDataSourceResponse {
        state: Value::null(ds.state_type.clone()),
        diagnostics: Vec::new(),
        deferred: None,
    };

    match check_deferral(ctx) {
        Deferral::Proceed => {}
        Deferral::Defer(deferred) => {
            info!("ReadDataSource deferred");
            resp.state = req.config;
            resp.deferred = Some(deferred);
            return Ok(resp);
        }
        Deferral::Invalid(diagnostic) => {
            resp.diagnostics.push(diagnostic);
            return Ok(resp);
        }
    }

    debug!("ReadDataSource called");
    match ctx.run(ds.handler.read(ctx, &req.config)).await {
        Ok(state) => {
            state.check_type(&ds.state_type, "").map_err(|err| {
                ProviderError::SchemaMismatch(format!(
                    "state for data source \"{}\" {}",
                    ds.name, err
                ))
            })?;
            if !state.is_fully_known() {
                let summary = "Provider returned invalid result object after read";
                resp.diagnostics.push(
                    Diagnostic::error(summary).with_detail(format!(
                        "The state of data source \"{}\" contains unknown values.",
                        ds.name
                    )),
                );
                return Ok(resp);
            }
            resp.state = state;
            info!("ReadDataSource completed");
        }
        Err(e) => {
            error!(error = %e, "ReadDataSource failed");
            resp.diagnostics.push(e.to_diagnostic());
        }
    }
    Ok(resp)
}
