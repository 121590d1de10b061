//! The corner provider.
//!
//! A deliberately small provider that touches every corner of the server
//! core: state and identity upgrades, moves, write-only attributes,
//! refinements, deferral, functions and a streaming action. Users live in
//! the session store under the `user` kind, keyed by email.

mod action;
mod data;
mod functions;
mod refinement;
mod user;
mod write_only;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::server::{Configured, Provider, ProviderServer, ServerOptions};
use crate::store::MemoryStore;
use crate::value::Value;

pub use action::{ProgressAction, ERROR_LINE, UPDATE_LINE};
pub use data::{RegionsDataSource, UserDataSource};
pub use functions::{BoolFunction, EmailDomainFunction, NumberFunction, StringFunction};
pub use refinement::RefinementResource;
pub use user::{UserResource, LEGACY_USER_TYPE, PROVIDER_ADDRESS, USER_KIND};
pub use write_only::WriteOnlyResource;

/// Provider-level configuration for the corner provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct CornerProvider;

#[async_trait]
impl Provider for CornerProvider {
    fn schema(&self) -> Schema {
        Schema::v0().with_attribute(
            "deferral",
            Attribute::optional_bool()
                .with_description("Defer every plan, read and import in this session"),
        )
    }

    async fn configure(&self, config: &Value) -> Result<Configured, ProviderError> {
        let defer = config.get_attr("deferral").and_then(Value::as_bool).unwrap_or(false);
        debug!(defer, "configuring corner provider");
        Ok(Configured {
            defer,
            diagnostics: Vec::new(),
        })
    }
}

/// Build the corner provider server over a seeded [`MemoryStore`].
pub fn provider() -> Result<ProviderServer, ProviderError> {
    provider_with_options(ServerOptions::default())
}

/// Build the corner provider server with custom options.
pub fn provider_with_options(options: ServerOptions) -> Result<ProviderServer, ProviderError> {
    ProviderServer::builder(CornerProvider)
        .with_store(MemoryStore::seeded())
        .with_options(options)
        .with_resource("corner_user", UserResource)
        .with_resource("corner_write_only", WriteOnlyResource::new())
        .with_resource("corner_write_only_leak", WriteOnlyResource::leaky())
        .with_resource("corner_refinement", RefinementResource)
        .with_data_source("corner_regions", RegionsDataSource)
        .with_data_source("corner_user", UserDataSource)
        .with_function("bool", BoolFunction)
        .with_function("number", NumberFunction)
        .with_function("string", StringFunction)
        .with_function("email_domain", EmailDomainFunction)
        .with_action("corner_progress", ProgressAction)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientCapabilities, ConfigureProviderRequest};

    #[test]
    fn test_provider_builds() {
        let server = provider().unwrap();
        let metadata = server.get_metadata();
        assert_eq!(
            metadata.resources,
            vec!["corner_refinement", "corner_user", "corner_write_only", "corner_write_only_leak"]
        );
        assert_eq!(metadata.data_sources, vec!["corner_regions", "corner_user"]);
        assert_eq!(metadata.functions, vec!["bool", "email_domain", "number", "string"]);
        assert_eq!(metadata.actions, vec!["corner_progress"]);
    }

    #[tokio::test]
    async fn test_configure_reads_deferral() {
        let server = provider().unwrap();
        let diagnostics = server
            .configure_provider(ConfigureProviderRequest {
                host_version: "1.11.0".to_string(),
                config: Value::object([("deferral", Value::bool(true))]),
                client_capabilities: ClientCapabilities::default(),
            })
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        assert!(server.is_configured().await);
    }
}
