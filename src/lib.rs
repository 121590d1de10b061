//! Corner Provider
//!
//! A resource-lifecycle protocol server core, plus the "corner" provider: a
//! set of handlers that exercise the protocol's edge cases (deferral,
//! write-only attributes, refinements, state and identity upgrades, moves,
//! functions and streaming actions).
//!
//! # Overview
//!
//! - **Values**: [`Value`] and [`Type`], the typed dynamic values exchanged
//!   with the host, with MessagePack and JSON codecs
//! - **Schemas**: [`Schema`], [`Attribute`] and [`Diagnostic`] for describing
//!   provider, resource and data source structure
//! - **Handlers**: the [`Resource`], [`DataSource`], [`Function`] and
//!   [`Action`] traits that provider code implements
//! - **Server core**: [`ProviderServer`] routes every operation to the
//!   registered handler and enforces the lifecycle rules around it
//! - **Protocol surfaces**: [`ProtocolV5`] and [`ProtocolV6`] decode wire
//!   messages, call the core and encode the result
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use corner_provider::{corner, ProtocolV6, ProviderProtocol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     corner_provider::init_logging();
//!     let server = corner::provider()?;
//!     let v6 = ProtocolV6::new(std::sync::Arc::new(server));
//!     // hand `v6` to the transport of your choice
//!     Ok(())
//! }
//! ```
//!
//! # Provider Protocol
//!
//! Both surfaces serve the shared operations:
//!
//! - **GetMetadata / GetProviderSchema / GetFunctions**: what the provider offers
//! - **ValidateProviderConfig / ConfigureProvider / StopProvider**: session lifecycle
//! - **ValidateResourceConfig / UpgradeResourceState / ReadResource**
//! - **PlanResourceChange / ApplyResourceChange**: the change lifecycle
//! - **ImportResourceState / MoveResourceState**
//! - **ReadDataSource / CallFunction**
//!
//! v6 adds resource identity, actions and ephemeral resource operations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod codec;
pub mod corner;
pub mod data_source;
pub mod error;
pub mod function;
pub mod lifecycle;
pub mod logging;
pub mod proto;
pub mod protocol;
pub mod refinement;
pub mod resource;
pub mod router;
pub mod schema;
pub mod server;
pub mod session;
pub mod store;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

// Re-export main types at crate root
pub use action::{
    Action, ActionEvent, ActionSchema, LinkedResource, LinkedResourceSchema, ProgressSender,
};
pub use data_source::DataSource;
pub use error::{ProviderError, SchemaError, ValueError};
pub use function::{Function, FunctionError, FunctionSignature, Parameter};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use protocol::{ProtocolV5, ProtocolV6, ProviderProtocol};
pub use refinement::{RangeInclusivity, Refinements};
pub use resource::{ImportPassthrough, ImportTarget, JsonMap, MoveSource, Resource, Upgrader};
pub use schema::{
    Attribute, AttributeFlags, Diagnostic, DiagnosticSeverity, IdentitySchema, PlanModifier, Schema,
};
pub use server::{Configured, Provider, ProviderServer, ProviderServerBuilder, ServerOptions};
pub use session::SessionContext;
pub use store::{MemoryStore, Store, StoreError};
pub use types::{ClientCapabilities, Deferred, DeferredReason, ProviderMetadata, ServerCapabilities};
pub use validation::{is_valid, validate, validate_result};
pub use value::{Type, Value};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
