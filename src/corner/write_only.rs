//! `corner_write_only`: a resource with a write-only password.
//!
//! The password is only ever visible to the handler through the config.
//! The leaky variant copies it into state and opts out of engine
//! enforcement, so the host-side check has something to catch.

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;
use crate::resource::{ImportPassthrough, Resource};
use crate::schema::{Attribute, Schema};
use crate::session::SessionContext;
use crate::value::{Type, Value};

/// Marker stored in `saved_password` once a password has been supplied.
pub const SAVED_MARKER: &str = "(saved)";

/// A resource holding a write-only password.
#[derive(Debug, Clone, Copy)]
pub struct WriteOnlyResource {
    leak: bool,
}

impl WriteOnlyResource {
    /// A resource that never stores the password.
    pub fn new() -> Self {
        Self { leak: false }
    }

    /// A variant that returns the password in state.
    pub fn leaky() -> Self {
        Self { leak: true }
    }

    fn apply_password(&self, planned_state: &Value, config: &Value) -> Value {
        let password = config.get_attr("password").cloned().unwrap_or(Value::null(Type::String));
        let mut state = planned_state.clone();
        if !password.is_null() {
            state = state.with_attr("saved_password", Value::string(SAVED_MARKER));
        } else if state.get_attr("saved_password").map_or(true, Value::is_unknown) {
            state = state.with_attr("saved_password", Value::null(Type::String));
        }
        if self.leak {
            state = state.with_attr("password", password);
        }
        state
    }
}

impl Default for WriteOnlyResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for WriteOnlyResource {
    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .write_only()
                    .sensitive()
                    .with_description("Sent on create and update, never stored"),
            )
            .with_attribute("saved_password", Attribute::computed_string())
    }

    fn import_passthrough(&self) -> Option<ImportPassthrough> {
        Some(ImportPassthrough::attribute("name"))
    }

    fn enforce_write_only(&self) -> bool {
        !self.leak
    }

    async fn create(
        &self,
        _ctx: &SessionContext,
        planned_state: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        debug!(leak = self.leak, "creating write-only resource");
        Ok(self.apply_password(planned_state, config))
    }

    async fn read(
        &self,
        _ctx: &SessionContext,
        current_state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        Ok(Some(current_state.clone()))
    }

    async fn update(
        &self,
        _ctx: &SessionContext,
        _prior_state: &Value,
        planned_state: &Value,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        Ok(self.apply_password(planned_state, config))
    }

    async fn delete(
        &self,
        _ctx: &SessionContext,
        _prior_state: &Value) -> Result<(), ProviderError> {
        Ok(())
    }
}
