//! `corner_progress`: an action that streams one progress event carrying
//! a stdout line and a stderr line.

use async_trait::async_trait;
use tracing::debug;

use crate::action::{Action, ActionSchema, LinkedResource, LinkedResourceSchema, ProgressSender};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::session::SessionContext;
use crate::value::Value;

/// Line reported on stdout.
pub const UPDATE_LINE: &str = "Wohooo, we got an update";
/// Line reported on stderr.
pub const ERROR_LINE: &str = "And an error";

/// The `corner_progress` action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAction;

#[async_trait]
impl Action for ProgressAction {
    fn schema(&self) -> ActionSchema {
        ActionSchema::new(
            Schema::v0().with_attribute(
                "fail",
                Attribute::optional_bool().with_description("End the invocation with an error"),
            ),
        )
        .with_linked_resource(LinkedResourceSchema::new("corner_user"))
    }

    async fn plan(
        &self,
        _ctx: &SessionContext,
        _config: &Value,
        linked: &[LinkedResource],
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(linked
            .iter()
            .filter(|l| l.planned_state.is_null())
            .map(|l| {
                Diagnostic::warning("Linked Resource Destroyed")
                    .with_detail(format!("\"{}\" is planned for destruction", l.type_name))
            })
            .collect())
    }

    async fn invoke(
        &self,
        ctx: &SessionContext,
        config: &Value,
        _linked: &[LinkedResource],
        progress: &ProgressSender,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        ctx.check_cancelled()?;
        progress
            .progress(vec![UPDATE_LINE.to_string()], vec![ERROR_LINE.to_string()])
            .await?;
        debug!("progress action sent its update");

        if config.get_attr("fail").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(vec![Diagnostic::error("Progress Failed").with_detail("fail was set")]);
        }
        Ok(vec![])
    }
}
