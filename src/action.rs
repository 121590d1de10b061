//! Actions: provider-side operations that stream progress while they run.
//!
//! An invocation runs in its own task and reports through a bounded channel.
//! The host sees zero or more [`ActionEvent::Progress`] events followed by
//! exactly one terminal [`ActionEvent::Finished`] or [`ActionEvent::Error`].
//! Cancelling an invocation trips its [`CancellationToken`]; the handler
//! future is dropped at its next await point.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ProviderError, SchemaError};
use crate::schema::{has_errors, Diagnostic, Schema};
use crate::session::{CancellationToken, SessionContext};
use crate::validation;
use crate::value::{Type, Value};

/// A resource type an action may operate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedResourceSchema {
    /// The linked resource type name.
    pub type_name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LinkedResourceSchema {
    /// Link a resource type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            description: None,
        }
    }
}

/// The schema an action publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    /// Configuration schema.
    pub schema: Schema,
    /// Resource types the action may be linked to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_resources: Vec<LinkedResourceSchema>,
}

impl ActionSchema {
    /// An unlinked action with the given config schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            linked_resources: Vec::new(),
        }
    }

    /// Add a linked resource type.
    pub fn with_linked_resource(mut self, linked: LinkedResourceSchema) -> Self {
        self.linked_resources.push(linked);
        self
    }
}

/// A linked resource instance passed to plan and invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedResource {
    /// The resource type name.
    pub type_name: String,
    /// State before the action.
    pub prior_state: Value,
    /// State the host expects after the action.
    pub planned_state: Value,
    /// The resource configuration.
    pub config: Value,
    /// Identity before the action.
    pub prior_identity: Option<Value>,
}

/// One event on an invocation's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEvent {
    /// Output produced while the action runs.
    Progress {
        /// Lines for standard output.
        stdout: Vec<String>,
        /// Lines for standard error.
        stderr: Vec<String>,
    },
    /// The action completed.
    Finished {
        /// Warnings raised along the way.
        diagnostics: Vec<Diagnostic>,
    },
    /// The action failed or was cancelled.
    Error {
        /// At least one error diagnostic.
        diagnostics: Vec<Diagnostic>,
    },
}

impl ActionEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Stream of events for one invocation.
pub type ActionEventStream = Pin<Box<dyn Stream<Item = ActionEvent> + Send>>;

/// Handle an action uses to report progress.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ActionEvent>,
}

impl ProgressSender {
    /// Send a progress event. Fails once the host stops listening.
    pub async fn progress(
        &self,
        stdout: Vec<String>,
        stderr: Vec<String>) -> Result<(), ProviderError> {
        self.tx
            .send(ActionEvent::Progress { stdout, stderr })
            .await
            .map_err(|_| ProviderError::Cancelled("action event stream closed".to_string()))
    }

    /// Send a single stdout line.
    pub async fn stdout(&self, line: impl Into<String>) -> Result<(), ProviderError> {
        self.progress(vec![line.into()], Vec::new()).await
    }

    /// Send a single stderr line.
    pub async fn stderr(&self, line: impl Into<String>) -> Result<(), ProviderError> {
        self.progress(Vec::new(), vec![line.into()]).await
    }
}

/// Trait implemented by every action.
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// The action schema.
    fn schema(&self) -> ActionSchema;

    /// Action-specific config checks, run after schema validation.
    async fn validate_config(
        &self,
        ctx: &SessionContext,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (ctx, config);
        Ok(vec![])
    }

    /// Check that the action can run against the linked resources.
    async fn plan(
        &self,
        ctx: &SessionContext,
        config: &Value,
        linked: &[LinkedResource],
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (ctx, config, linked);
        Ok(vec![])
    }

    /// Run the action. Error diagnostics in the result end the stream with
    /// [`ActionEvent::Error`].
    async fn invoke(
        &self,
        ctx: &SessionContext,
        config: &Value,
        linked: &[LinkedResource],
        progress: &ProgressSender,
    ) -> Result<Vec<Diagnostic>, ProviderError>;
}

/// An action registration.
#[derive(Clone)]
pub struct ActionType {
    pub(crate) name: String,
    pub(crate) schema: ActionSchema,
    pub(crate) config_type: Type,
    pub(crate) handler: Arc<dyn Action>,
}

impl ActionType {
    /// Resolve and check an action's schema.
    pub fn new(name: impl Into<String>, handler: Arc<dyn Action>) -> Result<Self, SchemaError> {
        let schema = handler.schema();
        schema.schema.validate()?;
        Ok(Self {
            name: name.into(),
            config_type: schema.schema.implied_type(),
            schema,
            handler,
        })
    }

    /// The registered action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The action schema.
    pub fn schema(&self) -> &ActionSchema {
        &self.schema
    }

    fn check_linked(&self, linked: &[LinkedResource]) -> Vec<Diagnostic> {
        linked
            .iter()
            .filter(|l| !self.schema.linked_resources.iter().any(|s| s.type_name == l.type_name))
            .map(|l| {
                Diagnostic::error("Invalid Linked Resource").with_detail(format!(
                    "The action \"{}\" cannot be linked to resource type \"{}\"",
                    self.name, l.type_name
                ))
            })
            .collect()
    }
}

/// Tracks in-flight invocations so they can be cancelled.
#[derive(Debug, Clone)]
pub struct ActionEngine {
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
    buffer: usize,
}

impl ActionEngine {
    /// Create an engine whose event channels hold `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Validate an action configuration.
    #[instrument(
        skip(self, action, ctx, config),
        fields(action = %action.name),
        name = "core.validate_action_config"
    )]
    pub async fn validate_config(
        &self,
        action: &ActionType,
        ctx: &SessionContext,
        config: &Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        config.check_type(&action.config_type, "config")?;
        let mut diagnostics = validation::validate(&action.schema.schema, config);
        match ctx.run(action.handler.validate_config(ctx, config)).await {
            Ok(extra) => diagnostics.extend(extra),
            Err(e) => diagnostics.push(e.to_diagnostic()),
        }
        Ok(diagnostics)
    }

    /// Plan an action against its linked resources.
    #[instrument(
        skip(self, action, ctx, config, linked),
        fields(action = %action.name),
        name = "core.plan_action"
    )]
    pub async fn plan(
        &self,
        action: &ActionType,
        ctx: &SessionContext,
        config: &Value,
        linked: &[LinkedResource],
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        config.check_type(&action.config_type, "config")?;
        let mut diagnostics = validation::validate(&action.schema.schema, config);
        diagnostics.extend(action.check_linked(linked));
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }
        match ctx.run(action.handler.plan(ctx, config, linked)).await {
            Ok(extra) => diagnostics.extend(extra),
            Err(e) => diagnostics.push(e.to_diagnostic()),
        }
        debug!(diagnostics = diagnostics.len(), "PlanAction completed");
        Ok(diagnostics)
    }

    /// Start an invocation and return its event stream.
    ///
    /// The invocation id is chosen by the host; it is the handle
    /// [`ActionEngine::cancel`] takes. An empty id makes the invocation
    /// uncancellable except through a server stop.
    #[instrument(
        skip(self, action, ctx, config, linked),
        fields(action = %action.name),
        name = "core.invoke_action"
    )]
    pub async fn invoke(
        &self,
        action: &ActionType,
        ctx: &SessionContext,
        invocation_id: &str,
        config: Value,
        linked: Vec<LinkedResource>,
    ) -> Result<ActionEventStream, ProviderError> {
        config.check_type(&action.config_type, "config")?;
        let (tx, rx) = mpsc::channel(self.buffer);

        let mut diagnostics = validation::validate(&action.schema.schema, &config);
        diagnostics.extend(action.check_linked(&linked));
        if has_errors(&diagnostics) {
            warn!("InvokeAction rejected invalid configuration");
            // the channel has room for at least one event
            let _ = tx.try_send(ActionEvent::Error { diagnostics });
            return Ok(Box::pin(ReceiverStream::new(rx)));
        }

        let token = CancellationToken::new();
        if !invocation_id.is_empty() {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.contains_key(invocation_id) {
                return Err(ProviderError::InvalidRequest(format!(
                    "action invocation \"{}\" is already running",
                    invocation_id
                )));
            }
            in_flight.insert(invocation_id.to_string(), token.clone());
        }

        let ctx = ctx.clone().with_cancel(token);
        let handler = Arc::clone(&action.handler);
        let in_flight = Arc::clone(&self.in_flight);
        let invocation_id = invocation_id.to_string();
        let action_name = action.name.clone();

        tokio::spawn(async move {
            let progress = ProgressSender { tx: tx.clone() };
            let result = ctx.run(handler.invoke(&ctx, &config, &linked, &progress)).await;
            let terminal = match result {
                Ok(diagnostics) if has_errors(&diagnostics) => ActionEvent::Error { diagnostics },
                Ok(diagnostics) => ActionEvent::Finished { diagnostics },
                Err(e) => {
                    error!(action = %action_name, error = %e, "action failed");
                    ActionEvent::Error {
                        diagnostics: vec![e.to_diagnostic()],
                    }
                }
            };
            let finished = matches!(terminal, ActionEvent::Finished { .. });
            info!(action = %action_name, finished, "InvokeAction completed");
            // the host may have stopped listening
            let _ = tx.send(terminal).await;
            if !invocation_id.is_empty() {
                in_flight.lock().await.remove(&invocation_id);
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// Cancel an invocation. Unknown or finished ids are ignored.
    pub async fn cancel(&self, invocation_id: &str) {
        match self.in_flight.lock().await.get(invocation_id) {
            Some(token) => {
                info!(invocation_id, "cancelling action");
                token.cancel();
            }
            None => debug!(invocation_id, "cancel for unknown invocation ignored"),
        }
    }

    /// Cancel every in-flight invocation.
    pub async fn cancel_all(&self) {
        for token in self.in_flight.lock().await.values() {
            token.cancel();
        }
    }

    /// Number of invocations still running.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

impl Default for ActionEngine {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    struct Countdown;

    #[async_trait]
    impl Action for Countdown {
        fn schema(&self) -> ActionSchema {
            ActionSchema::new(Schema::v0().with_attribute("from", Attribute::required_number()))
                .with_linked_resource(LinkedResourceSchema::new("corner_user"))
        }

        async fn invoke(
            &self,
            _: &SessionContext,
            config: &Value,
            _: &[LinkedResource],
            progress: &ProgressSender,
        ) -> Result<Vec<Diagnostic>, ProviderError> {
            let from = config.get_attr("from").and_then(Value::as_number).unwrap_or_default();
            if from < 0.0 {
                return Err(ProviderError::Validation(
                    "cannot count down from below zero".to_string(),
                ));
            }
            if from > 100.0 {
                // wait to be cancelled
                std::future::pending::<()>().await;
            }
            for n in (1..=from as u64).rev() {
                progress.stdout(n.to_string()).await?;
            }
            Ok(vec![Diagnostic::warning("liftoff")])
        }
    }

    fn countdown() -> ActionType {
        ActionType::new("countdown", Arc::new(Countdown)).unwrap()
    }

    fn config(from: f64) -> Value {
        Value::object([("from", Value::number(from))])
    }

    fn ctx() -> SessionContext {
        SessionContext::new(CancellationToken::new())
    }

    #[tokio::test]
    async fn test_invoke_streams_progress_then_finished() {
        let engine = ActionEngine::new(1);
        let events: Vec<_> = engine
            .invoke(&countdown(), &ctx(), "inv-1", config(3.0), vec![])
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ActionEvent::Progress {
                stdout: vec!["3".to_string()],
                stderr: vec![]
            }
        );
        assert!(matches!(
            &events[3],
            ActionEvent::Finished { diagnostics } if diagnostics[0].summary == "liftoff"
        ));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_handler_error_ends_with_error_event() {
        let engine = ActionEngine::default();
        let events: Vec<_> = engine
            .invoke(&countdown(), &ctx(), "", config(-1.0), vec![])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ActionEvent::Error { diagnostics } if diagnostics[0].summary == "Invalid Configuration"
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_ends_with_error_event() {
        let engine = ActionEngine::default();
        let missing = Value::object([("from", Value::null(Type::Number))]);
        let events: Vec<_> = engine
            .invoke(&countdown(), &ctx(), "inv", missing, vec![])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
        assert_eq!(engine.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let engine = ActionEngine::default();
        let mut stream = engine
            .invoke(&countdown(), &ctx(), "slow", config(1000.0), vec![])
            .await
            .unwrap();
        assert_eq!(engine.in_flight().await, 1);

        engine.cancel("slow").await;
        engine.cancel("slow").await;
        engine.cancel("never-started").await;

        let event = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            &event,
            ActionEvent::Error { diagnostics } if diagnostics[0].summary == "Operation Cancelled"
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(engine.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_invocation_rejected() {
        let engine = ActionEngine::default();
        let _stream = engine
            .invoke(&countdown(), &ctx(), "dup", config(1000.0), vec![])
            .await
            .unwrap();
        let second = engine.invoke(&countdown(), &ctx(), "dup", config(1.0), vec![]).await;
        assert!(matches!(second, Err(ProviderError::InvalidRequest(_))));
        engine.cancel_all().await;
    }

    #[tokio::test]
    async fn test_plan_checks_linked_resources() {
        let engine = ActionEngine::default();
        let linked = |type_name: &str| LinkedResource {
            type_name: type_name.to_string(),
            prior_state: Value::null(Type::String),
            planned_state: Value::null(Type::String),
            config: Value::null(Type::String),
            prior_identity: None,
        };
        let diagnostics = engine
            .plan(&countdown(), &ctx(), &config(1.0), &[linked("corner_user")])
            .await
            .unwrap();
        assert!(diagnostics.is_empty());

        let diagnostics = engine
            .plan(&countdown(), &ctx(), &config(1.0), &[linked("corner_region")])
            .await
            .unwrap();
        assert_eq!(diagnostics[0].summary, "Invalid Linked Resource");
    }

    #[tokio::test]
    async fn test_validate_config_type_mismatch_is_protocol_error() {
        let engine = ActionEngine::default();
        let err = engine
            .validate_config(&countdown(), &ctx(), &Value::string("nope"))
            .await;
        tokio_test::assert_err!(err);
    }
}
