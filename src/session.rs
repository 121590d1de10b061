//! Per-call context handed to every handler.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ProviderError;
use crate::store::{ReadTxn, Store, WriteTxn};
use crate::types::ClientCapabilities;
use crate::value::Value;

/// A cloneable, one-shot cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the token, waking every waiter. Cancelling twice is a no-op.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as `self`, so this only returns once cancelled
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Session state shared by every handler call between configure and stop.
#[derive(Clone)]
pub struct SessionContext {
    store: Option<Arc<dyn Store>>,
    provider_config: Option<Value>,
    client_capabilities: ClientCapabilities,
    deferral_requested: bool,
    stop: CancellationToken,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl SessionContext {
    pub(crate) fn new(stop: CancellationToken) -> Self {
        Self {
            store: None,
            provider_config: None,
            client_capabilities: ClientCapabilities::default(),
            deferral_requested: false,
            stop,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context for driving handlers directly, with the given store attached.
    pub fn detached(store: Arc<dyn Store>) -> Self {
        Self::new(CancellationToken::new()).with_store(store)
    }

    pub(crate) fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub(crate) fn with_provider_config(mut self, config: Value) -> Self {
        self.provider_config = Some(config);
        self
    }

    pub(crate) fn with_client_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.client_capabilities = capabilities;
        self
    }

    pub(crate) fn with_deferral_requested(mut self, requested: bool) -> Self {
        self.deferral_requested = requested;
        self
    }

    pub(crate) fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The store handle acquired during configure.
    pub fn store(&self) -> Result<&Arc<dyn Store>, ProviderError> {
        self.store
            .as_ref()
            .ok_or_else(|| {
                ProviderError::Configuration("provider has not been configured".to_string())
            })
    }

    /// The provider configuration installed by configure.
    pub fn provider_config(&self) -> Option<&Value> {
        self.provider_config.as_ref()
    }

    /// Capabilities the host declared for this call.
    pub fn client_capabilities(&self) -> ClientCapabilities {
        self.client_capabilities
    }

    /// Whether configure asked for every operation to be deferred.
    pub fn deferral_requested(&self) -> bool {
        self.deferral_requested
    }

    /// Whether this call was cancelled, or the server stopped.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.stop.is_cancelled()
    }

    /// Wait until this call is cancelled or the server stops.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.stop.cancelled() => {}
        }
    }

    /// Fail with [`ProviderError::Cancelled`] if the call was cancelled.
    pub fn check_cancelled(&self) -> Result<(), ProviderError> {
        if self.is_cancelled() {
            Err(ProviderError::Cancelled("operation cancelled".to_string()))
        } else {
            Ok(())
        }
    }

    /// Run `fut` until it completes, the call is cancelled, or the deadline passes.
    ///
    /// On cancellation `fut` is dropped, which aborts any write transaction it holds.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            result = fut => result,
            _ = self.cancelled() => {
                Err(ProviderError::Cancelled("operation cancelled".to_string()))
            }
            _ = deadline => Err(ProviderError::Cancelled("handler deadline exceeded".to_string())),
        }
    }

    /// Begin a read transaction on the session store.
    pub async fn read_txn(&self) -> Result<Box<dyn ReadTxn>, ProviderError> {
        let store = self.store()?;
        Ok(store.begin_read().await?)
    }

    /// Begin a write transaction, giving up if the call is cancelled while waiting.
    pub async fn write_txn(&self) -> Result<Box<dyn WriteTxn>, ProviderError> {
        let store = self.store()?;
        tokio::select! {
            txn = store.begin_write() => Ok(txn?),
            _ = self.cancelled() => {
                Err(ProviderError::Cancelled("operation cancelled".to_string()))
            }
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("configured", &self.store.is_some())
            .field("client_capabilities", &self.client_capabilities)
            .field("deferral_requested", &self.deferral_requested)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
