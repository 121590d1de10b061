//! Error types for the provider server core.
//!
//! Errors come in three tiers:
//!
//! - Handler-detected failures are returned as [`ProviderError`] and turned
//!   into error [`Diagnostic`]s on the operation's response.
//! - Structural failures (unknown type names, undecodable values) are
//!   protocol errors and travel on the RPC error channel as [`tonic::Status`].
//! - Invalid registrations are rejected when the server is built.

use thiserror::Error;

use crate::schema::Diagnostic;
use crate::store::StoreError;

/// Errors raised while constructing, encoding or decoding a [`crate::value::Value`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// The payload does not match the declared type.
    #[error("{path}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Attribute path where the mismatch occurred.
        path: String,
        /// Human-readable expected type.
        expected: String,
        /// Description of what was found instead.
        actual: String,
    },

    /// An object payload is missing an attribute its type declares.
    #[error("{path}: missing attribute \"{attribute}\"")]
    MissingAttribute {
        /// Path of the object.
        path: String,
        /// Name of the missing attribute.
        attribute: String,
    },

    /// An object payload carries an attribute its type does not declare.
    #[error("{path}: unsupported attribute \"{attribute}\"")]
    UnexpectedAttribute {
        /// Path of the object.
        path: String,
        /// Name of the extra attribute.
        attribute: String,
    },

    /// A tuple payload has the wrong number of elements.
    #[error("{path}: expected {expected} tuple elements, got {actual}")]
    TupleLength {
        /// Path of the tuple.
        path: String,
        /// Declared element count.
        expected: usize,
        /// Element count found.
        actual: usize,
    },

    /// An unknown value was found where only known values can be represented.
    #[error("{path}: value is unknown")]
    Unknown {
        /// Path of the unknown value.
        path: String,
    },

    /// The wire bytes could not be parsed.
    #[error("malformed encoding: {0}")]
    Malformed(String),

    /// The value could not be written to the wire.
    #[error("encoding failed: {0}")]
    Encode(String),

    /// A type descriptor could not be parsed.
    #[error("invalid type descriptor: {0}")]
    InvalidType(String),
}

/// Errors found while checking a schema for self-consistency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The same name is used by an attribute and a nested block.
    #[error("duplicate name \"{0}\"")]
    DuplicateName(String),

    /// The attribute's required/optional/computed flags are not a legal combination.
    #[error("attribute \"{name}\": {reason}")]
    InvalidFlags {
        /// Attribute path.
        name: String,
        /// Which rule was broken.
        reason: String,
    },

    /// A function signature uses a non-scalar type.
    #[error("function \"{function}\": {reason}")]
    InvalidSignature {
        /// Function name.
        function: String,
        /// Which rule was broken.
        reason: String,
    },

    /// The same type name was registered twice.
    #[error("{kind} \"{name}\" is already registered")]
    DuplicateRegistration {
        /// Registration kind, e.g. "resource".
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// Upgraders do not cover every prior version.
    #[error("{type_name}: missing upgrader for version {version}")]
    MissingUpgrader {
        /// Resource type name.
        type_name: String,
        /// Version with no upgrader.
        version: u64,
    },
}

/// Errors that can occur when implementing or driving a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No resource or data source is registered under this name.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// No function is registered under this name.
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    /// No action is registered under this name.
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// A value on the wire did not match its declared type.
    #[error("Value decode error: {0}")]
    ValueDecode(#[from] ValueError),

    /// A value produced by a handler does not match the schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A registration is invalid.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The requested record was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A record with the same key already exists.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The operation was cancelled by the host or by shutdown.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A JSON payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not implemented by this handler.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Get the error message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::UnsupportedType(msg)
            | Self::UnsupportedFunction(msg)
            | Self::UnsupportedAction(msg)
            | Self::SchemaMismatch(msg)
            | Self::NotFound(msg)
            | Self::AlreadyExists(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::Cancelled(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::ValueDecode(err) => err.to_string(),
            Self::Schema(err) => err.to_string(),
            Self::Store(err) => err.to_string(),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// The short, categorical summary used when this error becomes a diagnostic.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "Unsupported Type",
            Self::UnsupportedFunction(_) => "Unsupported Function",
            Self::UnsupportedAction(_) => "Unsupported Action",
            Self::ValueDecode(_) => "Invalid Value",
            Self::SchemaMismatch(_) => "Invalid Provider Response",
            Self::Schema(_) => "Invalid Schema",
            Self::NotFound(_) => "Resource Not Found",
            Self::AlreadyExists(_) => "Resource Already Exists",
            Self::Validation(_) => "Invalid Configuration",
            Self::Configuration(_) => "Provider Configuration Error",
            Self::Store(StoreError::Duplicate { .. }) => "Resource Already Exists",
            Self::Store(_) => "Store Error",
            Self::Cancelled(_) => "Operation Cancelled",
            Self::Serialization(_) => "Serialization Error",
            Self::Unimplemented(_) => "Unsupported Operation",
            Self::InvalidRequest(_) => "Invalid Request",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Convert this error into an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.summary()).with_detail(self.message())
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UnsupportedType(msg)
            | ProviderError::UnsupportedFunction(msg)
            | ProviderError::UnsupportedAction(msg) => tonic::Status::unimplemented(msg),
            ProviderError::ValueDecode(err) => tonic::Status::invalid_argument(err.to_string()),
            ProviderError::SchemaMismatch(msg) => tonic::Status::internal(msg),
            ProviderError::Schema(err) => tonic::Status::internal(err.to_string()),
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Store(err) => tonic::Status::unavailable(err.to_string()),
            ProviderError::Cancelled(msg) => tonic::Status::cancelled(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            }
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Internal(msg) => tonic::Status::internal(msg),
        }
    }
}
