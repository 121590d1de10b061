//! Provider functions: stateless evaluators over scalar arguments.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::codec;
use crate::error::{ProviderError, SchemaError};
use crate::proto;
use crate::session::SessionContext;
use crate::value::{Type, Value};

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, used in error messages.
    pub name: String,
    /// Parameter type. Must be a primitive.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Whether null may be passed.
    #[serde(default)]
    pub allow_null: bool,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    /// A non-nullable parameter.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            allow_null: false,
            description: None,
        }
    }

    /// Accept null arguments.
    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The signature a function publishes in the provider schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Positional parameters.
    pub parameters: Vec<Parameter>,
    /// Trailing parameter that may repeat zero or more times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variadic_parameter: Option<Parameter>,
    /// Return type. Must be a primitive.
    pub return_type: Type,
    /// One-line summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FunctionSignature {
    /// A signature with no parameters.
    pub fn new(return_type: Type) -> Self {
        Self {
            parameters: Vec::new(),
            variadic_parameter: None,
            return_type,
            summary: None,
            description: None,
        }
    }

    /// Append a positional parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the variadic parameter.
    pub fn with_variadic_parameter(mut self, parameter: Parameter) -> Self {
        self.variadic_parameter = Some(parameter);
        self
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The parameter that receives argument `index`.
    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index).or(self.variadic_parameter.as_ref())
    }

    fn validate(&self, function: &str) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidSignature {
            function: function.to_string(),
            reason,
        };
        if !self.return_type.is_primitive() {
            return Err(invalid(format!("return type {} is not a primitive", self.return_type)));
        }
        let mut seen = std::collections::BTreeSet::new();
        for param in self.parameters.iter().chain(self.variadic_parameter.iter()) {
            if param.name.is_empty() {
                return Err(invalid("parameter names must not be empty".to_string()));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(invalid(format!("duplicate parameter \"{}\"", param.name)));
            }
            if !param.ty.is_primitive() {
                return Err(invalid(format!(
                    "parameter \"{}\" has type {}, which is not a primitive",
                    param.name, param.ty
                )));
            }
        }
        Ok(())
    }
}

/// A function failure, reported to the host as a function error rather than
/// a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionError {
    /// Human-readable message.
    pub text: String,
    /// Index of the argument at fault, if any.
    pub argument: Option<usize>,
}

impl FunctionError {
    /// An error not tied to an argument.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            argument: None,
        }
    }

    /// An error caused by argument `index`.
    pub fn argument(index: usize, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            argument: Some(index),
        }
    }
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument {
            Some(index) => write!(f, "argument {}: {}", index, self.text),
            None => f.write_str(&self.text),
        }
    }
}

impl std::error::Error for FunctionError {}

/// Trait implemented by every provider function.
#[async_trait]
pub trait Function: Send + Sync + 'static {
    /// The function signature.
    fn signature(&self) -> FunctionSignature;

    /// Evaluate the function. Arguments have already been checked against
    /// the signature.
    async fn call(&self, args: &[Value]) -> Result<Value, FunctionError>;
}

/// A function registration.
#[derive(Clone)]
pub struct FunctionType {
    pub(crate) name: String,
    pub(crate) signature: FunctionSignature,
    pub(crate) handler: Arc<dyn Function>,
}

impl FunctionType {
    /// Resolve and check a function's signature.
    pub fn new(name: impl Into<String>, handler: Arc<dyn Function>) -> Result<Self, SchemaError> {
        let name = name.into();
        let signature = handler.signature();
        signature.validate(&name)?;
        Ok(Self {
            name,
            signature,
            handler,
        })
    }

    /// The registered function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function signature.
    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }
}

/// Decode wire arguments against a signature.
pub fn decode_arguments(
    signature: &FunctionSignature,
    arguments: &[proto::DynamicValue],
) -> Result<Vec<Value>, FunctionError> {
    arguments
        .iter()
        .enumerate()
        .map(|(index, arg)| {
            let param = signature
                .parameter(index)
                .ok_or_else(|| too_many(signature, arguments.len()))?;
            codec::decode_dynamic(&param.ty, &arg.msgpack, &arg.json)
                .map_err(|err| FunctionError::argument(index, format!("invalid value: {}", err)))
        })
        .collect()
}

fn too_many(signature: &FunctionSignature, got: usize) -> FunctionError {
    FunctionError::new(format!(
        "expected {} arguments, got {}",
        signature.parameters.len(),
        got
    ))
}

fn check_arguments(signature: &FunctionSignature, args: &[Value]) -> Result<(), FunctionError> {
    let expected = signature.parameters.len();
    if args.len() < expected || (args.len() > expected && signature.variadic_parameter.is_none()) {
        return Err(if signature.variadic_parameter.is_some() {
            FunctionError::new(format!(
                "expected at least {} arguments, got {}",
                expected,
                args.len()
            ))
        } else {
            too_many(signature, args.len())
        });
    }
    for (index, arg) in args.iter().enumerate() {
        let Some(param) = signature.parameter(index) else {
            return Err(too_many(signature, args.len()));
        };
        if arg.is_unknown() {
            return Err(FunctionError::argument(
                index,
                format!("\"{}\" must be known", param.name),
            ));
        }
        if arg.is_null() && !param.allow_null {
            return Err(FunctionError::argument(
                index,
                format!("\"{}\" must not be null", param.name),
            ));
        }
        arg.check_type(&param.ty, &param.name)
            .map_err(|err| FunctionError::argument(index, err.to_string()))?;
    }
    Ok(())
}

/// Call a function with decoded arguments.
///
/// Argument problems come back as `Ok(Err(FunctionError))`. A result that
/// does not match the declared return type is a provider bug and fails
/// with [`ProviderError::SchemaMismatch`].
#[instrument(
    skip(function, ctx, args),
    fields(function = %function.name, args = args.len()),
    name = "core.call_function"
)]
pub async fn call_function(
    function: &FunctionType,
    ctx: &SessionContext,
    args: &[Value],
) -> Result<Result<Value, FunctionError>, ProviderError> {
    if let Err(err) = check_arguments(&function.signature, args) {
        warn!(error = %err, "function arguments rejected");
        return Ok(Err(err));
    }

    let result = ctx.run(async { Ok(function.handler.call(args).await) }).await?;
    match result {
        Ok(value) => {
            value
                .check_type(&function.signature.return_type, "")
                .map_err(|err| {
                    ProviderError::SchemaMismatch(format!(
                        "function \"{}\" returned {}",
                        function.name, err
                    ))
                })?;
            debug!("CallFunction completed");
            Ok(Ok(value))
        }
        Err(err) => {
            warn!(error = %err, "function returned an error");
            Ok(Err(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CancellationToken;

    struct Join;

    #[async_trait]
    impl Function for Join {
        fn signature(&self) -> FunctionSignature {
            FunctionSignature::new(Type::String)
                .with_parameter(Parameter::new("separator", Type::String))
                .with_variadic_parameter(Parameter::new("parts", Type::String).allow_null())
        }

        async fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
            let separator = args[0].as_str().unwrap_or_default();
            let parts: Vec<&str> = args[1..].iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                return Err(FunctionError::argument(1, "nothing to join"));
            }
            Ok(Value::string(parts.join(separator)))
        }
    }

    struct Liar;

    #[async_trait]
    impl Function for Liar {
        fn signature(&self) -> FunctionSignature {
            FunctionSignature::new(Type::Bool)
        }

        async fn call(&self, _: &[Value]) -> Result<Value, FunctionError> {
            Ok(Value::string("not a bool"))
        }
    }

    fn ctx() -> SessionContext {
        SessionContext::new(CancellationToken::new())
    }

    fn join() -> FunctionType {
        FunctionType::new("join", Arc::new(Join)).unwrap()
    }

    #[tokio::test]
    async fn test_call_with_variadic() {
        let args = vec![
            Value::string("-"),
            Value::string("a"),
            Value::null(Type::String),
            Value::string("b"),
        ];
        let result = call_function(&join(), &ctx(), &args).await.unwrap();
        assert_eq!(result, Ok(Value::string("a-b")));
    }

    #[tokio::test]
    async fn test_argument_errors_carry_index() {
        let f = join();
        let result = call_function(&f, &ctx(), &[]).await.unwrap();
        assert_eq!(result.unwrap_err().argument, None);

        let result = call_function(&f, &ctx(), &[Value::null(Type::String)]).await.unwrap();
        assert_eq!(result.unwrap_err().argument, Some(0));

        let result = call_function(&f, &ctx(), &[Value::string("-"), Value::number(1.0)])
            .await
            .unwrap();
        assert_eq!(result.unwrap_err().argument, Some(1));

        let result = call_function(&f, &ctx(), &[Value::string("-"), Value::unknown(Type::String)])
            .await
            .unwrap();
        assert_eq!(result.unwrap_err().argument, Some(1));

        let result = call_function(&f, &ctx(), &[Value::string("-")]).await.unwrap();
        assert_eq!(result, Err(FunctionError::argument(1, "nothing to join")));
    }

    #[tokio::test]
    async fn test_wrong_return_type_is_protocol_error() {
        let liar = FunctionType::new("liar", Arc::new(Liar)).unwrap();
        let err = call_function(&liar, &ctx(), &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::SchemaMismatch(_)));
    }

    #[test]
    fn test_non_primitive_signature_rejected() {
        struct Listy;

        #[async_trait]
        impl Function for Listy {
            fn signature(&self) -> FunctionSignature {
                FunctionSignature::new(Type::String)
                    .with_parameter(Parameter::new("xs", Type::list(Type::String)))
            }

            async fn call(&self, _: &[Value]) -> Result<Value, FunctionError> {
                Ok(Value::string(""))
            }
        }

        assert!(matches!(
            FunctionType::new("listy", Arc::new(Listy)),
            Err(SchemaError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_decode_arguments() {
        let f = join();
        let args = vec![
            proto::DynamicValue {
                msgpack: codec::encode(&Value::string(","), &Type::String).unwrap(),
                json: Vec::new(),
            },
            proto::DynamicValue {
                msgpack: Vec::new(),
                json: b"\"x\"".to_vec(),
            },
        ];
        let decoded = decode_arguments(f.signature(), &args).unwrap();
        assert_eq!(decoded, vec![Value::string(","), Value::string("x")]);

        let bad = vec![proto::DynamicValue {
            msgpack: vec![0xc1],
            json: Vec::new(),
        }];
        assert_eq!(decode_arguments(f.signature(), &bad).unwrap_err().argument, Some(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(FunctionError::argument(2, "bad").to_string(), "argument 2: bad");
        assert_eq!(FunctionError::new("boom").to_string(), "boom");
    }
}
