//! Provider functions.

use async_trait::async_trait;

use crate::function::{Function, FunctionError, FunctionSignature, Parameter};
use crate::value::{Type, Value};

fn echo_signature(ty: Type) -> FunctionSignature {
    FunctionSignature::new(ty.clone())
        .with_parameter(Parameter::new("input", ty))
        .with_summary("Returns its argument unchanged")
}

fn first(args: &[Value]) -> Result<Value, FunctionError> {
    args.first()
        .cloned()
        .ok_or_else(|| FunctionError::new("expected one argument"))
}

/// `bool(input)`: echo a bool.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolFunction;

#[async_trait]
impl Function for BoolFunction {
    fn signature(&self) -> FunctionSignature {
        echo_signature(Type::Bool)
    }

    async fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        first(args)
    }
}

/// `number(input)`: echo a number.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberFunction;

#[async_trait]
impl Function for NumberFunction {
    fn signature(&self) -> FunctionSignature {
        echo_signature(Type::Number)
    }

    async fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        first(args)
    }
}

/// `string(input)`: echo a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringFunction;

#[async_trait]
impl Function for StringFunction {
    fn signature(&self) -> FunctionSignature {
        echo_signature(Type::String)
    }

    async fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        first(args)
    }
}

/// `email_domain(email)`: the part of an email address after the `@`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailDomainFunction;

#[async_trait]
impl Function for EmailDomainFunction {
    fn signature(&self) -> FunctionSignature {
        FunctionSignature::new(Type::String)
            .with_parameter(
                Parameter::new("email", Type::String).with_description("An email address"),
            )
            .with_summary("Extracts the domain of an email address")
    }

    async fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        let email = args.first().and_then(Value::as_str).unwrap_or_default();
        match email.split_once('@') {
            Some((_, domain)) if !domain.is_empty() => Ok(Value::string(domain)),
            _ => Err(FunctionError::argument(
                0,
                format!("\"{}\" is not an email address", email),
            )),
        }
    }
}
