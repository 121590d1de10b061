//! Typed dynamic values exchanged with the host.
//!
//! A [`Value`] is a sealed sum over the [`Type`] algebra plus null and
//! unknown. Collections carry their element type so that empty collections
//! and nulls remain fully typed; objects and tuples derive their type from
//! their members.
//!
//! # Example
//!
//! ```
//! use corner_provider::value::{Type, Value};
//! use serde_json::json;
//!
//! let ty = Type::object([("name", Type::String), ("age", Type::Number)]);
//! let value = Value::from_json(&ty, &json!({"name": "Ford Prefect", "age": 200})).unwrap();
//!
//! assert_eq!(value.get_attr("name").and_then(|v| v.as_str()), Some("Ford Prefect"));
//! assert!(value.is_fully_known());
//! assert_eq!(value.ty(), ty);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::error::ValueError;
use crate::refinement::Refinements;

/// The type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A boolean.
    Bool,
    /// An arbitrary number.
    Number,
    /// A UTF-8 string.
    String,
    /// An ordered sequence of elements of one type.
    List(Box<Type>),
    /// An unordered collection of unique elements of one type.
    Set(Box<Type>),
    /// A string-keyed map of elements of one type.
    Map(Box<Type>),
    /// A fixed-length sequence of elements with individual types.
    Tuple(Vec<Type>),
    /// A fixed set of named attributes with individual types.
    Object(BTreeMap<String, Type>),
}

impl Type {
    /// Create a list type.
    pub fn list(element: Type) -> Self {
        Self::List(Box::new(element))
    }

    /// Create a set type.
    pub fn set(element: Type) -> Self {
        Self::Set(Box::new(element))
    }

    /// Create a map type.
    pub fn map(element: Type) -> Self {
        Self::Map(Box::new(element))
    }

    /// Create a tuple type.
    pub fn tuple(elements: impl IntoIterator<Item = Type>) -> Self {
        Self::Tuple(elements.into_iter().collect())
    }

    /// Create an object type from `(name, type)` pairs.
    pub fn object<K: Into<String>>(attributes: impl IntoIterator<Item = (K, Type)>) -> Self {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Whether this is a bool, number or string type.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Bool | Self::Number | Self::String)
    }

    /// Whether this is a list, set or map type.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map(_))
    }

    /// The element type of a list, set or map.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Self::List(el) | Self::Set(el) | Self::Map(el) => Some(el),
            _ => None,
        }
    }

    /// The attribute types of an object type.
    pub fn attribute_types(&self) -> Option<&BTreeMap<String, Type>> {
        match self {
            Self::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Encode as a JSON type descriptor: `"string"`, `["list","number"]`,
    /// `["object",{"name":"string"}]`.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool => Json::from("bool"),
            Self::Number => Json::from("number"),
            Self::String => Json::from("string"),
            Self::List(el) => Json::Array(vec![Json::from("list"), el.to_json()]),
            Self::Set(el) => Json::Array(vec![Json::from("set"), el.to_json()]),
            Self::Map(el) => Json::Array(vec![Json::from("map"), el.to_json()]),
            Self::Tuple(els) => Json::Array(vec![
                Json::from("tuple"),
                Json::Array(els.iter().map(Type::to_json).collect()),
            ]),
            Self::Object(attrs) => Json::Array(vec![
                Json::from("object"),
                Json::Object(
                    attrs
                        .iter()
                        .map(|(name, ty)| (name.clone(), ty.to_json()))
                        .collect(),
                ),
            ]),
        }
    }

    /// Parse a JSON type descriptor.
    pub fn from_json(json: &Json) -> Result<Self, ValueError> {
        match json {
            Json::String(name) => match name.as_str() {
                "bool" => Ok(Self::Bool),
                "number" => Ok(Self::Number),
                "string" => Ok(Self::String),
                other => Err(ValueError::InvalidType(format!(
                    "unknown primitive type \"{}\"",
                    other
                ))),
            }
            Json::Array(parts) if parts.len() == 2 => {
                let kind = parts[0]
                    .as_str()
                    .ok_or_else(|| ValueError::InvalidType("type kind must be a string".into()))?;
                match kind {
                    "list" => Ok(Self::list(Self::from_json(&parts[1])?)),
                    "set" => Ok(Self::set(Self::from_json(&parts[1])?)),
                    "map" => Ok(Self::map(Self::from_json(&parts[1])?)),
                    "tuple" => {
                        let els = parts[1].as_array().ok_or_else(|| {
                            ValueError::InvalidType("tuple elements must be an array".into())
                        })?;
                        Ok(Self::Tuple(
                            els.iter().map(Self::from_json).collect::<Result<_, _>>()?,
                        ))
                    }
                    "object" => {
                        let attrs = parts[1].as_object().ok_or_else(|| {
                            ValueError::InvalidType("object attributes must be an object".into())
                        })?;
                        let mut out = BTreeMap::new();
                        for (name, ty) in attrs {
                            out.insert(name.clone(), Self::from_json(ty)?);
                        }
                        Ok(Self::Object(out))
                    }
                    other => Err(ValueError::InvalidType(format!(
                        "unknown type kind \"{}\"",
                        other
                    ))),
                }
            }
            other => Err(ValueError::InvalidType(format!("unexpected {}", other))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::List(el) => write!(f, "list({})", el),
            Self::Set(el) => write!(f, "set({})", el),
            Self::Map(el) => write!(f, "map({})", el),
            Self::Tuple(els) => {
                write!(f, "tuple([")?;
                for (i, el) in els.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", el)?;
                }
                write!(f, "])")
            }
            Self::Object(attrs) => {
                write!(f, "object({{")?;
                for (i, (name, ty)) in attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", name, ty)?;
                }
                write!(f, "}})")
            }
        }
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Type::from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// A typed dynamic value.
///
/// Equality is structural, except that set members compare regardless of order.
#[derive(Debug, Clone)]
pub enum Value {
    /// A null of the given type.
    Null(Type),
    /// A value not known until apply, optionally narrowed by refinements.
    Unknown(Type, Refinements),
    /// A known boolean.
    Bool(bool),
    /// A known number.
    Number(f64),
    /// A known string.
    String(String),
    /// A list with its element type.
    List(Type, Vec<Value>),
    /// A set with its element type. Elements are unique.
    Set(Type, Vec<Value>),
    /// A map with its element type.
    Map(Type, BTreeMap<String, Value>),
    /// A tuple.
    Tuple(Vec<Value>),
    /// An object.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// A null of the given type.
    pub fn null(ty: Type) -> Self {
        Self::Null(ty)
    }

    /// An unknown of the given type with no refinements.
    pub fn unknown(ty: Type) -> Self {
        Self::Unknown(ty, Refinements::default())
    }

    /// An unknown of the given type, keeping only refinements that apply to it.
    pub fn unknown_refined(ty: Type, refinements: Refinements) -> Self {
        let refinements = refinements.restricted_to(&ty);
        Self::Unknown(ty, refinements)
    }

    /// A known string.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// A known number.
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// A known bool.
    pub fn bool(b: bool) -> Self {
        Self::Bool(b)
    }

    /// A list; every element must conform to `element`.
    pub fn list(element: Type, items: Vec<Value>) -> Result<Self, ValueError> {
        check_elements(&element, &items, "list")?;
        Ok(Self::List(element, items))
    }

    /// A set; every element must conform to `element`. Duplicates are dropped.
    pub fn set(element: Type, items: Vec<Value>) -> Result<Self, ValueError> {
        check_elements(&element, &items, "set")?;
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Ok(Self::Set(element, unique))
    }

    /// A map; every element must conform to `element`.
    pub fn map(element: Type, items: BTreeMap<String, Value>) -> Result<Self, ValueError> {
        for (key, item) in &items {
            item.check_type(&element, key)?;
        }
        Ok(Self::Map(element, items))
    }

    /// A tuple.
    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Tuple(items)
    }

    /// An object from `(name, value)` pairs.
    pub fn object<K: Into<String>>(attributes: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, v)| (name.into(), v))
                .collect(),
        )
    }

    /// The type of this value.
    pub fn ty(&self) -> Type {
        match self {
            Self::Null(ty) | Self::Unknown(ty, _) => ty.clone(),
            Self::Bool(_) => Type::Bool,
            Self::Number(_) => Type::Number,
            Self::String(_) => Type::String,
            Self::List(el, _) => Type::list(el.clone()),
            Self::Set(el, _) => Type::set(el.clone()),
            Self::Map(el, _) => Type::map(el.clone()),
            Self::Tuple(items) => Type::Tuple(items.iter().map(Value::ty).collect()),
            Self::Object(attrs) => Type::Object(
                attrs
                    .iter()
                    .map(|(name, v)| (name.clone(), v.ty()))
                    .collect(),
            ),
        }
    }

    /// Whether this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Whether this value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(..))
    }

    /// Whether this value is known at the top level. Members may still be unknown.
    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    /// Whether this value and every nested member are known.
    pub fn is_fully_known(&self) -> bool {
        match self {
            Self::Unknown(..) => false,
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => {
                items.iter().all(Value::is_fully_known)
            }
            Self::Map(_, items) | Self::Object(items) => items.values().all(Value::is_fully_known),
            _ => true,
        }
    }

    /// The refinements of an unknown value.
    pub fn refinements(&self) -> Option<&Refinements> {
        match self {
            Self::Unknown(_, refinements) => Some(refinements),
            _ => None,
        }
    }

    /// The attributes of a known object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Mutable attributes of a known object.
    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Self::Object(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// The entries of a known map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(_, items) => Some(items),
            _ => None,
        }
    }

    /// The elements of a known list, set or tuple.
    pub fn as_elements(&self) -> Option<&[Value]> {
        match self {
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// A known string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// A known number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// A known bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The length of a known collection, tuple or string.
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => Some(items.len()),
            Self::Map(_, items) => Some(items.len()),
            Self::String(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Look up an attribute of a known object.
    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|attrs| attrs.get(name))
    }

    /// Replace an attribute of a known object, returning the updated object.
    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        if let Some(attrs) = self.as_object_mut() {
            attrs.insert(name.into(), value);
        }
        self
    }

    /// Whether this value has exactly the given type.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        self.check_type(ty, "").is_ok()
    }

    /// Check that this value has exactly the given type.
    pub fn check_type(&self, ty: &Type, path: &str) -> Result<(), ValueError> {
        match (self, ty) {
            (Self::Null(actual), _) | (Self::Unknown(actual, _), _) => {
                if actual == ty {
                    Ok(())
                } else {
                    Err(mismatch(path, ty, actual.to_string()))
                }
            }
            (Self::Bool(_), Type::Bool)
            | (Self::Number(_), Type::Number)
            | (Self::String(_), Type::String) => Ok(()),
            (Self::List(el, items), Type::List(want))
            | (Self::Set(el, items), Type::Set(want)) => {
                if el != want.as_ref() {
                    return Err(mismatch(path, ty, self.ty().to_string()));
                }
                for (i, item) in items.iter().enumerate() {
                    item.check_type(want, &child_path(path, &i.to_string()))?;
                }
                Ok(())
            }
            (Self::Map(el, items), Type::Map(want)) => {
                if el != want.as_ref() {
                    return Err(mismatch(path, ty, self.ty().to_string()));
                }
                for (key, item) in items {
                    item.check_type(want, &child_path(path, key))?;
                }
                Ok(())
            }
            (Self::Tuple(items), Type::Tuple(want)) => {
                if items.len() != want.len() {
                    return Err(ValueError::TupleLength {
                        path: path.to_string(),
                        expected: want.len(),
                        actual: items.len(),
                    });
                }
                for (i, (item, want)) in items.iter().zip(want).enumerate() {
                    item.check_type(want, &child_path(path, &i.to_string()))?;
                }
                Ok(())
            }
            (Self::Object(attrs), Type::Object(want)) => {
                for name in attrs.keys() {
                    if !want.contains_key(name) {
                        return Err(ValueError::UnexpectedAttribute {
                            path: path.to_string(),
                            attribute: name.clone(),
                        });
                    }
                }
                for (name, want) in want {
                    match attrs.get(name) {
                        Some(v) => v.check_type(want, &child_path(path, name))?,
                        None => {
                            return Err(ValueError::MissingAttribute {
                                path: path.to_string(),
                                attribute: name.clone(),
                            })
                        }
                    }
                }
                Ok(())
            }
            _ => Err(mismatch(path, ty, self.ty().to_string())),
        }
    }

    /// Decode a JSON payload under `ty`.
    ///
    /// Object attributes absent from the payload become null; attributes the
    /// type does not declare are rejected.
    pub fn from_json(ty: &Type, json: &Json) -> Result<Self, ValueError> {
        decode_json(ty, json, "", false)
    }

    /// Decode a JSON payload under `ty`, dropping undeclared object attributes
    /// and converting primitives where the conversion is lossless.
    pub fn from_json_permissive(ty: &Type, json: &Json) -> Result<Self, ValueError> {
        decode_json(ty, json, "", true)
    }

    /// Encode a fully known value as JSON. Unknown members are rejected.
    pub fn to_json(&self) -> Result<Json, ValueError> {
        encode_json(self, "")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null(a), Self::Null(b)) => a == b,
            (Self::Unknown(a, ra), Self::Unknown(b, rb)) => a == b && ra == rb,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a, xs), Self::List(b, ys)) => a == b && xs == ys,
            (Self::Set(a, xs), Self::Set(b, ys)) => {
                a == b
                    && xs.len() == ys.len()
                    && xs.iter().all(|x| ys.contains(x))
                    && ys.iter().all(|y| xs.contains(y))
            }
            (Self::Map(a, xs), Self::Map(b, ys)) => a == b && xs == ys,
            (Self::Tuple(xs), Self::Tuple(ys)) => xs == ys,
            (Self::Object(xs), Self::Object(ys)) => xs == ys,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => write!(f, "null"),
            Self::Unknown(..) => write!(f, "(known after apply)"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Map(_, items) | Self::Object(items) => {
                write!(f, "{{")?;
                for (i, (key, item)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", key, item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Join an attribute path segment onto a dotted path.
pub(crate) fn child_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn mismatch(path: &str, expected: &Type, actual: impl Into<String>) -> ValueError {
    ValueError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: actual.into(),
    }
}

fn check_elements(element: &Type, items: &[Value], kind: &str) -> Result<(), ValueError> {
    for (i, item) in items.iter().enumerate() {
        item.check_type(element, &format!("{}[{}]", kind, i))?;
    }
    Ok(())
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn decode_json(ty: &Type, json: &Json, path: &str, permissive: bool) -> Result<Value, ValueError> {
    if json.is_null() {
        return Ok(Value::Null(ty.clone()));
    }
    match ty {
        Type::Bool => match json {
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) if permissive => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch(path, ty, format!("string {:?}", s))),
            }
            other => Err(mismatch(path, ty, json_kind(other))),
        }
        Type::Number => match json {
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| mismatch(path, ty, "out-of-range number")),
            Json::String(s) if permissive => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| mismatch(path, ty, format!("string {:?}", s))),
            other => Err(mismatch(path, ty, json_kind(other))),
        }
        Type::String => match json {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) if permissive => Ok(Value::String(n.to_string())),
            Json::Bool(b) if permissive => Ok(Value::String(b.to_string())),
            other => Err(mismatch(path, ty, json_kind(other))),
        }
        Type::List(el) | Type::Set(el) => {
            let items = json
                .as_array()
                .ok_or_else(|| mismatch(path, ty, json_kind(json)))?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(decode_json(el, item, &child_path(path, &i.to_string()), permissive)?);
            }
            if matches!(ty, Type::Set(_)) {
                Value::set(el.as_ref().clone(), out)
            } else {
                Ok(Value::List(el.as_ref().clone(), out))
            }
        }
        Type::Map(el) => {
            let items = json
                .as_object()
                .ok_or_else(|| mismatch(path, ty, json_kind(json)))?;
            let mut out = BTreeMap::new();
            for (key, item) in items {
                out.insert(key.clone(), decode_json(el, item, &child_path(path, key), permissive)?);
            }
            Ok(Value::Map(el.as_ref().clone(), out))
        }
        Type::Tuple(els) => {
            let items = json
                .as_array()
                .ok_or_else(|| mismatch(path, ty, json_kind(json)))?;
            if items.len() != els.len() {
                return Err(ValueError::TupleLength {
                    path: path.to_string(),
                    expected: els.len(),
                    actual: items.len(),
                });
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, (el, item)) in els.iter().zip(items).enumerate() {
                out.push(decode_json(el, item, &child_path(path, &i.to_string()), permissive)?);
            }
            Ok(Value::Tuple(out))
        }
        Type::Object(attrs) => {
            let obj = json
                .as_object()
                .ok_or_else(|| mismatch(path, ty, json_kind(json)))?;
            if !permissive {
                if let Some(extra) = obj.keys().find(|k| !attrs.contains_key(*k)) {
                    return Err(ValueError::UnexpectedAttribute {
                        path: path.to_string(),
                        attribute: extra.clone(),
                    });
                }
            }
            let mut out = BTreeMap::new();
            for (name, attr_ty) in attrs {
                let v = match obj.get(name) {
                    Some(item) => decode_json(attr_ty, item, &child_path(path, name), permissive)?,
                    None => Value::Null(attr_ty.clone()),
                };
                out.insert(name.clone(), v);
            }
            Ok(Value::Object(out))
        }
    }
}

fn encode_json(value: &Value, path: &str) -> Result<Json, ValueError> {
    Ok(match value {
        Value::Null(_) => Json::Null,
        Value::Unknown(..) => {
            return Err(ValueError::Unknown {
                path: path.to_string(),
            })
        }
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_to_json(*n).ok_or_else(|| ValueError::Encode(format!(
            "{}: {} is not representable in JSON",
            path, n
        )))?,
        Value::String(s) => Json::String(s.clone()),
        Value::List(_, items) | Value::Set(_, items) | Value::Tuple(items) => Json::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| encode_json(item, &child_path(path, &i.to_string())))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(_, items) | Value::Object(items) => {
            let mut out = serde_json::Map::new();
            for (key, item) in items {
                out.insert(key.clone(), encode_json(item, &child_path(path, key))?);
            }
            Json::Object(out)
        }
    })
}

/// Integral numbers within `i64` range are written as integers.
pub(crate) fn number_to_json(n: f64) -> Option<Json> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(Json::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Json::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_type() -> Type {
        Type::object([
            ("email", Type::String),
            ("name", Type::String),
            ("age", Type::Number),
        ])
    }

    #[test]
    fn test_type_descriptor_round_trip() {
        let ty = Type::object([
            ("tags", Type::map(Type::String)),
            ("ports", Type::list(Type::Number)),
            ("pair", Type::tuple([Type::Bool, Type::set(Type::String)])),
        ]);
        let json = ty.to_json();
        assert_eq!(json[0], "object");
        assert_eq!(json[1]["tags"], json!(["map", "string"]));
        assert_eq!(Type::from_json(&json).unwrap(), ty);
    }

    #[test]
    fn test_type_descriptor_rejects_garbage() {
        assert!(Type::from_json(&json!("float")).is_err());
        assert!(Type::from_json(&json!(["list"])).is_err());
        assert!(Type::from_json(&json!(["vector", "string"])).is_err());
    }

    #[test]
    fn test_type_display() {
        assert_eq!(Type::list(Type::String).to_string(), "list(string)");
        assert_eq!(
            Type::object([("a", Type::Bool), ("b", Type::Number)]).to_string(),
            "object({a=bool, b=number})"
        );
    }

    #[test]
    fn test_from_json_fills_missing_attributes_with_null() {
        let v = Value::from_json(&user_type(), &json!({"email": "ford@prefect.co"})).unwrap();
        assert_eq!(v.get_attr("email").unwrap().as_str(), Some("ford@prefect.co"));
        assert_eq!(v.get_attr("age"), Some(&Value::Null(Type::Number)));
        assert_eq!(v.ty(), user_type());
    }

    #[test]
    fn test_from_json_strict_rejects_extra_attributes() {
        let err = Value::from_json(&user_type(), &json!({"email": "a", "planet": "earth"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ValueError::UnexpectedAttribute { ref attribute, .. } if attribute == "planet"
        ));
    }

    #[test]
    fn test_from_json_permissive_drops_extra_attributes() {
        let v = Value::from_json_permissive(
            &user_type(),
            &json!({"email": "a", "planet": "earth", "age": "42"}),
        )
        .unwrap();
        assert!(v.get_attr("planet").is_none());
        assert_eq!(v.get_attr("age").unwrap().as_number(), Some(42.0));
    }

    #[test]
    fn test_from_json_type_mismatch_path() {
        let err = Value::from_json(&user_type(), &json!({"age": "old"})).unwrap_err();
        match err {
            ValueError::TypeMismatch { path, expected, .. } => {
                assert_eq!(path, "age");
                assert_eq!(expected, "number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_predicates() {
        let ty = Type::object([("a", Type::String)]);
        let v = Value::object([("a", Value::unknown(Type::String))]);
        assert!(v.is_known());
        assert!(!v.is_fully_known());
        assert!(!v.is_null());
        assert!(Value::null(ty.clone()).is_null());
        assert!(Value::unknown(ty).is_unknown());
    }

    #[test]
    fn test_set_deduplicates() {
        let v = Value::set(
            Type::String,
            vec![Value::string("a"), Value::string("b"), Value::string("a")],
        )
        .unwrap();
        assert_eq!(v.length(), Some(2));
    }

    #[test]
    fn test_list_rejects_mixed_elements() {
        let err = Value::list(Type::String, vec![Value::string("a"), Value::number(1.0)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_check_type_object_mismatch() {
        let v = Value::object([("email", Value::string("a"))]);
        assert!(!v.conforms_to(&user_type()));
        assert!(v.conforms_to(&Type::object([("email", Type::String)])));
    }

    #[test]
    fn test_to_json_rejects_unknown() {
        let v = Value::object([("id", Value::unknown(Type::String))]);
        assert_eq!(
            v.to_json().unwrap_err(),
            ValueError::Unknown {
                path: "id".to_string()
            }
        );
    }

    #[test]
    fn test_to_json_integral_numbers() {
        let v = Value::object([("age", Value::number(200.0)), ("ratio", Value::number(0.5))]);
        assert_eq!(v.to_json().unwrap(), json!({"age": 200, "ratio": 0.5}));
    }

    #[test]
    fn test_with_attr() {
        let v = Value::object([("a", Value::string("x"))]).with_attr("a", Value::string("y"));
        assert_eq!(v.get_attr("a").unwrap().as_str(), Some("y"));
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let ab = Value::set(Type::String, vec![Value::string("a"), Value::string("b")]).unwrap();
        let ba = Value::set(Type::String, vec![Value::string("b"), Value::string("a")]).unwrap();
        assert_eq!(ab, ba);

        let a = Value::set(Type::String, vec![Value::string("a")]).unwrap();
        assert_ne!(ab, a);

        let list_ab = Value::list(Type::String, vec![Value::string("a"), Value::string("b")]);
        let list_ba = Value::list(Type::String, vec![Value::string("b"), Value::string("a")]);
        assert_ne!(list_ab.unwrap(), list_ba.unwrap());

        let nested = |tags: Value| Value::object([("tags", tags)]);
        assert_eq!(nested(ab), nested(ba));
    }

    #[test]
    fn test_to_json_out_of_range_integer_stays_float() {
        let edge = i64::MAX as f64;
        assert_eq!(number_to_json(edge), serde_json::Number::from_f64(edge).map(Json::Number));
        assert_eq!(number_to_json(-4.0), Some(json!(-4)));
    }
}
