//! Wire encoding of values.
//!
//! Values travel as self-describing MessagePack. Null is `nil`. An unknown
//! without refinements is extension type 0; an unknown with refinements is
//! extension type 12 whose payload is a MessagePack map keyed by refinement
//! kind:
//!
//! | Key | Refinement | Payload |
//! |-----|------------|---------|
//! | 1 | nullness | bool, `false` when the value will not be null |
//! | 2 | string prefix | string |
//! | 3 | number range | map `{1: lo, 2: hi, 3: lo inclusive, 4: hi inclusive}` |
//! | 4 | collection length | map `{1: lo, 2: hi}` |
//!
//! Decoding always checks the structure against the declared type.

use rmpv::Value as Mp;

use crate::error::ValueError;
use crate::refinement::{NumberBound, Refinements};
use crate::value::{child_path, Type, Value};

/// Extension type of an unrefined unknown.
pub const UNKNOWN_EXT: i8 = 0;
/// Extension type of a refined unknown.
pub const REFINED_UNKNOWN_EXT: i8 = 12;

const KEY_NULLNESS: u64 = 1;
const KEY_STRING_PREFIX: u64 = 2;
const KEY_NUMBER_RANGE: u64 = 3;
const KEY_LENGTH_RANGE: u64 = 4;

/// Encode a value as MessagePack after checking it against `ty`.
pub fn encode(value: &Value, ty: &Type) -> Result<Vec<u8>, ValueError> {
    value.check_type(ty, "")?;
    let mp = to_msgpack(value)?;
    write(&mp)
}

/// Decode MessagePack bytes as a value of type `ty`.
pub fn decode(ty: &Type, bytes: &[u8]) -> Result<Value, ValueError> {
    let mp = read(bytes)?;
    from_msgpack(ty, &mp, "")
}

/// Decode a dynamic value carried either as MessagePack or as JSON.
///
/// MessagePack wins when both are present. An empty payload decodes as null.
pub fn decode_dynamic(ty: &Type, msgpack: &[u8], json: &[u8]) -> Result<Value, ValueError> {
    if !msgpack.is_empty() {
        return decode(ty, msgpack);
    }
    if !json.is_empty() {
        let parsed: serde_json::Value =
            serde_json::from_slice(json).map_err(|e| ValueError::Malformed(e.to_string()))?;
        return Value::from_json(ty, &parsed);
    }
    Ok(Value::null(ty.clone()))
}

fn write(mp: &Mp) -> Result<Vec<u8>, ValueError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, mp).map_err(|e| ValueError::Encode(e.to_string()))?;
    Ok(buf)
}

fn read(bytes: &[u8]) -> Result<Mp, ValueError> {
    let mut cursor = bytes;
    let mp =
        rmpv::decode::read_value(&mut cursor).map_err(|e| ValueError::Malformed(e.to_string()))?;
    if !cursor.is_empty() {
        return Err(ValueError::Malformed(format!(
            "{} trailing bytes after value",
            cursor.len()
        )));
    }
    Ok(mp)
}

fn number_to_msgpack(n: f64) -> Mp {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Mp::from(n as i64)
    } else {
        Mp::F64(n)
    }
}

fn to_msgpack(value: &Value) -> Result<Mp, ValueError> {
    Ok(match value {
        Value::Null(_) => Mp::Nil,
        Value::Unknown(_, refinements) if refinements.is_empty() => {
            Mp::Ext(UNKNOWN_EXT, Vec::new())
        }
        Value::Unknown(_, refinements) => {
            Mp::Ext(REFINED_UNKNOWN_EXT, write(&refinements_to_msgpack(refinements))?)
        }
        Value::Bool(b) => Mp::Boolean(*b),
        Value::Number(n) => number_to_msgpack(*n),
        Value::String(s) => Mp::from(s.as_str()),
        Value::List(_, items) | Value::Set(_, items) | Value::Tuple(items) => {
            Mp::Array(items.iter().map(to_msgpack).collect::<Result<_, _>>()?)
        }
        Value::Map(_, items) | Value::Object(items) => Mp::Map(
            items
                .iter()
                .map(|(key, item)| Ok((Mp::from(key.as_str()), to_msgpack(item)?)))
                .collect::<Result<_, ValueError>>()?,
        ),
    })
}

fn refinements_to_msgpack(refinements: &Refinements) -> Mp {
    let mut entries = Vec::new();
    if refinements.definitely_not_null {
        entries.push((Mp::from(KEY_NULLNESS), Mp::Boolean(false)));
    }
    if let Some(prefix) = &refinements.string_prefix {
        entries.push((Mp::from(KEY_STRING_PREFIX), Mp::from(prefix.as_str())));
    }
    if refinements.number_lower.is_some() || refinements.number_upper.is_some() {
        let mut range = Vec::new();
        if let Some(lo) = refinements.number_lower {
            range.push((Mp::from(1u64), number_to_msgpack(lo.value)));
            range.push((Mp::from(3u64), Mp::Boolean(lo.inclusive)));
        }
        if let Some(hi) = refinements.number_upper {
            range.push((Mp::from(2u64), number_to_msgpack(hi.value)));
            range.push((Mp::from(4u64), Mp::Boolean(hi.inclusive)));
        }
        entries.push((Mp::from(KEY_NUMBER_RANGE), Mp::Map(range)));
    }
    if refinements.length_lower.is_some() || refinements.length_upper.is_some() {
        let mut range = Vec::new();
        if let Some(lo) = refinements.length_lower {
            range.push((Mp::from(1u64), Mp::from(lo)));
        }
        if let Some(hi) = refinements.length_upper {
            range.push((Mp::from(2u64), Mp::from(hi)));
        }
        entries.push((Mp::from(KEY_LENGTH_RANGE), Mp::Map(range)));
    }
    Mp::Map(entries)
}

fn refinements_from_msgpack(payload: &[u8]) -> Result<Refinements, ValueError> {
    let mp = read(payload)?;
    let entries = match mp {
        Mp::Map(entries) => entries,
        other => {
            return Err(ValueError::Malformed(format!(
                "refinement payload must be a map, got {}",
                other
            )))
        }
    };
    let mut refinements = Refinements::new();
    for (key, value) in entries {
        match key.as_u64() {
            Some(KEY_NULLNESS) => {
                refinements.definitely_not_null = value.as_bool() == Some(false);
            }
            Some(KEY_STRING_PREFIX) => {
                let prefix = value
                    .as_str()
                    .ok_or_else(|| ValueError::Malformed("string prefix must be a string".into()))?;
                refinements.string_prefix = Some(prefix.to_string());
            }
            Some(KEY_NUMBER_RANGE) => {
                let (mut lo, mut hi, mut lo_incl, mut hi_incl) = (None, None, false, false);
                for (k, v) in as_map(&value)? {
                    match k.as_u64() {
                        Some(1) => lo = v.as_f64(),
                        Some(2) => hi = v.as_f64(),
                        Some(3) => lo_incl = v.as_bool().unwrap_or(false),
                        Some(4) => hi_incl = v.as_bool().unwrap_or(false),
                        _ => {}
                    }
                }
                refinements.number_lower = lo.map(|value| NumberBound {
                    value,
                    inclusive: lo_incl,
                });
                refinements.number_upper = hi.map(|value| NumberBound {
                    value,
                    inclusive: hi_incl,
                });
            }
            Some(KEY_LENGTH_RANGE) => {
                for (k, v) in as_map(&value)? {
                    match k.as_u64() {
                        Some(1) => refinements.length_lower = v.as_u64(),
                        Some(2) => refinements.length_upper = v.as_u64(),
                        _ => {}
                    }
                }
            }
            // Refinement kinds added by newer hosts are ignored.
            _ => {}
        }
    }
    Ok(refinements)
}

fn as_map(mp: &Mp) -> Result<&[(Mp, Mp)], ValueError> {
    match mp {
        Mp::Map(entries) => Ok(entries),
        other => Err(ValueError::Malformed(format!(
            "expected refinement map, got {}",
            other
        ))),
    }
}

fn kind(mp: &Mp) -> String {
    match mp {
        Mp::Nil => "nil".into(),
        Mp::Boolean(_) => "bool".into(),
        Mp::Integer(_) | Mp::F32(_) | Mp::F64(_) => "number".into(),
        Mp::String(_) => "string".into(),
        Mp::Binary(_) => "binary".into(),
        Mp::Array(items) => format!("array of {}", items.len()),
        Mp::Map(_) => "map".into(),
        Mp::Ext(ty, _) => format!("extension {}", ty),
    }
}

fn mismatch(path: &str, ty: &Type, mp: &Mp) -> ValueError {
    ValueError::TypeMismatch {
        path: path.to_string(),
        expected: ty.to_string(),
        actual: kind(mp),
    }
}

fn from_msgpack(ty: &Type, mp: &Mp, path: &str) -> Result<Value, ValueError> {
    match mp {
        Mp::Nil => return Ok(Value::null(ty.clone())),
        Mp::Ext(UNKNOWN_EXT, _) => return Ok(Value::unknown(ty.clone())),
        Mp::Ext(REFINED_UNKNOWN_EXT, payload) => {
            let refinements = refinements_from_msgpack(payload)?;
            return Ok(Value::unknown_refined(ty.clone(), refinements));
        }
        Mp::Ext(other, _) => {
            return Err(ValueError::Malformed(format!(
                "{}: unsupported extension type {}",
                path, other
            )))
        }
        _ => {}
    }

    match ty {
        Type::Bool => mp
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(path, ty, mp)),
        Type::Number => match mp {
            Mp::Integer(i) => i
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| mismatch(path, ty, mp)),
            Mp::F32(f) => Ok(Value::Number(f64::from(*f))),
            Mp::F64(f) => Ok(Value::Number(*f)),
            // Numbers too large for a float are sent as decimal strings.
            Mp::String(s) => s
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .map(Value::Number)
                .ok_or_else(|| mismatch(path, ty, mp)),
            _ => Err(mismatch(path, ty, mp)),
        }
        Type::String => mp
            .as_str()
            .map(Value::string)
            .ok_or_else(|| mismatch(path, ty, mp)),
        Type::List(el) | Type::Set(el) => {
            let items = mp.as_array().ok_or_else(|| mismatch(path, ty, mp))?;
            let decoded = items
                .iter()
                .enumerate()
                .map(|(i, item)| from_msgpack(el, item, &child_path(path, &i.to_string())))
                .collect::<Result<Vec<_>, _>>()?;
            if matches!(ty, Type::Set(_)) {
                Value::set(el.as_ref().clone(), decoded)
            } else {
                Ok(Value::List(el.as_ref().clone(), decoded))
            }
        }
        Type::Map(el) => {
            let entries = mp.as_map().ok_or_else(|| mismatch(path, ty, mp))?;
            let mut out = std::collections::BTreeMap::new();
            for (key, item) in entries {
                let key = key.as_str().ok_or_else(|| {
                    ValueError::Malformed(format!("{}: map key must be a string", path))
                })?;
                out.insert(key.to_string(), from_msgpack(el, item, &child_path(path, key))?);
            }
            Ok(Value::Map(el.as_ref().clone(), out))
        }
        Type::Tuple(els) => {
            let items = mp.as_array().ok_or_else(|| mismatch(path, ty, mp))?;
            if items.len() != els.len() {
                return Err(ValueError::TupleLength {
                    path: path.to_string(),
                    expected: els.len(),
                    actual: items.len(),
                });
            }
            Ok(Value::Tuple(
                els.iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (el, item))| {
                        from_msgpack(el, item, &child_path(path, &i.to_string()))
                    })
                    .collect::<Result<_, _>>()?,
            ))
        }
        Type::Object(attrs) => {
            let entries = mp.as_map().ok_or_else(|| mismatch(path, ty, mp))?;
            let mut out = std::collections::BTreeMap::new();
            for (key, item) in entries {
                let key = key.as_str().ok_or_else(|| {
                    ValueError::Malformed(format!("{}: attribute name must be a string", path))
                })?;
                let attr_ty = attrs.get(key).ok_or_else(|| ValueError::UnexpectedAttribute {
                    path: path.to_string(),
                    attribute: key.to_string(),
                })?;
                out.insert(key.to_string(), from_msgpack(attr_ty, item, &child_path(path, key))?);
            }
            if let Some(missing) = attrs.keys().find(|name| !out.contains_key(*name)) {
                return Err(ValueError::MissingAttribute {
                    path: path.to_string(),
                    attribute: missing.clone(),
                });
            }
            Ok(Value::Object(out))
        }
    }
}
