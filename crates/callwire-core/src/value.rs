//! Dynamic values carried through the argument and return channel.
//!
//! [`RpcValue`] is richer than JSON: it keeps dates, big integers, non-finite
//! floats, `Undefined`, sets and maps with arbitrary keys. The codec turns it
//! into JSON plus metadata and back.
//!
//! [`ToRpcValue`] and [`FromRpcValue`] bridge ordinary Rust types to the
//! dynamic model, the same way the typed parameters of a service method and
//! the typed results of a client stub are converted.

use crate::codec::CodecError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// A value that can cross the RPC boundary.
#[derive(Debug, Clone)]
pub enum RpcValue {
    Undefined,
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    BigInt(i128),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<RpcValue>),
    Object(BTreeMap<String, RpcValue>),
    /// Insertion-ordered set.
    Set(Vec<RpcValue>),
    /// Insertion-ordered map with keys of any type.
    Map(Vec<(RpcValue, RpcValue)>),
}

impl PartialEq for RpcValue {
    fn eq(&self, other: &Self) -> bool {
        use RpcValue::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            // NaN must compare equal to itself for the round-trip law to hold
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (BigInt(a), BigInt(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Array(a), Array(b)) | (Set(a), Set(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

impl RpcValue {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RpcValue)>,
    {
        RpcValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            RpcValue::Undefined => "undefined",
            RpcValue::Null => "null",
            RpcValue::Bool(_) => "bool",
            RpcValue::Integer(_) => "integer",
            RpcValue::Float(_) => "float",
            RpcValue::BigInt(_) => "bigint",
            RpcValue::String(_) => "string",
            RpcValue::Date(_) => "date",
            RpcValue::Array(_) => "array",
            RpcValue::Object(_) => "object",
            RpcValue::Set(_) => "set",
            RpcValue::Map(_) => "map",
        }
    }

    /// `true` for both `Undefined` and `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, RpcValue::Undefined | RpcValue::Null)
    }

    /// Look up a key of an object value.
    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        match self {
            RpcValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Lossy conversion to plain JSON.
    ///
    /// Dates become RFC 3339 strings, big integers become numbers when they
    /// fit in 64 bits and strings otherwise, `Undefined` and non-finite
    /// floats become `null`, sets become arrays and maps become arrays of
    /// `[key, value]` pairs.
    pub fn into_plain_json(self) -> JsonValue {
        match self {
            RpcValue::Undefined | RpcValue::Null => JsonValue::Null,
            RpcValue::Bool(b) => JsonValue::Bool(b),
            RpcValue::Integer(i) => JsonValue::from(i),
            RpcValue::Float(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            RpcValue::BigInt(i) => {
                if let Ok(v) = i64::try_from(i) {
                    JsonValue::from(v)
                } else if let Ok(v) = u64::try_from(i) {
                    JsonValue::from(v)
                } else {
                    JsonValue::String(i.to_string())
                }
            }
            RpcValue::String(s) => JsonValue::String(s),
            RpcValue::Date(d) => JsonValue::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            RpcValue::Array(items) | RpcValue::Set(items) => {
                JsonValue::Array(items.into_iter().map(RpcValue::into_plain_json).collect())
            }
            RpcValue::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_plain_json()))
                    .collect(),
            ),
            RpcValue::Map(entries) => JsonValue::Array(
                entries
                    .into_iter()
                    .map(|(k, v)| JsonValue::Array(vec![k.into_plain_json(), v.into_plain_json()]))
                    .collect(),
            ),
        }
    }
}

/// Plain JSON maps onto the dynamic model without any type recovery.
impl From<JsonValue> for RpcValue {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => RpcValue::Null,
            JsonValue::Bool(b) => RpcValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RpcValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    RpcValue::BigInt(i128::from(u))
                } else {
                    RpcValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => RpcValue::String(s),
            JsonValue::Array(items) => RpcValue::Array(items.into_iter().map(RpcValue::from).collect()),
            JsonValue::Object(map) => {
                RpcValue::Object(map.into_iter().map(|(k, v)| (k, RpcValue::from(v))).collect())
            }
        }
    }
}

impl From<&str> for RpcValue {
    fn from(s: &str) -> Self {
        RpcValue::String(s.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(s: String) -> Self {
        RpcValue::String(s)
    }
}

impl From<DateTime<Utc>> for RpcValue {
    fn from(d: DateTime<Utc>) -> Self {
        RpcValue::Date(d)
    }
}

// ============================================================================
// Typed bridge
// ============================================================================

/// Conversion of a Rust value into an [`RpcValue`].
pub trait ToRpcValue {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError>;
}

/// Conversion of an [`RpcValue`] into a Rust value.
pub trait FromRpcValue: Sized {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError>;
}

fn mismatch(expected: &str, found: &RpcValue) -> CodecError {
    CodecError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

impl ToRpcValue for RpcValue {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(self.clone())
    }
}

impl FromRpcValue for RpcValue {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        Ok(value)
    }
}

impl<T: ToRpcValue + ?Sized> ToRpcValue for &T {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        (**self).to_rpc_value()
    }
}

impl<T: ToRpcValue + ?Sized> ToRpcValue for Box<T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        (**self).to_rpc_value()
    }
}

impl ToRpcValue for () {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::Undefined)
    }
}

impl FromRpcValue for () {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::Undefined | RpcValue::Null => Ok(()),
            other => Err(mismatch("undefined", &other)),
        }
    }
}

impl ToRpcValue for bool {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::Bool(*self))
    }
}

impl FromRpcValue for bool {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl ToRpcValue for $ty {
                fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
                    Ok(match i64::try_from(*self) {
                        Ok(v) => RpcValue::Integer(v),
                        Err(_) => RpcValue::BigInt(i128::try_from(*self).map_err(|_| {
                            CodecError::Serialization {
                                message: format!("integer {} does not fit in 128 bits", self),
                            }
                        })?),
                    })
                }
            }

            impl FromRpcValue for $ty {
                fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
                    let out_of_range = |v: &dyn std::fmt::Display| CodecError::TypeMismatch {
                        expected: stringify!($ty).to_string(),
                        found: format!("out-of-range integer {}", v),
                    };
                    match value {
                        RpcValue::Integer(i) => <$ty>::try_from(i).map_err(|_| out_of_range(&i)),
                        RpcValue::BigInt(i) => <$ty>::try_from(i).map_err(|_| out_of_range(&i)),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, u128);

impl ToRpcValue for i128 {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::BigInt(*self))
    }
}

impl FromRpcValue for i128 {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::Integer(i) => Ok(i128::from(i)),
            RpcValue::BigInt(i) => Ok(i),
            other => Err(mismatch("i128", &other)),
        }
    }
}

impl ToRpcValue for f64 {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::Float(*self))
    }
}

impl FromRpcValue for f64 {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::Float(f) => Ok(f),
            RpcValue::Integer(i) => Ok(i as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl ToRpcValue for f32 {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::Float(f64::from(*self)))
    }
}

impl FromRpcValue for f32 {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        f64::from_rpc_value(value).map(|f| f as f32)
    }
}

impl ToRpcValue for str {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::String(self.to_string()))
    }
}

impl ToRpcValue for String {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::String(self.clone()))
    }
}

impl FromRpcValue for String {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl ToRpcValue for DateTime<Utc> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::Date(*self))
    }
}

impl FromRpcValue for DateTime<Utc> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::Date(d) => Ok(d),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl<T: ToRpcValue> ToRpcValue for Option<T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        match self {
            Some(v) => v.to_rpc_value(),
            None => Ok(RpcValue::Null),
        }
    }
}

impl<T: FromRpcValue> FromRpcValue for Option<T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        if value.is_nullish() {
            Ok(None)
        } else {
            T::from_rpc_value(value).map(Some)
        }
    }
}

impl<T: ToRpcValue> ToRpcValue for [T] {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        self.iter()
            .map(ToRpcValue::to_rpc_value)
            .collect::<Result<Vec<_>, _>>()
            .map(RpcValue::Array)
    }
}

impl<T: ToRpcValue> ToRpcValue for Vec<T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        self.as_slice().to_rpc_value()
    }
}

impl<T: FromRpcValue> FromRpcValue for Vec<T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        match value {
            RpcValue::Array(items) | RpcValue::Set(items) => {
                items.into_iter().map(T::from_rpc_value).collect()
            }
            other => Err(mismatch("array", &other)),
        }
    }
}

fn set_items<'a, T: ToRpcValue + 'a>(
    items: impl Iterator<Item = &'a T>,
) -> Result<RpcValue, CodecError> {
    items
        .map(ToRpcValue::to_rpc_value)
        .collect::<Result<Vec<_>, _>>()
        .map(RpcValue::Set)
}

impl<T: ToRpcValue> ToRpcValue for BTreeSet<T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        set_items(self.iter())
    }
}

impl<T: FromRpcValue + Ord> FromRpcValue for BTreeSet<T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        Vec::<T>::from_rpc_value(value).map(|items| items.into_iter().collect())
    }
}

impl<T: ToRpcValue> ToRpcValue for HashSet<T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        set_items(self.iter())
    }
}

impl<T: FromRpcValue + Eq + Hash> FromRpcValue for HashSet<T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        Vec::<T>::from_rpc_value(value).map(|items| items.into_iter().collect())
    }
}

fn object_entries<'a, T: ToRpcValue + 'a>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
) -> Result<RpcValue, CodecError> {
    entries
        .map(|(k, v)| Ok((k.clone(), v.to_rpc_value()?)))
        .collect::<Result<BTreeMap<_, _>, CodecError>>()
        .map(RpcValue::Object)
}

fn string_keyed<T: FromRpcValue, C: FromIterator<(String, T)>>(
    value: RpcValue,
) -> Result<C, CodecError> {
    match value {
        RpcValue::Object(map) => map
            .into_iter()
            .map(|(k, v)| -> Result<(String, T), CodecError> { Ok((k, T::from_rpc_value(v)?)) })
            .collect(),
        RpcValue::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| -> Result<(String, T), CodecError> {
                Ok((String::from_rpc_value(k)?, T::from_rpc_value(v)?))
            })
            .collect(),
        other => Err(mismatch("object", &other)),
    }
}

impl<T: ToRpcValue> ToRpcValue for BTreeMap<String, T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        object_entries(self.iter())
    }
}

impl<T: FromRpcValue> FromRpcValue for BTreeMap<String, T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        string_keyed(value)
    }
}

impl<T: ToRpcValue> ToRpcValue for HashMap<String, T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        object_entries(self.iter())
    }
}

impl<T: FromRpcValue> FromRpcValue for HashMap<String, T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        string_keyed(value)
    }
}

impl ToRpcValue for JsonValue {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        Ok(RpcValue::from(self.clone()))
    }
}

impl FromRpcValue for JsonValue {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        Ok(value.into_plain_json())
    }
}

/// Carries any serde type through the channel as plain JSON.
///
/// Fields that serde renders as strings (dates included) stay strings on the
/// wire; use the native conversions when the exact type must survive.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize> ToRpcValue for Json<T> {
    fn to_rpc_value(&self) -> Result<RpcValue, CodecError> {
        serde_json::to_value(&self.0)
            .map(RpcValue::from)
            .map_err(|e| CodecError::Serialization {
                message: e.to_string(),
            })
    }
}

impl<T: DeserializeOwned> FromRpcValue for Json<T> {
    fn from_rpc_value(value: RpcValue) -> Result<Self, CodecError> {
        serde_json::from_value(value.into_plain_json())
            .map(Json)
            .map_err(|e| CodecError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: e.to_string(),
            })
    }
}

// ============================================================================
// Argument lists
// ============================================================================

/// Turns a tuple of values into a positional argument list.
pub trait IntoArguments {
    fn into_arguments(self) -> Result<Vec<RpcValue>, CodecError>;
}

impl IntoArguments for Vec<RpcValue> {
    fn into_arguments(self) -> Result<Vec<RpcValue>, CodecError> {
        Ok(self)
    }
}

impl IntoArguments for () {
    fn into_arguments(self) -> Result<Vec<RpcValue>, CodecError> {
        Ok(Vec::new())
    }
}

macro_rules! impl_into_arguments {
    ($($name:ident),+) => {
        impl<$($name: ToRpcValue),+> IntoArguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_arguments(self) -> Result<Vec<RpcValue>, CodecError> {
                let ($($name,)+) = self;
                Ok(vec![$($name.to_rpc_value()?),+])
            }
        }
    };
}

impl_into_arguments!(A);
impl_into_arguments!(A, B);
impl_into_arguments!(A, B, C);
impl_into_arguments!(A, B, C, D);
impl_into_arguments!(A, B, C, D, E);
impl_into_arguments!(A, B, C, D, E, F);
