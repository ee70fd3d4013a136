//! Raw driver scalars and scan-destination conversion.
//!
//! A [`Value`] is what the wrapped driver hands back for a single column
//! before any application-level conversion. The same [`ScanTarget`] path is
//! used whether a row comes from the live driver or from a cached entry, so
//! replayed queries convert identically to fresh ones.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// A single raw column value as produced by the underlying driver.
///
/// Byte sequences are always owned: drivers may reuse their internal buffers
/// between rows, so values are deep-copied at capture time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
}

impl Value {
    /// A short name of the dynamic type, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Time(_) => "time",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Bytes(v.into_bytes())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a raw driver scalar into an application value.
///
/// The supported conversions mirror what relational drivers commonly accept:
/// integer widening with range checks, integers into floats, UTF-8 byte
/// sequences into strings, and `Null` only into `Option` destinations.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, Error>;
}

fn mismatch<T>(value: &Value) -> Result<T, Error> {
    Err(Error::Convert {
        from: value.type_name(),
        to:   std::any::type_name::<T>(),
    })
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, Error> {
        Ok(value.clone())
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, Error> {
                match value {
                    Value::Int(v) => <$ty>::try_from(*v).or_else(|_| mismatch(value)),
                    Value::UInt(v) => <$ty>::try_from(*v).or_else(|_| mismatch(value)),
                    _ => mismatch(value),
                }
            }
        }
    )*};
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::UInt(v) => Ok(*v as f64),
            _ => mismatch(value),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bool(v) => Ok(*v),
            // SQLite and MySQL report booleans as small integers.
            Value::Int(0) | Value::UInt(0) => Ok(false),
            Value::Int(1) | Value::UInt(1) => Ok(true),
            _ => mismatch(value),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bytes(v) => std::str::from_utf8(v).map(str::to_owned).or_else(|_| mismatch(value)),
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Time(v) => Ok(v.to_rfc3339()),
            _ => mismatch(value),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            _ => mismatch(value),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Time(v) => Ok(*v),
            _ => mismatch(value),
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(value: &Value) -> Result<Self, Error> {
        if value.is_null() {
            Ok(None)
        }
        else {
            T::from_value(value).map(Some)
        }
    }
}

/// A scan destination.
///
/// Row streams call [`assign`](ScanTarget::assign) once per column with the
/// raw driver value; the blanket implementation converts through
/// [`FromValue`]. Scanning into a `Value` destination keeps the raw scalar
/// untouched, which is how the recorder captures rows for the cache.
pub trait ScanTarget {
    fn assign(&mut self, value: &Value) -> Result<(), Error>;
}

impl<T> ScanTarget for T
where
    T: FromValue,
{
    fn assign(&mut self, value: &Value) -> Result<(), Error> {
        *self = T::from_value(value)?;
        Ok(())
    }
}
