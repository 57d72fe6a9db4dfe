use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// One call-time argument, already lowered out of its Rust type.
#[derive(Debug, Clone, Default)]
pub enum ArgValue {
    #[default]
    Null,
    Value(Value),
    Bytes(Bytes),
    Cancel(CancellationToken),
}

impl ArgValue {
    /// Lower any serializable value; `None` and unit become [`ArgValue::Null`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::to_value(value)? {
            Value::Null => ArgValue::Null,
            v => ArgValue::Value(v),
        })
    }

    pub fn text(value: impl Into<String>) -> Self {
        ArgValue::Value(Value::String(value.into()))
    }

    pub fn bytes(value: impl AsRef<[u8]>) -> Self {
        ArgValue::Bytes(Bytes::copy_from_slice(value.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null | ArgValue::Value(Value::Null))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Value(_) => "value",
            ArgValue::Bytes(_) => "bytes",
            ArgValue::Cancel(_) => "cancellation token",
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            v => ArgValue::Value(v),
        }
    }
}

impl From<Bytes> for ArgValue {
    fn from(value: Bytes) -> Self {
        ArgValue::Bytes(value)
    }
}

impl From<CancellationToken> for ArgValue {
    fn from(token: CancellationToken) -> Self {
        ArgValue::Cancel(token)
    }
}

/// Byte-typed arguments. Generated clients lower body bytes through this
/// instead of the serializer so they go out verbatim.
pub trait BytesArg {
    fn into_arg(self) -> ArgValue;
}

impl BytesArg for Vec<u8> {
    fn into_arg(self) -> ArgValue {
        ArgValue::Bytes(Bytes::from(self))
    }
}

impl BytesArg for &Vec<u8> {
    fn into_arg(self) -> ArgValue {
        ArgValue::bytes(self)
    }
}

impl BytesArg for &[u8] {
    fn into_arg(self) -> ArgValue {
        ArgValue::bytes(self)
    }
}

impl BytesArg for Bytes {
    fn into_arg(self) -> ArgValue {
        ArgValue::Bytes(self)
    }
}

impl BytesArg for &Bytes {
    fn into_arg(self) -> ArgValue {
        ArgValue::Bytes(self.clone())
    }
}

impl BytesArg for Cow<'_, [u8]> {
    fn into_arg(self) -> ArgValue {
        ArgValue::bytes(self)
    }
}

impl<T: BytesArg> BytesArg for Option<T> {
    fn into_arg(self) -> ArgValue {
        self.map(BytesArg::into_arg).unwrap_or(ArgValue::Null)
    }
}

/// Cancellation-typed arguments.
pub trait CancelArg {
    fn into_arg(self) -> ArgValue;
}

impl CancelArg for CancellationToken {
    fn into_arg(self) -> ArgValue {
        ArgValue::Cancel(self)
    }
}

impl CancelArg for &CancellationToken {
    fn into_arg(self) -> ArgValue {
        ArgValue::Cancel(self.clone())
    }
}

impl<T: CancelArg> CancelArg for Option<T> {
    fn into_arg(self) -> ArgValue {
        self.map(CancelArg::into_arg).unwrap_or(ArgValue::Null)
    }
}

/// Current property values of a client instance, by property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyValues {
    values: HashMap<String, Value>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Unset properties read as null.
    pub fn get(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(name).unwrap_or(&NULL)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }
}
