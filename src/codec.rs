use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

pub const VALUE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    String,
}
impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
        }
    }
}
impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for ValueType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "int" => Ok(ValueType::Int),
            "float" => Ok(ValueType::Float),
            "string" => Ok(ValueType::String),
            _ => Err(Error::UnknownValueType {
                tag: tag.to_string(),
            }),
        }
    }
}

/// A decoded metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
}
impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Value::Int(i) => encode_int(*i)?.to_vec(),
            Value::Float(f) => encode_float(*f).to_vec(),
            Value::String(s) => encode_str(s),
        })
    }

    /// Decodes `buf` according to the stored type tag.
    pub fn decode(tag: &str, buf: &[u8]) -> Result<Self> {
        match tag.parse::<ValueType>()? {
            ValueType::Int => decode_int(buf).map(Value::Int),
            ValueType::Float => decode_float(buf).map(Value::Float),
            ValueType::String => Ok(Value::String(decode_str(buf))),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }
}

/// Bare JSON scalars. Floats with no fractional part are written as
/// integers (`100`, not `100.0`).
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => match integral(*f) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*f),
            },
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

/// Beyond 2^53 not every integer is representable, so those stay floats.
fn integral(f: f64) -> Option<i64> {
    const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;
    let exact = f.is_finite() && f.fract() == 0.0 && f.abs() <= EXACT_LIMIT;
    exact.then_some(f as i64)
}

/// Negative integers are rejected; the wire format is an unsigned 64-bit integer.
pub fn encode_int(i: i64) -> Result<[u8; VALUE_SIZE]> {
    let u = u64::try_from(i).map_err(|_| Error::IntegerOutOfRange {
        value: i128::from(i),
    })?;
    Ok(u.to_le_bytes())
}
pub fn decode_int(buf: &[u8]) -> Result<i64> {
    let u = u64::from_le_bytes(fixed(buf)?);
    i64::try_from(u).map_err(|_| Error::IntegerOutOfRange {
        value: i128::from(u),
    })
}

pub fn encode_float(f: f64) -> [u8; VALUE_SIZE] {
    f.to_bits().to_le_bytes()
}
pub fn decode_float(buf: &[u8]) -> Result<f64> {
    Ok(f64::from_bits(u64::from_le_bytes(fixed(buf)?)))
}

pub fn encode_str(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}
pub fn decode_str(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

fn fixed(buf: &[u8]) -> Result<[u8; VALUE_SIZE]> {
    buf.try_into().map_err(|_| Error::InvalidValueLength {
        expected: VALUE_SIZE,
        actual: buf.len(),
    })
}
