use super::Value;

/// The semantic type of a scalar field or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    /// Signed 64-bit integer
    I64,

    /// 64-bit floating point number
    F64,

    /// UTF-8 text
    String,

    /// Binary blob
    Bytes,

    /// Calendar date without time zone
    Date,

    /// Date and time without time zone
    Timestamp,
}

impl Type {
    pub const fn name(self) -> &'static str {
        match self {
            Type::I64 => "I64",
            Type::F64 => "F64",
            Type::String => "String",
            Type::Bytes => "Bytes",
            Type::Date => "Date",
            Type::Timestamp => "Timestamp",
        }
    }

    /// Returns `true` if a non-null `value` has this type.
    ///
    /// `Null` is never of any type; nullability is decided by the field.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Type::I64, Value::I64(_))
                | (Type::F64, Value::F64(_))
                | (Type::String, Value::String(_))
                | (Type::Bytes, Value::Bytes(_))
                | (Type::Date, Value::Date(_))
                | (Type::Timestamp, Value::Timestamp(_))
        )
    }

    /// Widens `value` to this type where it is lossless.
    ///
    /// Integers given for a real field are the only widening performed.
    pub fn cast(self, value: Value) -> Value {
        match (self, value) {
            (Type::F64, Value::I64(v)) => Value::F64(v as f64),
            (_, value) => value,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
