use crate::stmt;

/// How a column is stored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Integer,
    Real,
    Text,
    Blob,
    Date,
    Timestamp,
}

impl Type {
    pub fn from_app(ty: stmt::Type) -> Type {
        match ty {
            stmt::Type::I64 => Type::Integer,
            stmt::Type::F64 => Type::Real,
            stmt::Type::String => Type::Text,
            stmt::Type::Bytes => Type::Blob,
            stmt::Type::Date => Type::Date,
            stmt::Type::Timestamp => Type::Timestamp,
        }
    }
}
