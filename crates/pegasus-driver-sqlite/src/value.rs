use chrono::{NaiveDate, NaiveDateTime};
use pegasus_core::{schema::db, stmt::Value as CoreValue, Error, Result};
use rusqlite::{
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
    Row,
};

/// A core value crossing the rusqlite boundary.
#[derive(Debug)]
pub struct Value(CoreValue);

impl From<CoreValue> for Value {
    fn from(value: CoreValue) -> Self {
        Self(value)
    }
}

impl Value {
    pub fn into_inner(self) -> CoreValue {
        self.0
    }

    /// Reads the column at `index` of `row`, stored as `ty`.
    pub fn from_sql(row: &Row, index: usize, ty: db::Type) -> Result<Self> {
        let core_value = match ty {
            db::Type::Date => row
                .get::<_, Option<NaiveDate>>(index)
                .map(CoreValue::from),
            db::Type::Timestamp => row
                .get::<_, Option<NaiveDateTime>>(index)
                .map(CoreValue::from),
            _ => row.get::<_, SqlValue>(index).map(|value| match value {
                SqlValue::Null => CoreValue::Null,
                SqlValue::Integer(value) if ty == db::Type::Real => CoreValue::F64(value as f64),
                SqlValue::Integer(value) => CoreValue::I64(value),
                SqlValue::Real(value) => CoreValue::F64(value),
                SqlValue::Text(value) => CoreValue::String(value),
                SqlValue::Blob(value) => CoreValue::Bytes(value),
            }),
        }
        .map_err(Error::driver_operation_failed)?;

        Ok(Value(core_value))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use CoreValue::*;

        match &self.0 {
            Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            I64(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*v))),
            F64(v) => Ok(ToSqlOutput::Owned(SqlValue::Real(*v))),
            String(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            Bytes(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(&v[..]))),
            Date(v) => v.to_sql(),
            Timestamp(v) => v.to_sql(),
        }
    }
}
