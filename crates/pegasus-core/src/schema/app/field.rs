use super::{ModelId, OneToOne};
use crate::stmt::{Type, Value};

use std::fmt;

#[derive(Debug, Clone)]
pub struct Field {
    /// Uniquely identifies the field within the containing model.
    pub id: FieldId,

    /// The field name
    pub name: String,

    /// Primitive or relation
    pub ty: FieldTy,

    /// True if the field was declared as accepting null.
    pub nullable: bool,

    /// True if the field is part of the primary key
    pub primary_key: bool,

    /// Value used on creation when none is supplied
    pub default: Option<Value>,

    /// True if the storage engine assigns the value
    pub auto: bool,

    /// Ownership declared on a relation field, before resolution
    pub owns_key_hint: Option<bool>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldId {
    pub model: ModelId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldTy {
    Primitive(Type),

    /// Reference to another model, not yet paired
    Model(ModelId),

    OneToOne(OneToOne),
}

impl Field {
    /// Type of the value stored in the field.
    pub fn value_ty(&self) -> Option<Type> {
        match self.ty {
            FieldTy::Primitive(ty) => Some(ty),
            FieldTy::OneToOne(rel) => Some(rel.key_ty),
            FieldTy::Model(_) => None,
        }
    }

    /// True if `Null` is a valid value for the field.
    pub fn is_nullable(&self) -> bool {
        if self.nullable || self.default.is_some() {
            return true;
        }

        matches!(self.ty, FieldTy::OneToOne(rel) if !rel.owns_key)
    }

    /// True if creation must supply a value.
    pub fn is_required(&self) -> bool {
        !self.auto && !self.is_nullable()
    }

    pub fn is_relation(&self) -> bool {
        !matches!(self.ty, FieldTy::Primitive(_))
    }

    /// Returns `true` if `value` may be stored in the field.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.is_nullable();
        }

        match self.value_ty() {
            Some(ty) => ty.accepts(&ty.cast(value.clone())),
            None => false,
        }
    }
}

impl FieldTy {
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn as_one_to_one(&self) -> Option<&OneToOne> {
        match self {
            Self::OneToOne(rel) => Some(rel),
            _ => None,
        }
    }

    /// The referenced model, resolved or not.
    pub fn target(&self) -> Option<ModelId> {
        match *self {
            Self::Model(target) => Some(target),
            Self::OneToOne(rel) => Some(rel.target),
            Self::Primitive(_) => None,
        }
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "FieldId({}/{})", self.model.0, self.index)
    }
}
