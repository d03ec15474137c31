use crate::stmt::{Type, Value};

/// Declarative description of a model, registered with the schema
/// builder.
///
/// ```
/// use pegasus_core::schema::app::{FieldDef, ModelDef};
/// use pegasus_core::stmt::Type;
///
/// let car = ModelDef::new("Car")
///     .field(FieldDef::new("name", Type::String))
///     .field(FieldDef::new("price", Type::I64).default(0));
///
/// assert_eq!(car.fields.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,

    /// Table the model is stored in, the lower-cased name otherwise
    pub table_name: Option<String>,

    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldDefTy,
    pub primary_key: bool,
    pub default: Option<Value>,
    pub nullable: bool,

    /// Assigned by the storage engine, never by callers
    pub auto: bool,

    /// For relations, whether this side holds the foreign key
    pub owns_key: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefTy {
    Primitive(Type),

    /// One-to-one reference to the model with this name
    Model(String),
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> ModelDef {
        ModelDef {
            name: name.into(),
            table_name: None,
            fields: vec![],
        }
    }

    pub fn table_name(mut self, name: impl Into<String>) -> ModelDef {
        self.table_name = Some(name.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> ModelDef {
        self.fields.push(field);
        self
    }
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: Type) -> FieldDef {
        FieldDef::with_ty(name, FieldDefTy::Primitive(ty))
    }

    pub fn reference(name: impl Into<String>, model: impl Into<String>) -> FieldDef {
        FieldDef::with_ty(name, FieldDefTy::Model(model.into()))
    }

    fn with_ty(name: impl Into<String>, ty: FieldDefTy) -> FieldDef {
        FieldDef {
            name: name.into(),
            ty,
            primary_key: false,
            default: None,
            nullable: false,
            auto: false,
            owns_key: None,
        }
    }

    pub fn primary_key(mut self) -> FieldDef {
        self.primary_key = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> FieldDef {
        self.default = Some(value.into());
        self
    }

    pub fn nullable(mut self) -> FieldDef {
        self.nullable = true;
        self
    }

    pub fn auto(mut self) -> FieldDef {
        self.auto = true;
        self
    }

    pub fn owns_key(mut self, owns_key: bool) -> FieldDef {
        self.owns_key = Some(owns_key);
        self
    }
}
