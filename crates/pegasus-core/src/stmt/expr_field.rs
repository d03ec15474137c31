use super::Expr;

/// A reference to a model field by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprField {
    pub name: String,
}

impl From<ExprField> for Expr {
    fn from(value: ExprField) -> Self {
        Self::Field(value)
    }
}
