use super::{BinaryOp, ExprAnd, ExprBinaryOp, ExprField, ExprFunc, ExprOr, Value};
use crate::schema::db::ColumnId;

/// A filter predicate or one of its operands.
///
/// Callers build expressions over field names. Before a query reaches a
/// driver, field references are lowered to [`Expr::Column`] references of
/// the model's table.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// AND a set of binary expressions
    And(ExprAnd),

    /// Binary comparison
    BinaryOp(ExprBinaryOp),

    /// References a column of the table being queried
    Column(ColumnId),

    /// References a field of the model being queried
    Field(ExprField),

    /// A scalar function call
    Func(ExprFunc),

    /// OR a set of binary expressions
    Or(ExprOr),

    /// A literal value
    Value(Value),
}

impl Expr {
    pub fn field(name: impl Into<String>) -> Expr {
        ExprField { name: name.into() }.into()
    }

    pub fn column(id: impl Into<ColumnId>) -> Expr {
        Expr::Column(id.into())
    }

    pub fn null() -> Expr {
        Expr::Value(Value::Null)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Expr::Value(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expr::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Expr::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if the expression still references model fields.
    pub fn references_fields(&self) -> bool {
        struct FindField(bool);

        impl super::Visit for FindField {
            fn visit_expr_field(&mut self, _: &ExprField) {
                self.0 = true;
            }
        }

        let mut find = FindField(false);
        super::Visit::visit_expr(&mut find, self);
        find.0
    }

    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(self, BinaryOp::Eq, rhs)
    }

    pub fn ne(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(self, BinaryOp::Ne, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(self, BinaryOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(self, BinaryOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(self, BinaryOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary_op(self, BinaryOp::Ge, rhs)
    }
}

impl<T> From<T> for Expr
where
    Value: From<T>,
{
    fn from(value: T) -> Expr {
        Expr::Value(Value::from(value))
    }
}
