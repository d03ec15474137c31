mod expr;
pub use expr::Expr;

mod expr_and;
pub use expr_and::ExprAnd;

mod expr_binary_op;
pub use expr_binary_op::ExprBinaryOp;

mod expr_field;
pub use expr_field::ExprField;

mod expr_func;
pub use expr_func::{ExprFunc, FuncContains, FuncLower};

mod expr_or;
pub use expr_or::ExprOr;

mod op_binary;
pub use op_binary::BinaryOp;

mod ty;
pub use ty::Type;

mod value;
pub use value::Value;

mod value_chrono;

pub mod visit;
pub use visit::Visit;

pub mod visit_mut;
pub use visit_mut::VisitMut;

/// Shorthand for [`Expr::field`].
pub fn field(name: impl Into<String>) -> Expr {
    Expr::field(name)
}
