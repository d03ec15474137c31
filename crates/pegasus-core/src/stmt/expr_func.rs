use super::Expr;

/// A scalar function call expression.
///
/// ```text
/// lower(title)               // Unicode lowercase of `title`
/// contains(title, "cap")     // `title` contains the substring "cap"
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ExprFunc {
    /// Full Unicode lowercase mapping of a text operand.
    Lower(FuncLower),

    /// Substring containment, case sensitive.
    Contains(FuncContains),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncLower {
    pub expr: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncContains {
    pub haystack: Box<Expr>,
    pub needle: Box<Expr>,
}

impl Expr {
    pub fn lower(self) -> Expr {
        ExprFunc::Lower(FuncLower {
            expr: Box::new(self),
        })
        .into()
    }

    pub fn contains(self, needle: impl Into<Expr>) -> Expr {
        ExprFunc::Contains(FuncContains {
            haystack: Box::new(self),
            needle: Box::new(needle.into()),
        })
        .into()
    }
}

impl From<ExprFunc> for Expr {
    fn from(value: ExprFunc) -> Self {
        Self::Func(value)
    }
}
