use pegasus_core::{
    bail,
    driver::ColumnValues,
    schema::db::{self, ColumnId, Table},
    stmt::{self, Expr, ExprFunc, Value},
    Result,
};

use std::fmt::Write;

/// Name of the scalar function providing full Unicode lowercase.
pub(crate) const LOWER_FUNCTION: &str = "pegasus_lower";

/// Name of the table recording the schema of every created table.
pub(crate) const MIGRATION_TABLE: &str = "pegasus_migration";

/// A SQL string and its positional parameters.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Statement {
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
}

/// Serializes statements against a single table.
pub(crate) struct Serializer<'a> {
    table: &'a Table,
    dst: Statement,
}

impl<'a> Serializer<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Serializer {
            table,
            dst: Statement::default(),
        }
    }

    pub(crate) fn create_table(mut self) -> Statement {
        let table = self.table;
        let composite_key = table.primary_key.len() > 1;

        self.push("CREATE TABLE IF NOT EXISTS ");
        self.ident(&table.name);
        self.push(" (");

        for (i, column) in table.columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }

            self.ident(&column.name);
            self.push(" ");
            self.push(ty(column.ty));

            if column.primary_key && !composite_key {
                self.push(" PRIMARY KEY");
                if column.auto_increment {
                    self.push(" AUTOINCREMENT");
                }
            } else if !column.nullable {
                self.push(" NOT NULL");
            }

            // One-to-one: a key is held by at most one row
            if column.is_foreign_key() {
                self.push(" UNIQUE");
            }
        }

        if composite_key {
            self.push(", PRIMARY KEY (");
            for (i, column) in table.primary_key_columns().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.ident(&column.name);
            }
            self.push(")");
        }

        self.push(")");
        self.dst
    }

    /// Selects every column of the table, in table order.
    pub(crate) fn select(
        mut self,
        query: Option<&Expr>,
        filters: &ColumnValues,
        limit: Option<usize>,
    ) -> Result<Statement> {
        let table = self.table;

        self.push("SELECT ");
        self.all_columns();
        self.push(" FROM ");
        self.ident(&table.name);
        self.filter(query, filters)?;

        if let Some(limit) = limit {
            let _ = write!(self.dst.sql, " LIMIT {limit}");
        }

        Ok(self.dst)
    }

    /// Inserts `values` and returns the complete row.
    pub(crate) fn insert(mut self, values: &ColumnValues) -> Result<Statement> {
        let table = self.table;

        self.push("INSERT INTO ");
        self.ident(&table.name);

        if values.is_empty() {
            self.push(" DEFAULT VALUES");
        } else {
            self.push(" (");
            let columns: Vec<_> = values.keys().copied().collect();
            self.column_list(&columns)?;
            self.push(") VALUES (");
            for (i, value) in values.values().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.param(value.clone());
            }
            self.push(")");
        }

        self.push(" RETURNING ");
        self.all_columns();
        Ok(self.dst)
    }

    pub(crate) fn update(
        mut self,
        key: &ColumnValues,
        column: ColumnId,
        value: &Value,
    ) -> Result<Statement> {
        let table = self.table;

        self.push("UPDATE ");
        self.ident(&table.name);
        self.push(" SET ");
        self.column(column)?;
        self.push(" = ");
        self.param(value.clone());
        self.filter(None, key)?;
        Ok(self.dst)
    }

    pub(crate) fn delete(mut self, key: &ColumnValues) -> Result<Statement> {
        let table = self.table;

        self.push("DELETE FROM ");
        self.ident(&table.name);
        self.filter(None, key)?;
        Ok(self.dst)
    }

    fn filter(&mut self, query: Option<&Expr>, filters: &ColumnValues) -> Result<()> {
        if query.is_none() && filters.is_empty() {
            return Ok(());
        }

        self.push(" WHERE ");
        let mut first = true;

        for (column, value) in filters {
            if !first {
                self.push(" AND ");
            }
            first = false;

            self.column(*column)?;
            if value.is_null() {
                self.push(" IS NULL");
            } else {
                self.push(" = ");
                self.param(value.clone());
            }
        }

        if let Some(query) = query {
            if !first {
                self.push(" AND ");
            }
            self.expr(query)?;
        }

        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        use stmt::Expr::*;

        match expr {
            And(expr) => self.delimited(&expr.operands, " AND "),
            Or(expr) => self.delimited(&expr.operands, " OR "),
            BinaryOp(expr) => {
                // SQL comparisons with NULL are never true
                let (operand, null_side) = match (expr.lhs.is_null(), expr.rhs.is_null()) {
                    (false, true) => (&*expr.lhs, true),
                    (true, false) => (&*expr.rhs, true),
                    _ => (&*expr.lhs, false),
                };

                if null_side {
                    self.expr(operand)?;
                    return match expr.op {
                        stmt::BinaryOp::Eq => {
                            self.push(" IS NULL");
                            Ok(())
                        }
                        stmt::BinaryOp::Ne => {
                            self.push(" IS NOT NULL");
                            Ok(())
                        }
                        op => bail!("cannot compare with NULL using `{op}`"),
                    };
                }

                self.expr(&expr.lhs)?;
                let _ = write!(self.dst.sql, " {} ", expr.op);
                self.expr(&expr.rhs)
            }
            Column(column) => self.column(*column),
            Field(field) => bail!(
                "field `{}` must be resolved to a column before reaching the driver",
                field.name
            ),
            Func(ExprFunc::Lower(func)) => {
                self.push(LOWER_FUNCTION);
                self.push("(");
                self.expr(&func.expr)?;
                self.push(")");
                Ok(())
            }
            Func(ExprFunc::Contains(func)) => {
                self.push("instr(");
                self.expr(&func.haystack)?;
                self.push(", ");
                self.expr(&func.needle)?;
                self.push(") > 0");
                Ok(())
            }
            Value(value) => {
                self.param(value.clone());
                Ok(())
            }
        }
    }

    fn delimited(&mut self, operands: &[Expr], sep: &str) -> Result<()> {
        self.push("(");
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            self.expr(operand)?;
        }
        self.push(")");
        Ok(())
    }

    fn column(&mut self, id: ColumnId) -> Result<()> {
        let table = self.table;

        if id.table != table.id || id.index >= table.columns.len() {
            bail!("{id:?} is not a column of table `{}`", table.name);
        }

        self.ident(&table.column(id).name);
        Ok(())
    }

    fn column_list(&mut self, columns: &[ColumnId]) -> Result<()> {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.column(*column)?;
        }
        Ok(())
    }

    fn all_columns(&mut self) {
        let table = self.table;
        for (i, column) in table.columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(&column.name);
        }
    }

    fn ident(&mut self, name: &str) {
        self.dst.sql.push('"');
        self.dst.sql.push_str(&name.replace('"', "\"\""));
        self.dst.sql.push('"');
    }

    fn param(&mut self, value: Value) {
        self.dst.params.push(value);
        let _ = write!(self.dst.sql, "?{}", self.dst.params.len());
    }

    fn push(&mut self, sql: &str) {
        self.dst.sql.push_str(sql);
    }
}

fn ty(ty: db::Type) -> &'static str {
    match ty {
        db::Type::Integer => "INTEGER",
        db::Type::Real => "REAL",
        db::Type::Text => "TEXT",
        db::Type::Blob => "BLOB",
        db::Type::Date => "DATE",
        db::Type::Timestamp => "TIMESTAMP",
    }
}
