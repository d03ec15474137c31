use crate::{Db, Instance, Result};

use pegasus_core::{
    bail, err,
    schema::app::{self, ModelId, Operation},
    stmt::{visit_mut, Expr, Value, VisitMut},
    Error,
};
use std::cell::OnceCell;
use tracing::debug;

/// A lazy selection of instances.
///
/// Building and refining a query never touches storage. The first
/// iteration runs it once and keeps the instances; later iterations reuse
/// them, so a fresh query is needed to observe later changes.
pub struct Query<'db> {
    db: &'db Db,
    model: ModelId,
    expr: Option<Expr>,
    filters: Vec<(String, Value)>,
    results: OnceCell<Vec<Instance>>,
}

impl<'db> Query<'db> {
    pub(crate) fn new(db: &'db Db, model: ModelId, expr: Option<Expr>) -> Query<'db> {
        Query {
            db,
            model,
            expr,
            filters: vec![],
            results: OnceCell::new(),
        }
    }

    /// Adds an equality filter on the field named `field`.
    pub fn filter_by(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self.results = OnceCell::new();
        self
    }

    /// Narrows the query with another predicate.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.expr = Some(match self.expr.take() {
            Some(current) => current.and(expr),
            None => expr,
        });
        self.results = OnceCell::new();
        self
    }

    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    /// Runs the query on first call; returns the cached instances after.
    pub fn exec(&self) -> Result<&[Instance]> {
        if let Some(results) = self.results.get() {
            return Ok(results);
        }

        let results = self.load()?;
        Ok(self.results.get_or_init(|| results))
    }

    pub fn iter(&self) -> Result<std::slice::Iter<'_, Instance>> {
        Ok(self.exec()?.iter())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.exec()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.exec()?.is_empty())
    }

    pub fn contains(&self, instance: &Instance) -> Result<bool> {
        Ok(self.exec()?.contains(instance))
    }

    /// Runs the query and returns the instances.
    pub fn to_vec(&self) -> Result<Vec<Instance>> {
        Ok(self.exec()?.to_vec())
    }

    fn load(&self) -> Result<Vec<Instance>> {
        self.db.ensure_open()?;

        let schema = &self.db.schema;
        let model = schema.model(self.model);

        let expr = match &self.expr {
            Some(expr) => Some(lower(schema, model, expr.clone())?),
            None => None,
        };

        let bound = model.bind(
            self.filters.iter().map(|(k, v)| (k, v.clone())),
            Operation::Portion,
        )?;
        let Some(filters) = self.db.prepare_filters(model, &bound.values)? else {
            debug!(model = %model.name, ?expr, "select (no counterpart)");
            return Ok(vec![]);
        };

        debug!(model = %model.name, ?expr, ?filters, "select");

        let rows = self.db.driver.borrow_mut().select_rows(
            schema.table_for(model),
            expr.as_ref(),
            &filters,
        )?;

        rows.into_iter()
            .map(|row| self.db.materialize(self.model, row))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Query<'_> {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    /// Iterates the results, which are empty if the query failed.
    ///
    /// Use [`Query::exec`] to observe the error.
    fn into_iter(self) -> Self::IntoIter {
        match self.exec() {
            Ok(results) => results.iter(),
            Err(err) => {
                tracing::warn!(error = %err, "query failed");
                [].iter()
            }
        }
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.db.schema.model(self.model).name)
            .field("expr", &self.expr)
            .field("filters", &self.filters)
            .field("loaded", &self.results.get().is_some())
            .finish()
    }
}

/// Replaces field references with the columns storing them.
fn lower(schema: &pegasus_core::Schema, model: &app::Model, mut expr: Expr) -> Result<Expr> {
    struct LowerFields<'a> {
        schema: &'a pegasus_core::Schema,
        model: &'a app::Model,
        error: Option<Error>,
    }

    impl VisitMut for LowerFields<'_> {
        fn visit_expr_mut(&mut self, expr: &mut Expr) {
            let Expr::Field(field) = expr else {
                visit_mut::visit_expr_mut(self, expr);
                return;
            };

            let lowered = self
                .model
                .find_field(&field.name)
                .and_then(|field| {
                    self.schema
                        .mapping_for(self.model)
                        .column_for(field.id)
                        .ok_or_else(|| {
                            err!(
                                "model {}: `{}` is stored by the other side of the relation \
                                 and cannot be used in a query, filter on the other model",
                                self.model.name,
                                field.name
                            )
                        })
                });

            match lowered {
                Ok(column) => *expr = Expr::Column(column),
                Err(err) => {
                    self.error.get_or_insert(err);
                }
            }
        }
    }

    let mut lower = LowerFields {
        schema,
        model,
        error: None,
    };
    lower.visit_expr_mut(&mut expr);

    if let Some(err) = lower.error {
        return Err(err);
    }

    if expr.references_fields() {
        bail!("model {}: query still references fields", model.name);
    }

    Ok(expr)
}
