use super::{Column, Table};

use std::collections::HashMap;

/// Column-level differences between a saved table and the current one.
///
/// Columns are matched by name. Only reported: applying them is left to
/// the application.
#[derive(Debug)]
pub struct ColumnsDiff<'a> {
    items: Vec<ColumnsDiffItem<'a>>,
}

#[derive(Debug, PartialEq)]
pub enum ColumnsDiffItem<'a> {
    AddColumn(&'a Column),
    DropColumn(&'a Column),
    AlterColumn { from: &'a Column, to: &'a Column },
}

impl<'a> ColumnsDiff<'a> {
    pub fn from(from: &'a [Column], to: &'a [Column]) -> Self {
        let mut items = vec![];

        let from_map = HashMap::<&str, &'a Column>::from_iter(
            from.iter().map(|from| (from.name.as_str(), from)),
        );
        let to_map =
            HashMap::<&str, &'a Column>::from_iter(to.iter().map(|to| (to.name.as_str(), to)));

        for from in from {
            match to_map.get(from.name.as_str()) {
                Some(to) => {
                    if from.has_diff(to) {
                        items.push(ColumnsDiffItem::AlterColumn { from, to });
                    }
                }
                None => items.push(ColumnsDiffItem::DropColumn(from)),
            }
        }

        for to in to {
            if !from_map.contains_key(to.name.as_str()) {
                items.push(ColumnsDiffItem::AddColumn(to));
            }
        }

        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ColumnsDiffItem<'a>] {
        &self.items
    }
}

impl Table {
    /// Compares a previously saved version of this table to it.
    pub fn diff_from<'a>(&'a self, saved: &'a Table) -> ColumnsDiff<'a> {
        ColumnsDiff::from(&saved.columns, &self.columns)
    }
}

impl std::fmt::Display for ColumnsDiffItem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnsDiffItem::AddColumn(column) => write!(f, "+{}", column.name),
            ColumnsDiffItem::DropColumn(column) => write!(f, "-{}", column.name),
            ColumnsDiffItem::AlterColumn { from, to } => {
                write!(f, "~{} ({:?} -> {:?})", to.name, from.ty, to.ty)
            }
        }
    }
}
