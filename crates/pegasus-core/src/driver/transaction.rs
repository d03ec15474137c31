use crate::{Error, Result};

use std::{borrow::Cow, fmt};

/// Identifies a transaction for the lifetime of a database.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

/// A transaction as seen by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,

    /// Set for nested transactions, which map to savepoints
    pub parent: Option<TransactionId>,
}

impl Transaction {
    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }
}

/// Tracks open transactions and generates the BEGIN/SAVEPOINT/COMMIT/
/// ROLLBACK statements for them.
///
/// Savepoints are numbered from a counter that never goes back, so a
/// name is never reused by the same engine. Only the innermost open
/// transaction may be finished.
#[derive(Debug, Default)]
pub struct Savepoints {
    next: u64,

    /// Open transactions, outermost first, with their savepoint number
    stack: Vec<(TransactionId, Option<u64>)>,
}

impl Savepoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn begin(&mut self, txn: &Transaction) -> Result<Cow<'static, str>> {
        let innermost = self.stack.last().map(|(id, _)| *id);

        if txn.parent != innermost {
            return Err(Error::invalid_transaction(format!(
                "{:?} does not nest in the innermost open transaction {:?}",
                txn.id, innermost
            )));
        }

        if txn.parent.is_none() {
            self.stack.push((txn.id, None));
            return Ok(Cow::Borrowed("BEGIN"));
        }

        let n = self.next;
        self.next += 1;
        self.stack.push((txn.id, Some(n)));
        Ok(Cow::Owned(format!("SAVEPOINT sp{n}")))
    }

    pub fn commit(&mut self, txn: &Transaction) -> Result<Cow<'static, str>> {
        Ok(match self.pop(txn)? {
            None => Cow::Borrowed("COMMIT"),
            Some(n) => Cow::Owned(format!("RELEASE SAVEPOINT sp{n}")),
        })
    }

    /// A rolled back savepoint is released too, leaving the stack as it
    /// was before `begin`.
    pub fn rollback(&mut self, txn: &Transaction) -> Result<Cow<'static, str>> {
        Ok(match self.pop(txn)? {
            None => Cow::Borrowed("ROLLBACK"),
            Some(n) => Cow::Owned(format!(
                "ROLLBACK TO SAVEPOINT sp{n}; RELEASE SAVEPOINT sp{n}"
            )),
        })
    }

    fn pop(&mut self, txn: &Transaction) -> Result<Option<u64>> {
        match self.stack.last() {
            Some((id, n)) if *id == txn.id => {
                let n = *n;
                self.stack.pop();
                Ok(n)
            }
            _ => Err(Error::invalid_transaction(format!(
                "{:?} is not the innermost open transaction",
                txn.id
            ))),
        }
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "TransactionId({})", self.0)
    }
}
