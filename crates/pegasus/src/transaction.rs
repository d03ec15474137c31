use crate::{identity_map::IdentityMap, instance::InstanceState, Db, Instance, Result};

use by_address::ByAddress;
use indexmap::IndexMap;
use pegasus_core::{
    driver::{self, TransactionId},
    stmt::Value,
    Error,
};
use std::rc::Rc;
use tracing::{debug, warn};

/// An active transaction.
///
/// Returned by [`Db::begin`]. Finish it with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback); if dropped unfinished, including while
/// unwinding, it is rolled back.
pub struct Transaction<'db> {
    db: &'db Db,
    id: TransactionId,
    finished: bool,
}

/// The stack of open transactions of a database.
#[derive(Debug, Default)]
pub(crate) struct Transactions {
    next_id: u64,
    stack: Vec<Frame>,
}

#[derive(Debug)]
struct Frame {
    txn: driver::Transaction,

    /// State of every instance touched, as of its first touch
    snapshots: IndexMap<ByAddress<Rc<InstanceState>>, Snapshot>,

    /// Instances created while the frame was open
    created: Vec<Instance>,
}

#[derive(Debug)]
struct Snapshot {
    values: Vec<Value>,
    deleted: bool,
}

impl<'db> Transaction<'db> {
    pub(crate) fn begin(db: &'db Db) -> Result<Transaction<'db>> {
        let id = db.begin_frame()?;
        Ok(Transaction {
            db,
            id,
            finished: false,
        })
    }

    /// Commits the transaction, or releases its savepoint when nested.
    ///
    /// Fails if a transaction nested in this one is still open; both are
    /// then rolled back.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.db.commit_frame(self.id)
    }

    /// Rolls back storage and in-memory changes made since `begin`,
    /// including those of nested transactions still open.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.db.rollback_frame(self.id)
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if let Err(err) = self.db.rollback_frame(self.id) {
            warn!(txn = ?self.id, error = %err, "rollback of dropped transaction failed");
        }
    }
}

impl Transactions {
    pub(crate) fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    fn push(&mut self) -> driver::Transaction {
        let id = TransactionId(self.next_id);
        self.next_id += 1;

        let txn = driver::Transaction {
            id,
            parent: self.stack.last().map(|frame| frame.txn.id),
        };

        self.stack.push(Frame {
            txn,
            snapshots: IndexMap::new(),
            created: vec![],
        });

        txn
    }

    fn is_open(&self, id: TransactionId) -> bool {
        self.stack.iter().any(|frame| frame.txn.id == id)
    }

    fn innermost(&self, id: TransactionId) -> Result<driver::Transaction> {
        match self.stack.last() {
            Some(frame) if frame.txn.id == id => Ok(frame.txn),
            _ => Err(Error::invalid_transaction(format!(
                "{id:?} is not the innermost open transaction"
            ))),
        }
    }

    /// Records the state of `instance` before its first change in the
    /// current transaction. Later touches keep the first snapshot.
    pub(crate) fn touch(&mut self, instance: &Instance) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };

        frame
            .snapshots
            .entry(ByAddress(instance.state().clone()))
            .or_insert_with(|| Snapshot {
                values: instance.snapshot(),
                deleted: instance.is_deleted(),
            });
    }

    pub(crate) fn created(&mut self, instance: &Instance) {
        if let Some(frame) = self.stack.last_mut() {
            frame.created.push(instance.clone());
        }
    }

    /// Hands the bookkeeping of a committed nested frame to its parent.
    fn merge_into_parent(&mut self, frame: Frame) {
        let Some(parent) = self.stack.last_mut() else {
            return;
        };

        for (instance, snapshot) in frame.snapshots {
            parent.snapshots.entry(instance).or_insert(snapshot);
        }
        parent.created.extend(frame.created);
    }
}

impl Frame {
    /// Replays the snapshots into memory without touching storage.
    fn restore(self, identity: &mut IdentityMap) {
        for (state, snapshot) in self.snapshots {
            let instance = Instance::from_state(state.0);
            let model = instance.model_id();

            let current_key = instance.key();
            identity.evict(model, &current_key, &instance);

            instance.restore(snapshot.values, snapshot.deleted);

            if !snapshot.deleted {
                identity.set(model, instance.key(), &instance);
            }
        }

        for instance in self.created {
            identity.evict(instance.model_id(), &instance.key(), &instance);
            instance.mark_deleted();
        }
    }
}

impl Db {
    /// Begins a transaction, nested in the current one if any.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Runs `f` in a transaction.
    ///
    /// The transaction commits when `f` returns `Ok`. When `f` fails, it is
    /// rolled back and the error of `f` is returned unchanged.
    ///
    /// ```ignore
    /// db.transaction(|db| {
    ///     db.set(&ford, "price", 12000)?;
    ///     db.create("Car", [("name", "Fiat")])?;
    ///     Ok::<_, pegasus::Error>(())
    /// })?;
    /// ```
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Db) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let txn = self.begin()?;

        match f(self) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback() {
                    warn!(error = %rollback_err, "rollback failed, returning the original error");
                }
                Err(err)
            }
        }
    }

    /// True while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.transactions.borrow().is_active()
    }

    fn begin_frame(&self) -> Result<TransactionId> {
        self.ensure_open()?;

        let txn = self.transactions.borrow_mut().push();
        debug!(txn = ?txn.id, nested = txn.is_nested(), "begin transaction");

        if let Err(err) = self.driver.borrow_mut().begin_transaction(&txn) {
            self.transactions.borrow_mut().stack.pop();
            return Err(err);
        }

        Ok(txn.id)
    }

    /// Commits the innermost transaction `id`.
    ///
    /// Committing a transaction with nested ones still open fails; `id`
    /// and everything nested in it is rolled back, so the stack is never
    /// left with a frame no guard can finish.
    fn commit_frame(&self, id: TransactionId) -> Result<()> {
        let innermost = self.transactions.borrow().innermost(id);
        let txn = match innermost {
            Ok(txn) => txn,
            Err(err) => {
                if let Err(rollback_err) = self.rollback_frame(id) {
                    warn!(txn = ?id, error = %rollback_err, "rollback after misordered commit failed");
                }
                return Err(err);
            }
        };
        debug!(txn = ?txn.id, nested = txn.is_nested(), "commit transaction");

        if let Err(err) = self.driver.borrow_mut().commit_transaction(&txn) {
            // The frame is still open in storage; undo it so both sides agree.
            if let Err(rollback_err) = self.rollback_frame(id) {
                warn!(txn = ?id, error = %rollback_err, "rollback after failed commit failed");
            }
            return Err(err);
        }

        let mut transactions = self.transactions.borrow_mut();
        if let Some(frame) = transactions.stack.pop() {
            transactions.merge_into_parent(frame);
        }

        Ok(())
    }

    /// Rolls back `id` along with every transaction nested in it, innermost
    /// first. A transaction no longer open was already rolled back with an
    /// enclosing one.
    fn rollback_frame(&self, id: TransactionId) -> Result<()> {
        if !self.transactions.borrow().is_open(id) {
            return Ok(());
        }

        let mut result = Ok(());

        loop {
            let top = self.transactions.borrow().stack.last().map(|frame| frame.txn);
            let Some(txn) = top else {
                break;
            };
            debug!(txn = ?txn.id, nested = txn.is_nested(), "rollback transaction");

            let rolled_back = self.driver.borrow_mut().rollback_transaction(&txn);

            // Memory is restored even if storage failed, and the frame is
            // gone either way.
            let frame = self.transactions.borrow_mut().stack.pop();
            if let Some(frame) = frame {
                frame.restore(&mut self.identity.borrow_mut());
            }

            if let Err(err) = rolled_back {
                if result.is_ok() {
                    result = Err(err);
                }
            }

            if txn.id == id {
                break;
            }
        }

        result
    }

    pub(crate) fn touch(&self, instance: &Instance) {
        self.transactions.borrow_mut().touch(instance);
    }
}
