//! Embedded-driver transaction handle.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use error::Result;

use super::locks::{LockManager, TxId};
use super::recmap::BdbRecmapInner;

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// One write's inverse, recorded so `abort` can undo it. Pushed by
/// `BdbRecmap`/`BdbIndex` after every successful mutation and applied in
/// reverse (LIFO) order on abort, so a sequence of writes to the same key
/// unwinds correctly regardless of how they overlap.
pub enum UndoOp {
	/// Undoes an insert: remove the row (and its secondary-index
	/// projections) entirely.
	Insert { recmap: Arc<BdbRecmapInner>, key: Vec<u8> },
	/// Undoes a delete: put the row (and its secondary-index projections)
	/// back.
	Delete { recmap: Arc<BdbRecmapInner>, key: Vec<u8>, value: Vec<u8> },
	/// Undoes a value-only update: restore the previous value.
	Replace { recmap: Arc<BdbRecmapInner>, key: Vec<u8>, old_value: Vec<u8>, new_value: Vec<u8> },
}

impl UndoOp {
	fn apply(self) {
		match self {
			UndoOp::Insert { recmap, key } => {
				let _ = recmap.delete_key(&key);
			}
			UndoOp::Delete { recmap, key, value } => {
				let _ = recmap.raw_insert(key, value);
			}
			UndoOp::Replace { recmap, key, old_value, new_value } => {
				let _ = recmap.raw_replace_value(&key, &new_value, &old_value);
			}
		}
	}
}

/// A transaction under the embedded driver.
///
/// Nesting has no savepoint analogue here (that is the SQL-style driver's
/// mechanism): a nested `BdbTransaction` is simply a second lock
/// scope that releases its own locks on commit/abort without touching its
/// parent's, because lock ownership is tracked per `TxId` rather than per
/// stack frame. Each transaction (top-level or nested) keeps its own undo
/// log of the writes made through it, so aborting one unwinds exactly its
/// own writes and leaves a parent's already-committed work untouched.
pub struct BdbTransaction {
	id: TxId,
	locks: Arc<LockManager>,
	undo: Mutex<Vec<UndoOp>>,
}

impl BdbTransaction {
	pub fn new(locks: Arc<LockManager>) -> BdbTransaction {
		BdbTransaction { id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst), locks: locks, undo: Mutex::new(Vec::new()) }
	}

	pub fn id(&self) -> TxId {
		self.id
	}

	pub fn locks(&self) -> &LockManager {
		&self.locks
	}

	/// Records the inverse of a write just made through this transaction.
	pub fn push_undo(&self, op: UndoOp) {
		self.undo.lock().push(op);
	}
}

impl ::backend::BackendTransaction for BdbTransaction {
	fn commit(&self) -> Result<()> {
		self.undo.lock().clear();
		self.locks.release_all(self.id);
		Ok(())
	}

	fn abort(&self) -> Result<()> {
		let ops: Vec<UndoOp> = self.undo.lock().drain(..).collect();
		for op in ops.into_iter().rev() {
			op.apply();
		}
		self.locks.release_all(self.id);
		Ok(())
	}

	fn as_any(&self) -> &Any {
		self
	}
}

/// Downcasts a generic backend transaction handle to this driver's
/// concrete type, or fails with `Internal` if a transaction from a
/// different backend was passed in (which would itself be a bug in the
/// record layer, since `Environment` never mixes drivers).
pub fn downcast<'a>(tx: &'a ::backend::BackendTransaction) -> Result<&'a BdbTransaction> {
	tx.as_any().downcast_ref::<BdbTransaction>().ok_or_else(|| {
		::error::ErrorKind::Internal("transaction handle from a different backend".to_owned()).into()
	})
}
