//! Backend-agnostic transaction handle.
//!
//! Wraps one `backend::TxHandle` and adds the two things no driver needs to
//! know about: liveness tracking (so a `Cursor`/`Recmap`/`Index` used after
//! its transaction ended fails with `InvalidTransaction` instead of calling
//! into a driver that may have already released the underlying lock scope
//! or savepoint) and the deferred-deletion protocol: recmaps/
//! indexes created with "delayed deletion" are only actually destroyed at
//! commit, and never at all if the transaction aborts.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use backend::{BackendIndex, BackendRecmap, BackendTransaction};
use environment::Environment;
use error::Result;

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// A transaction, nestable one level deep per backend: a
/// savepoint on the SQL driver, an independent lock scope on the embedded
/// driver.
pub struct RecTransaction {
	env: Environment,
	id: u64,
	backend_tx: Arc<BackendTransaction>,
	ended: Arc<AtomicBool>,
	created_recmaps: Mutex<Vec<Arc<BackendRecmap>>>,
	created_indexes: Mutex<Vec<Arc<BackendIndex>>>,
	deferred_recmaps: Mutex<Vec<Arc<BackendRecmap>>>,
	deferred_indexes: Mutex<Vec<Arc<BackendIndex>>>,
}

impl RecTransaction {
	pub(crate) fn begin(env: Environment, parent: Option<&RecTransaction>) -> Result<RecTransaction> {
		let parent_backend = parent.map(|p| &*p.backend_tx);
		let backend_tx = env.backend().begin_tx(parent_backend)?;
		Ok(RecTransaction {
			env: env,
			id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
			backend_tx: Arc::from(backend_tx),
			ended: Arc::new(AtomicBool::new(false)),
			created_recmaps: Mutex::new(Vec::new()),
			created_indexes: Mutex::new(Vec::new()),
			deferred_recmaps: Mutex::new(Vec::new()),
			deferred_indexes: Mutex::new(Vec::new()),
		})
	}

	/// The owning environment.
	pub fn environment(&self) -> &Environment {
		&self.env
	}

	/// A process-unique identifier for this transaction, stable for its
	/// whole lifetime; has no relation to the backend's own transaction id.
	pub fn id(&self) -> u64 {
		self.id
	}

	pub(crate) fn as_backend(&self) -> &BackendTransaction {
		&*self.backend_tx
	}

	pub(crate) fn as_backend_arc(&self) -> Arc<BackendTransaction> {
		self.backend_tx.clone()
	}

	pub(crate) fn ended_flag(&self) -> Arc<AtomicBool> {
		self.ended.clone()
	}

	pub(crate) fn ensure_active(&self) -> Result<()> {
		if self.ended.load(Ordering::SeqCst) {
			Err(::error::ErrorKind::InvalidTransaction("transaction has already ended".to_owned()).into())
		} else {
			Ok(())
		}
	}

	pub(crate) fn record_created_recmap(&self, recmap: Arc<BackendRecmap>) {
		self.created_recmaps.lock().unwrap().push(recmap);
	}

	pub(crate) fn record_created_index(&self, index: Arc<BackendIndex>) {
		self.created_indexes.lock().unwrap().push(index);
	}

	pub(crate) fn schedule_recmap_deletion(&self, recmap: Arc<BackendRecmap>) {
		self.deferred_recmaps.lock().unwrap().push(recmap);
	}

	pub(crate) fn schedule_index_deletion(&self, index: Arc<BackendIndex>) {
		self.deferred_indexes.lock().unwrap().push(index);
	}

	/// Commits the transaction: first destroys anything scheduled for
	/// delayed deletion, then commits the backend transaction itself.
	pub fn commit(self) -> Result<()> {
		self.ended.store(true, Ordering::SeqCst);
		for index in self.deferred_indexes.into_inner().unwrap() {
			index.destroy(&*self.backend_tx)?;
		}
		for recmap in self.deferred_recmaps.into_inner().unwrap() {
			recmap.destroy(&*self.backend_tx)?;
		}
		self.backend_tx.commit()
	}

	/// Aborts the transaction: undoes every recmap/index created during its
	/// lifetime, discards the
	/// deferred-deletion lists untouched, and aborts the backend
	/// transaction. Best-effort: a failure undoing one created object does
	/// not stop the rest from being cleaned up.
	pub fn abort(self) -> Result<()> {
		self.ended.store(true, Ordering::SeqCst);
		for index in self.created_indexes.into_inner().unwrap() {
			let _ = index.destroy(&*self.backend_tx);
		}
		for recmap in self.created_recmaps.into_inner().unwrap() {
			let _ = recmap.destroy(&*self.backend_tx);
		}
		self.backend_tx.abort()
	}
}
