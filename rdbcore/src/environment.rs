//! The top-level environment handle.
//!
//! A thin, cloneable facade over one boxed [`backend::BackendEnvironment`]
//! chosen once at open time: one trait, two impls, selected at
//! environment-open time and never branched on again. Cloning an
//! `Environment` shares the same
//! backend connection; every `Recmap`/`Index`/`Cursor`/`RecTransaction`/
//! `Sequence` built from it keeps its own clone so none of them need a
//! borrowed lifetime back to a single owner.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use backend::bdb::BdbOptions;
use backend::pg::PgOptions;
use backend::{self, BackendEnvironment, BackendKind};
use error::Result;
use transaction::RecTransaction;

/// Configures how verbosely recmap/index lifecycle events are logged.
///
/// Trace level 0 is silent; level >= 1 logs one line per recmap or index
/// create/delete at `log::Level::Info` through the `"rdbcore::trace"` target
/// -- an embedder wires that target to stderr (or anywhere else) through its
/// own logger configuration rather than this crate writing to stderr
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TraceLevel(pub u32);

impl TraceLevel {
	/// No tracing.
	pub const OFF: TraceLevel = TraceLevel(0);

	/// True if this level enables the create/delete trace line.
	pub fn enabled(self) -> bool {
		self.0 >= 1
	}
}

struct EnvironmentInner {
	backend: Box<BackendEnvironment>,
	kind: BackendKind,
	trace_level: AtomicU32,
}

/// The top-level record-layer handle: a backend connection plus the
/// configuration every operation above it reads. Deliberately carries no
/// back-reference to an owning interpreter or query layer -- that belongs
/// above this crate, not inside it.
#[derive(Clone)]
pub struct Environment {
	inner: Arc<EnvironmentInner>,
}

impl Environment {
	fn new(backend: Box<BackendEnvironment>, kind: BackendKind) -> Environment {
		Environment { inner: Arc::new(EnvironmentInner { backend: backend, kind: kind, trace_level: AtomicU32::new(0) }) }
	}

	/// Opens the embedded, BerkeleyDB-style driver.
	pub fn open_bdb(options: BdbOptions) -> Result<Environment> {
		let backend = backend::bdb::BdbEnvironment::open(options)?;
		info!("opened embedded environment");
		Ok(Environment::new(Box::new(backend), BackendKind::Bdb))
	}

	/// Opens the SQL-style driver against a Postgres server.
	pub fn open_pg(options: PgOptions) -> Result<Environment> {
		let backend = backend::pg::PgEnvironment::open(options)?;
		info!("opened sql environment");
		Ok(Environment::new(Box::new(backend), BackendKind::Pg))
	}

	/// Which concrete driver this environment was opened with.
	pub fn kind(&self) -> BackendKind {
		self.inner.kind
	}

	/// The current trace level.
	pub fn trace_level(&self) -> TraceLevel {
		TraceLevel(self.inner.trace_level.load(Ordering::Relaxed))
	}

	/// Reconfigures the trace level.
	pub fn set_trace_level(&self, level: TraceLevel) {
		self.inner.trace_level.store(level.0, Ordering::Relaxed);
	}

	pub(crate) fn backend(&self) -> &BackendEnvironment {
		&*self.inner.backend
	}

	/// Begins a new top-level transaction.
	pub fn begin(&self) -> Result<RecTransaction> {
		RecTransaction::begin(self.clone(), None)
	}

	/// Begins a transaction nested under `parent` (a savepoint on the SQL
	/// driver, a second lock scope on the embedded driver).
	pub fn begin_nested(&self, parent: &RecTransaction) -> Result<RecTransaction> {
		RecTransaction::begin(self.clone(), Some(parent))
	}

	/// Releases resources held directly by the environment.
	pub fn close(&self) -> Result<()> {
		self.inner.backend.close()
	}
}
