//! The pluggable record-layer interface and its two concrete drivers.
//!
//! Every type above this module (`Recmap`, `Index`, `Cursor`,
//! `RecTransaction`, `Sequence`, `Environment`) is a thin, backend-agnostic
//! facade over one boxed trait object from here. This is the re-expression
//! of the original's per-struct function-pointer vtables: one
//! trait per concept, one implementation per backend, selected once at
//! `Environment::open` and never branched on again.

pub mod bdb;
pub mod pg;

use error::Result;
use field::{Comparator, FieldInfo};
use object::Object;

/// Flags accepted by `BackendEnvironment::create_recmap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecmapCreateFlags {
	/// Iteration must follow `compare_fields`' order rather than storage
	/// order.
	pub ordered: bool,
	/// Primary-key uniqueness is enforced on insert/update.
	pub unique: bool,
}

/// Flags accepted by `BackendEnvironment::create_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexCreateFlags {
	/// Secondary-key uniqueness is enforced.
	pub unique: bool,
	/// Iteration follows `compare_fields`' order.
	pub ordered: bool,
}

/// A boxed, backend-native transaction handle. Opaque to everything above
/// this module; passed back into every other trait method unchanged.
pub type TxHandle = Box<BackendTransaction>;

/// One backend's top-level connection, returning boxed recmaps/indexes/
/// sequences/transactions that all share this environment's lifetime.
pub trait BackendEnvironment {
	/// Begins a new top-level (if `parent` is `None`) or nested transaction.
	fn begin_tx(&self, parent: Option<&BackendTransaction>) -> Result<TxHandle>;

	/// Creates a new, empty recmap.
	fn create_recmap(
		&self,
		name: Option<&str>,
		field_info: &[FieldInfo],
		key_field_count: usize,
		compare: Option<Comparator>,
		flags: RecmapCreateFlags,
		tx: &BackendTransaction,
	) -> Result<Box<BackendRecmap>>;

	/// Opens an existing recmap.
	fn open_recmap(
		&self,
		name: &str,
		field_info: &[FieldInfo],
		key_field_count: usize,
		tx: &BackendTransaction,
	) -> Result<Box<BackendRecmap>>;

	/// Creates a secondary index over an already-open recmap.
	fn create_index(
		&self,
		recmap: &BackendRecmap,
		name: Option<&str>,
		field_nos: &[usize],
		compare: Option<Comparator>,
		flags: IndexCreateFlags,
		tx: &BackendTransaction,
	) -> Result<Box<BackendIndex>>;

	/// Opens an existing secondary index.
	fn open_index(
		&self,
		recmap: &BackendRecmap,
		name: &str,
		field_nos: &[usize],
		tx: &BackendTransaction,
	) -> Result<Box<BackendIndex>>;

	/// Creates a new sequence counter, initialised at zero.
	fn create_sequence(&self, name: &str, tx: &BackendTransaction) -> Result<Box<BackendSequence>>;

	/// Opens an existing sequence counter.
	fn open_sequence(&self, name: &str, tx: &BackendTransaction) -> Result<Box<BackendSequence>>;

	/// Releases any resources held directly by the environment (connection
	/// pools, mmap'd files not owned by a still-open recmap, etc).
	fn close(&self) -> Result<()>;
}

/// Backend-native primary key/value table.
pub trait BackendRecmap {
	fn insert(&self, key: Vec<u8>, value: Vec<u8>, tx: &BackendTransaction) -> Result<()>;
	fn update(&self, old_key: &[u8], new_key: Option<Vec<u8>>, new_value: Vec<u8>, tx: &BackendTransaction) -> Result<()>;
	fn delete(&self, key: &[u8], tx: &BackendTransaction) -> Result<()>;
	fn get(&self, key: &[u8], tx: &BackendTransaction) -> Result<Option<Vec<u8>>>;
	fn contains(&self, key: &[u8], value: &[u8], tx: &BackendTransaction) -> Result<bool>;
	fn estimated_size(&self, tx: &BackendTransaction) -> Result<u64>;
	fn cursor(&self, writable: bool, tx: &BackendTransaction) -> Result<Box<BackendCursor>>;
	fn close(&self) -> Result<()>;
	/// Destroys the recmap immediately. Deferred-deletion scheduling is the
	/// record layer's responsibility, not the backend's.
	fn destroy(&self, tx: &BackendTransaction) -> Result<()>;

	/// Lets a driver recover its own concrete recmap type out of the trait
	/// object it handed the record layer back earlier (needed by the
	/// embedded driver's `create_index`/`open_index`, which must reach
	/// into the primary's secondary-index registry; see `backend::bdb`).
	fn as_any(&self) -> &::std::any::Any;
}

/// Backend-native secondary index, associated with one primary recmap.
pub trait BackendIndex {
	fn get(&self, key: &[u8], tx: &BackendTransaction) -> Result<Option<Vec<u8>>>;
	fn cursor(&self, tx: &BackendTransaction) -> Result<Box<BackendCursor>>;
	/// Deletes the single primary record whose secondary key is `key`.
	fn delete_rec(&self, key: &[u8], tx: &BackendTransaction) -> Result<()>;
	fn close(&self) -> Result<()>;
	fn destroy(&self, tx: &BackendTransaction) -> Result<()>;
}

/// One raw key/value pair as produced by a backend cursor.
#[derive(Debug, Clone)]
pub struct RawRecord {
	pub key: Vec<u8>,
	pub value: Vec<u8>,
}

/// Backend-native positioned iterator.
///
/// Matches the cursor FSM of the record layer one-to-one; `Cursor` in the
/// record layer is a thin wrapper that additionally tracks the owning
/// transaction's liveness.
pub trait BackendCursor {
	fn first(&mut self) -> Result<Option<RawRecord>>;
	fn next(&mut self, same_key_only: bool) -> Result<Option<RawRecord>>;
	fn prev(&mut self) -> Result<Option<RawRecord>>;
	fn seek(&mut self, key: &[u8], exact: bool) -> Result<Option<RawRecord>>;
	fn current(&self) -> Option<RawRecord>;
	/// Overwrites the value half of the current record.
	fn set_value(&mut self, value: Vec<u8>) -> Result<()>;
	/// Deletes the current record; the cursor becomes unpositioned.
	fn delete(&mut self) -> Result<()>;
	fn close(&mut self) -> Result<()>;
}

/// Backend-native transaction handle.
pub trait BackendTransaction {
	fn commit(&self) -> Result<()>;
	fn abort(&self) -> Result<()>;

	/// Lets a driver recover its own concrete transaction type out of the
	/// trait object the record layer hands back to it (every `tx` a
	/// recmap/index/cursor/sequence method receives was itself produced by
	/// that same driver's `begin_tx`). Re-expresses what a function
	/// pointer vtable would otherwise need a `void *` for.
	fn as_any(&self) -> &::std::any::Any;
}

/// Backend-native monotone counter.
pub trait BackendSequence {
	fn next(&self, tx: &BackendTransaction) -> Result<i64>;
	fn close(&self) -> Result<()>;
	fn destroy(&self, tx: &BackendTransaction) -> Result<()>;
}

/// Which concrete driver an `Environment` was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
	/// The embedded, BerkeleyDB-style driver.
	Bdb,
	/// The SQL-style driver on top of a Postgres connection.
	Pg,
}

/// Placeholder used where an `Object`-level value, rather than its encoded
/// bytes, must be threaded through a backend call (index key extraction
/// for the BDB-style driver's associated-secondary callback).
pub type ExtractedKey = Vec<Object>;
