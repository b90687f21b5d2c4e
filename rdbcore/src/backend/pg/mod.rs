//! The SQL-style driver: maps recmaps onto Postgres tables, indexes onto
//! Postgres indexes, cursors onto ordered `SELECT`s, and transactions onto
//! `BEGIN`/`COMMIT`/`ROLLBACK` with `SAVEPOINT` for nesting.
//!
//! Grounded on `original_source/duro/pgrec/*`: one shared `libpq` connection
//! per environment (`pgenv.c`), tables created with one column per field
//! (`pgrecmap.c`'s `RDB_create_pg_recmap`, here `f<no>` instead of
//! `d_<attrname>`, see `sql::column`), and transactions driven by raw SQL
//! text rather than a typed wrapper (`pgtx.c`).

mod cursor;
mod index;
mod options;
mod recmap;
mod sequence;
mod sql;
mod transaction;

pub use self::options::PgOptions;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use postgres::{Connection, TlsMode};

use backend::{
	BackendCursor, BackendEnvironment, BackendIndex, BackendRecmap, BackendSequence,
	BackendTransaction, IndexCreateFlags, RecmapCreateFlags, TxHandle,
};
use error::{ErrorKind, Result};
use field::{Comparator, FieldInfo};

use self::index::PgIndex;
use self::options::InternalPgOptions;
use self::recmap::{PgRecmap, PgRecmapInner};
use self::sequence::PgSequence;
use self::transaction::PgTransaction;
use self::sql;

/// Top-level handle for the SQL driver.
pub struct PgEnvironment {
	conn: Arc<Mutex<Connection>>,
	savepoint_counter: AtomicUsize,
	anon_counter: AtomicUsize,
}

impl PgEnvironment {
	/// Connects to the server named by `options.conninfo` and applies the
	/// statement timeout / search path, matching `RDB_pg_open_env`'s
	/// `PQconnectdb` plus this crate's own configuration layer.
	pub fn open(options: PgOptions) -> Result<PgEnvironment> {
		let internal = InternalPgOptions::from_external(options)?;
		let conn = Connection::connect(internal.external.conninfo.as_str(), TlsMode::None)
			.map_err(|e| ErrorKind::ResourceNotFound(format!("{}", e)))?;
		if let Some(ms) = internal.external.statement_timeout_ms {
			conn.execute(&format!("SET statement_timeout = {}", ms), &[])?;
		}
		if let Some(ref schema) = internal.external.schema {
			conn.execute(&format!("SET search_path TO {}", schema), &[])?;
		}
		info!("opened sql environment");
		Ok(PgEnvironment {
			conn: Arc::new(Mutex::new(conn)),
			savepoint_counter: AtomicUsize::new(0),
			anon_counter: AtomicUsize::new(0),
		})
	}

	fn table_exists(&self, name: &str) -> Result<bool> {
		let conn = self.conn.lock().unwrap();
		let rows = conn.query(
			"SELECT EXISTS(SELECT tablename FROM pg_tables WHERE tablename=$1)",
			&[&name],
		)?;
		Ok(rows.iter().next().map(|row| row.get(0)).unwrap_or(false))
	}
}

impl BackendEnvironment for PgEnvironment {
	fn begin_tx(&self, parent: Option<&BackendTransaction>) -> Result<TxHandle> {
		match parent {
			None => Ok(Box::new(PgTransaction::begin_top_level(self.conn.clone())?)),
			Some(_) => Ok(Box::new(PgTransaction::begin_nested(self.conn.clone(), &self.savepoint_counter)?)),
		}
	}

	fn create_recmap(
		&self,
		name: Option<&str>,
		field_info: &[FieldInfo],
		key_field_count: usize,
		_compare: Option<Comparator>,
		_flags: RecmapCreateFlags,
		tx: &BackendTransaction,
	) -> Result<Box<BackendRecmap>> {
		let _ = transaction::downcast(tx)?;
		let table = match name {
			Some(n) => {
				if self.table_exists(n)? {
					return Err(ErrorKind::Exists(n.to_owned()).into());
				}
				n.to_owned()
			}
			None => format!("anon_{}", self.anon_counter.fetch_add(1, Ordering::SeqCst)),
		};
		{
			let conn = self.conn.lock().unwrap();
			if name.is_none() {
				// Transient recmaps get no persistent storage name; a
				// session-scoped temporary table is the closest SQL-native
				// equivalent.
				let mut cols = vec!["key bytea PRIMARY KEY".to_owned(), "value bytea NOT NULL".to_owned()];
				for no in 0..field_info.len() {
					cols.push(format!("{} bytea NOT NULL", sql::column(no)));
				}
				conn.execute(&format!("CREATE TEMPORARY TABLE {} ({})", table, cols.join(",")), &[])?;
			} else {
				PgRecmap::create_table(&conn, &table, field_info.len())?;
			}
		}
		debug!("created sql recmap {}", table);
		let inner = Arc::new(PgRecmapInner {
			table: table,
			field_info: field_info.to_vec(),
			key_field_count: key_field_count,
			conn: self.conn.clone(),
		});
		Ok(Box::new(PgRecmap::new(inner)))
	}

	fn open_recmap(
		&self,
		name: &str,
		field_info: &[FieldInfo],
		key_field_count: usize,
		tx: &BackendTransaction,
	) -> Result<Box<BackendRecmap>> {
		let _ = transaction::downcast(tx)?;
		if !self.table_exists(name)? {
			return Err(ErrorKind::NotFound.into());
		}
		let inner = Arc::new(PgRecmapInner {
			table: name.to_owned(),
			field_info: field_info.to_vec(),
			key_field_count: key_field_count,
			conn: self.conn.clone(),
		});
		Ok(Box::new(PgRecmap::new(inner)))
	}

	fn create_index(
		&self,
		recmap: &BackendRecmap,
		name: Option<&str>,
		field_nos: &[usize],
		_compare: Option<Comparator>,
		flags: IndexCreateFlags,
		tx: &BackendTransaction,
	) -> Result<Box<BackendIndex>> {
		let _ = transaction::downcast(tx)?;
		let inner = downcast_recmap(recmap)?;
		let index_name = name.map(|n| n.to_owned()).unwrap_or_else(|| {
			format!("{}_idx_{}", inner.table, self.anon_counter.fetch_add(1, Ordering::SeqCst))
		});
		{
			let conn = self.conn.lock().unwrap();
			let stmt = PgIndex::create_sql(&index_name, &inner.table, field_nos, flags.unique);
			conn.execute(&stmt, &[])?;
		}
		Ok(Box::new(PgIndex::new(Some(index_name), field_nos.to_vec(), inner.clone())))
	}

	fn open_index(
		&self,
		recmap: &BackendRecmap,
		name: &str,
		field_nos: &[usize],
		tx: &BackendTransaction,
	) -> Result<Box<BackendIndex>> {
		let _ = transaction::downcast(tx)?;
		let inner = downcast_recmap(recmap)?;
		Ok(Box::new(PgIndex::new(Some(name.to_owned()), field_nos.to_vec(), inner.clone())))
	}

	fn create_sequence(&self, name: &str, tx: &BackendTransaction) -> Result<Box<BackendSequence>> {
		let _ = transaction::downcast(tx)?;
		Ok(Box::new(PgSequence::create(self.conn.clone(), name)?))
	}

	fn open_sequence(&self, name: &str, tx: &BackendTransaction) -> Result<Box<BackendSequence>> {
		let _ = transaction::downcast(tx)?;
		Ok(Box::new(PgSequence::open(self.conn.clone(), name)?))
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}
}

fn downcast_recmap(recmap: &BackendRecmap) -> Result<&Arc<PgRecmapInner>> {
	recmap
		.as_any()
		.downcast_ref::<PgRecmap>()
		.map(|r| &r.inner)
		.ok_or_else(|| ErrorKind::Internal("recmap handle from a different backend".to_owned()).into())
}
