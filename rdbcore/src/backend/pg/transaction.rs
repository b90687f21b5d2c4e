//! SQL-style driver transaction handle: top-level transactions map to
//! `BEGIN`/`COMMIT`/`ROLLBACK`, nested transactions to
//! `SAVEPOINT`/`RELEASE SAVEPOINT`/`ROLLBACK TO SAVEPOINT`.
//!
//! Kept as raw SQL text run over the shared connection rather than the
//! `postgres` crate's own `Transaction` wrapper: the record layer hands a
//! `&BackendTransaction` into every recmap/index/cursor call independently of
//! where it was created, which doesn't fit a wrapper type tied to a
//! connection borrow. The original drives the same protocol the same way,
//! with raw `PQexec` calls (`pgrec/pgtx.c`).

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use postgres::Connection;

use error::Result;

/// A transaction under the SQL driver. `savepoint` is `None` for a
/// top-level transaction, `Some(name)` for a nested one.
pub struct PgTransaction {
	conn: Arc<Mutex<Connection>>,
	savepoint: Option<String>,
}

impl PgTransaction {
	pub fn begin_top_level(conn: Arc<Mutex<Connection>>) -> Result<PgTransaction> {
		conn.lock().unwrap().execute("BEGIN", &[])?;
		Ok(PgTransaction { conn: conn, savepoint: None })
	}

	pub fn begin_nested(conn: Arc<Mutex<Connection>>, counter: &AtomicUsize) -> Result<PgTransaction> {
		let id = counter.fetch_add(1, Ordering::SeqCst);
		let name = format!("rdbcore_sp_{}", id);
		conn.lock().unwrap().execute(&format!("SAVEPOINT {}", name), &[])?;
		Ok(PgTransaction { conn: conn, savepoint: Some(name) })
	}

	pub fn conn(&self) -> &Arc<Mutex<Connection>> {
		&self.conn
	}
}

impl ::backend::BackendTransaction for PgTransaction {
	fn commit(&self) -> Result<()> {
		let conn = self.conn.lock().unwrap();
		match self.savepoint {
			Some(ref name) => {
				conn.execute(&format!("RELEASE SAVEPOINT {}", name), &[])?;
			}
			None => {
				conn.execute("COMMIT", &[])?;
			}
		}
		Ok(())
	}

	fn abort(&self) -> Result<()> {
		let conn = self.conn.lock().unwrap();
		match self.savepoint {
			Some(ref name) => {
				conn.execute(&format!("ROLLBACK TO SAVEPOINT {}", name), &[])?;
				conn.execute(&format!("RELEASE SAVEPOINT {}", name), &[])?;
			}
			None => {
				conn.execute("ROLLBACK", &[])?;
			}
		}
		Ok(())
	}

	fn as_any(&self) -> &Any {
		self
	}
}

/// Downcasts a generic backend transaction handle to this driver's concrete
/// type, or fails with `Internal` if a transaction from a different backend
/// was passed in.
pub fn downcast<'a>(tx: &'a ::backend::BackendTransaction) -> Result<&'a PgTransaction> {
	tx.as_any().downcast_ref::<PgTransaction>().ok_or_else(|| {
		::error::ErrorKind::Internal("transaction handle from a different backend".to_owned()).into()
	})
}
