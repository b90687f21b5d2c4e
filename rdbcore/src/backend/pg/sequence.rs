//! SQL-style driver sequence: a one-row table incremented with
//! `UPDATE ... RETURNING`, transactional like everything else under this
//! driver (the original has no sequence support at all for the SQL driver —
//! `envp->open_sequence_fn = NULL` in `pgrec/pgenv.c` — so this is a
//! supplemented feature, grounded on the embedded driver's own sequence
//! file and the SQL driver's table-per-recmap convention).

use std::sync::{Arc, Mutex};

use postgres::Connection;

use backend::{BackendSequence, BackendTransaction};
use error::{ErrorKind, Result};

use super::transaction;

pub struct PgSequence {
	table: String,
	conn: Arc<Mutex<Connection>>,
}

impl PgSequence {
	pub fn create(conn: Arc<Mutex<Connection>>, name: &str) -> Result<PgSequence> {
		let table = format!("seq_{}", name);
		conn.lock().unwrap().execute(
			&format!("CREATE TABLE {} (value bigint NOT NULL)", table),
			&[],
		)?;
		conn.lock().unwrap().execute(&format!("INSERT INTO {} (value) VALUES (0)", table), &[])?;
		Ok(PgSequence { table: table, conn: conn })
	}

	pub fn open(conn: Arc<Mutex<Connection>>, name: &str) -> Result<PgSequence> {
		let table = format!("seq_{}", name);
		let exists: bool = {
			let c = conn.lock().unwrap();
			let rows = c.query(
				"SELECT EXISTS(SELECT tablename FROM pg_tables WHERE tablename=$1)",
				&[&table],
			)?;
			rows.iter().next().map(|row| row.get(0)).unwrap_or(false)
		};
		if !exists {
			return Err(ErrorKind::NotFound.into());
		}
		Ok(PgSequence { table: table, conn: conn })
	}
}

impl BackendSequence for PgSequence {
	fn next(&self, tx: &BackendTransaction) -> Result<i64> {
		let _ = transaction::downcast(tx)?;
		let conn = self.conn.lock().unwrap();
		let rows = conn.query(
			&format!("UPDATE {} SET value = value + 1 RETURNING value", self.table),
			&[],
		)?;
		let value: i64 = rows.iter().next().map(|row| row.get(0)).ok_or(ErrorKind::Internal("sequence table has no row".to_owned()))?;
		Ok(value)
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}

	fn destroy(&self, tx: &BackendTransaction) -> Result<()> {
		let _ = transaction::downcast(tx)?;
		let conn = self.conn.lock().unwrap();
		conn.execute(&format!("DROP TABLE {}", self.table), &[])?;
		Ok(())
	}
}
