//! SQL-style driver primary recmap: one table per recmap, a `key`/`value`
//! bytea pair holding the whole framed half (what `get`/`contains` actually
//! compare against) plus one `f<no>` bytea column per field, which exists
//! solely so `CREATE INDEX` has something to index when an ordinary SQL
//! index is created over it.

use std::sync::{Arc, Mutex};

use postgres::Connection;

use backend::{BackendCursor, BackendRecmap, BackendTransaction};
use error::{ErrorKind, Result};
use field::FieldInfo;

use super::cursor::PgCursor;
use super::sql;
use super::transaction;

/// State shared by a `PgRecmap` handle and every `PgIndex` opened against
/// the same table.
pub struct PgRecmapInner {
	pub table: String,
	pub field_info: Vec<FieldInfo>,
	pub key_field_count: usize,
	pub conn: Arc<Mutex<Connection>>,
}

pub struct PgRecmap {
	pub inner: Arc<PgRecmapInner>,
}

impl PgRecmap {
	pub fn new(inner: Arc<PgRecmapInner>) -> PgRecmap {
		PgRecmap { inner: inner }
	}

	/// Emits the `CREATE TABLE` for a brand-new recmap: `key`/`value` plus
	/// one indexable column per field.
	pub fn create_table(conn: &Connection, table: &str, field_count: usize) -> Result<()> {
		let mut cols = vec![
			format!("key {} PRIMARY KEY", sql::COLUMN_TYPE),
			format!("value {} NOT NULL", sql::COLUMN_TYPE),
		];
		for no in 0..field_count {
			cols.push(format!("{} {} NOT NULL", sql::column(no), sql::COLUMN_TYPE));
		}
		let stmt = format!("CREATE TABLE {} ({})", table, cols.join(","));
		conn.execute(&stmt, &[])?;
		Ok(())
	}
}

impl BackendRecmap for PgRecmap {
	fn insert(&self, key: Vec<u8>, value: Vec<u8>, tx: &BackendTransaction) -> Result<()> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let fields = sql::decode_row(&key, &value, &self.inner.field_info, self.inner.key_field_count)?;
		let (cols, placeholders) = sql::insert_columns(self.inner.field_info.len());
		let stmt = format!("INSERT INTO {} ({}) VALUES ({})", self.inner.table, cols, placeholders);
		let mut params: Vec<&::postgres::types::ToSql> = Vec::with_capacity(fields.len() + 2);
		params.push(&key);
		params.push(&value);
		for f in &fields {
			params.push(&f.data);
		}
		match conn.execute(&stmt, &params) {
			Ok(_) => Ok(()),
			Err(e) => Err(map_insert_error(e, &self.inner.table)),
		}
	}

	fn update(&self, old_key: &[u8], new_key: Option<Vec<u8>>, new_value: Vec<u8>, tx: &BackendTransaction) -> Result<()> {
		let ptx = transaction::downcast(tx)?;
		match new_key {
			Some(nk) => {
				self.delete(old_key, tx)?;
				self.insert(nk, new_value, tx)
			}
			None => {
				let conn = ptx.conn().lock().unwrap();
				let fields = sql::decode_row(old_key, &new_value, &self.inner.field_info, self.inner.key_field_count)?;
				let mut sets = vec!["value=$1".to_owned()];
				for no in self.inner.key_field_count..self.inner.field_info.len() {
					sets.push(format!("{}=${}", sql::column(no), sets.len() + 1));
				}
				let stmt = format!("UPDATE {} SET {} WHERE key=${}", self.inner.table, sets.join(","), sets.len() + 1);
				let mut params: Vec<&::postgres::types::ToSql> = Vec::new();
				params.push(&new_value);
				let value_fields: Vec<_> = fields.iter().filter(|f| f.no >= self.inner.key_field_count).collect();
				for f in &value_fields {
					params.push(&f.data);
				}
				params.push(&old_key);
				let n = conn.execute(&stmt, &params)?;
				if n == 0 {
					return Err(ErrorKind::NotFound.into());
				}
				Ok(())
			}
		}
	}

	fn delete(&self, key: &[u8], tx: &BackendTransaction) -> Result<()> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let stmt = format!("DELETE FROM {} WHERE key=$1", self.inner.table);
		let n = conn.execute(&stmt, &[&key])?;
		if n == 0 {
			return Err(ErrorKind::NotFound.into());
		}
		Ok(())
	}

	fn get(&self, key: &[u8], tx: &BackendTransaction) -> Result<Option<Vec<u8>>> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let stmt = format!("SELECT value FROM {} WHERE key=$1", self.inner.table);
		let rows = conn.query(&stmt, &[&key])?;
		Ok(rows.iter().next().map(|row| row.get(0)))
	}

	fn contains(&self, key: &[u8], value: &[u8], tx: &BackendTransaction) -> Result<bool> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let stmt = format!("SELECT 1 FROM {} WHERE key=$1 AND value=$2", self.inner.table);
		let rows = conn.query(&stmt, &[&key, &value])?;
		Ok(!rows.is_empty())
	}

	fn estimated_size(&self, tx: &BackendTransaction) -> Result<u64> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let stmt = format!("SELECT count(*) FROM {}", self.inner.table);
		let rows = conn.query(&stmt, &[])?;
		let count: i64 = rows.iter().next().map(|row| row.get(0)).unwrap_or(0);
		Ok(count as u64)
	}

	fn cursor(&self, _writable: bool, tx: &BackendTransaction) -> Result<Box<BackendCursor>> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let stmt = format!("SELECT key, value FROM {} ORDER BY key", self.inner.table);
		let rows = conn.query(&stmt, &[])?;
		let out = rows.iter().map(|row| (row.get(0), row.get(1))).collect();
		Ok(Box::new(PgCursor::new(out)))
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}

	fn destroy(&self, tx: &BackendTransaction) -> Result<()> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		conn.execute(&format!("DROP TABLE {}", self.inner.table), &[])?;
		Ok(())
	}

	fn as_any(&self) -> &::std::any::Any {
		self
	}
}

/// `23505` is Postgres's `unique_violation` SQLSTATE, but it fires for any
/// violated unique constraint, not just the primary key: a duplicate value
/// under a secondary `UNIQUE INDEX` (created by `PgIndex::create_sql`) hits
/// the exact same SQLSTATE as a duplicate primary key. The constraint name
/// disambiguates the two: Postgres names a table's primary key constraint
/// `"{table}_pkey"` by default (no other way this driver creates a table),
/// so any other constraint name means a secondary index rejected the row.
fn map_insert_error(e: ::postgres::Error, table: &str) -> ::error::Error {
	if let Some(db_err) = e.as_db() {
		if db_err.code().code() == "23505" {
			let pkey_constraint = format!("{}_pkey", table);
			return match db_err.constraint() {
				Some(name) if name == pkey_constraint => ErrorKind::KeyViolation.into(),
				Some(_) => ErrorKind::PredicateViolation("unique secondary index violated".to_owned()).into(),
				None => ErrorKind::KeyViolation.into(),
			};
		}
	}
	ErrorKind::Postgres(e).into()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn column_names_are_field_number_based() {
		assert_eq!(sql::column(0), "f0");
		assert_eq!(sql::column(12), "f12");
	}
}
