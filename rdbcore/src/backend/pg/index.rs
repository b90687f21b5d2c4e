//! SQL-style driver secondary index.
//!
//! Unlike the embedded driver's derived table, this is an ordinary SQL
//! index: a `CREATE INDEX` over a subset of
//! the primary table's `f<no>` columns (see `backend::pg::sql`). There is no
//! separate storage to keep in lock-step; Postgres itself maintains the
//! index against the one physical table, so `get`/`cursor`/`delete_rec` are
//! all plain SQL against the primary table filtered or ordered by the
//! index's columns.

use std::sync::Arc;

use backend::{BackendCursor, BackendIndex, BackendTransaction};
use error::{ErrorKind, Result};

use super::cursor::PgCursor;
use super::recmap::PgRecmapInner;
use super::sql;
use super::transaction;

pub struct PgIndex {
	pub name: Option<String>,
	pub field_nos: Vec<usize>,
	pub primary: Arc<PgRecmapInner>,
}

impl PgIndex {
	pub fn new(name: Option<String>, field_nos: Vec<usize>, primary: Arc<PgRecmapInner>) -> PgIndex {
		PgIndex { name: name, field_nos: field_nos, primary: primary }
	}

	/// Emits the `CREATE [UNIQUE] INDEX` for a brand-new index.
	pub fn create_sql(name: &str, table: &str, field_nos: &[usize], unique: bool) -> String {
		let cols: Vec<String> = field_nos.iter().map(|&no| sql::column(no)).collect();
		format!(
			"CREATE {}INDEX {} ON {} ({})",
			if unique { "UNIQUE " } else { "" },
			name,
			table,
			cols.join(",")
		)
	}

	fn where_clause(&self) -> String {
		self.field_nos
			.iter()
			.enumerate()
			.map(|(i, &no)| format!("{}=${}", sql::column(no), i + 1))
			.collect::<Vec<_>>()
			.join(" AND ")
	}

	fn decode_key(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
		let subset_info = sql::subset_field_info(&self.primary.field_info, &self.field_nos);
		let fields = ::field::bytes_to_fields(key, &[], &subset_info, subset_info.len(), &(0..subset_info.len()).collect::<Vec<_>>())?;
		Ok(fields.into_iter().map(|f| f.data).collect())
	}
}

impl BackendIndex for PgIndex {
	fn get(&self, key: &[u8], tx: &BackendTransaction) -> Result<Option<Vec<u8>>> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let values = self.decode_key(key)?;
		let stmt = format!("SELECT key FROM {} WHERE {}", self.primary.table, self.where_clause());
		let params: Vec<&::postgres::types::ToSql> = values.iter().map(|v| v as &::postgres::types::ToSql).collect();
		let rows = conn.query(&stmt, &params)?;
		Ok(rows.iter().next().map(|row| row.get(0)))
	}

	fn cursor(&self, tx: &BackendTransaction) -> Result<Box<BackendCursor>> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let idx_cols: Vec<String> = self.field_nos.iter().map(|&no| sql::column(no)).collect();
		let stmt = format!(
			"SELECT key, {} FROM {} ORDER BY {}",
			idx_cols.join(","),
			self.primary.table,
			idx_cols.join(",")
		);
		let rows = conn.query(&stmt, &[])?;
		let subset_info = sql::subset_field_info(&self.primary.field_info, &self.field_nos);
		let mut out = Vec::with_capacity(rows.len());
		for row in rows.iter() {
			let primary_key: Vec<u8> = row.get(0);
			let col_bytes: Vec<Vec<u8>> = (1..=self.field_nos.len()).map(|i| row.get(i)).collect();
			let secondary_key = sql::reencode_index_key(&col_bytes, &subset_info)?;
			out.push((secondary_key, primary_key));
		}
		Ok(Box::new(PgCursor::new(out)))
	}

	fn delete_rec(&self, key: &[u8], tx: &BackendTransaction) -> Result<()> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		let values = self.decode_key(key)?;
		let stmt = format!("DELETE FROM {} WHERE {}", self.primary.table, self.where_clause());
		let params: Vec<&::postgres::types::ToSql> = values.iter().map(|v| v as &::postgres::types::ToSql).collect();
		let n = conn.execute(&stmt, &params)?;
		if n == 0 {
			return Err(ErrorKind::NotFound.into());
		}
		Ok(())
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}

	fn destroy(&self, tx: &BackendTransaction) -> Result<()> {
		let ptx = transaction::downcast(tx)?;
		let conn = ptx.conn().lock().unwrap();
		if let Some(ref name) = self.name {
			conn.execute(&format!("DROP INDEX {}", name), &[])?;
		}
		Ok(())
	}
}
