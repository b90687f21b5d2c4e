//! Backend-agnostic secondary index (spec §4.3 `Index`).

use std::sync::Arc;

use backend::{self, BackendIndex, BackendRecmap};
use cursor::Cursor;
use environment::Environment;
use error::{Error, ErrorKind, Result};
use field::{self, Comparator, Field, FieldInfo};
use recmap::Recmap;
use transaction::RecTransaction;

/// Creation-time flags for a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexFlags {
	/// Secondary-key uniqueness is enforced.
	pub unique: bool,
	/// Iteration follows `compare_fields`' order.
	pub ordered: bool,
}

/// A secondary index over a subset of a recmap's fields.
pub struct Index {
	backend: Arc<BackendIndex>,
	name: Option<String>,
	field_nos: Vec<usize>,
	unique: bool,
	ordered: bool,
	primary_backend: Arc<BackendRecmap>,
	primary_field_info: Vec<FieldInfo>,
	primary_key_field_count: usize,
}

impl Index {
	/// Creates a secondary index over `field_nos` of `recmap`.
	pub fn create(
		recmap: &Recmap,
		name: Option<&str>,
		env: &Environment,
		field_nos: Vec<usize>,
		compare_fields: Option<Comparator>,
		flags: IndexFlags,
		tx: &RecTransaction,
	) -> Result<Index> {
		tx.ensure_active()?;
		for &no in &field_nos {
			if no >= recmap.field_info().len() {
				return Err(ErrorKind::InvalidArgument(format!("field {} is not a field of this recmap", no)).into());
			}
		}
		let backend_flags = backend::IndexCreateFlags { unique: flags.unique, ordered: flags.ordered };
		let backend_box = env.backend().create_index(&**recmap.backend_handle(), name, &field_nos, compare_fields, backend_flags, tx.as_backend())?;
		let backend: Arc<BackendIndex> = Arc::from(backend_box);
		tx.record_created_index(backend.clone());
		if env.trace_level().enabled() {
			info!(target: "rdbcore::trace", "created index {}", name.unwrap_or("<anonymous>"));
		}
		Ok(Index {
			backend: backend,
			name: name.map(|s| s.to_owned()),
			field_nos: field_nos,
			unique: flags.unique,
			ordered: flags.ordered,
			primary_backend: recmap.backend_handle().clone(),
			primary_field_info: recmap.field_info().to_vec(),
			primary_key_field_count: recmap.key_field_count(),
		})
	}

	/// Opens an existing secondary index by name.
	pub fn open(recmap: &Recmap, name: &str, env: &Environment, field_nos: Vec<usize>, tx: &RecTransaction) -> Result<Index> {
		tx.ensure_active()?;
		let backend_box = env.backend().open_index(&**recmap.backend_handle(), name, &field_nos, tx.as_backend())?;
		Ok(Index {
			backend: Arc::from(backend_box),
			name: Some(name.to_owned()),
			field_nos: field_nos,
			unique: false,
			ordered: false,
			primary_backend: recmap.backend_handle().clone(),
			primary_field_info: recmap.field_info().to_vec(),
			primary_key_field_count: recmap.key_field_count(),
		})
	}

	/// This index's storage name, if it has one.
	pub fn name(&self) -> Option<&str> {
		self.name.as_ref().map(|s| s.as_str())
	}

	/// The primary field numbers this index is built over, in key order.
	pub fn fields(&self) -> &[usize] {
		&self.field_nos
	}

	/// True if secondary-key uniqueness is enforced.
	pub fn is_unique(&self) -> bool {
		self.unique
	}

	/// True if iteration follows an explicit sort order.
	pub fn is_ordered(&self) -> bool {
		self.ordered
	}

	fn subset_info(&self) -> Vec<FieldInfo> {
		self.field_nos.iter().map(|&no| self.primary_field_info[no].clone()).collect()
	}

	/// Reads the fields named in `requested` (primary field numbers) out of
	/// the primary record whose indexed fields match `key_fields`.
	pub fn get_fields(&self, key_fields: &[Field], requested: &[usize], tx: &RecTransaction) -> Result<Vec<Field>> {
		tx.ensure_active()?;
		let subset = self.subset_info();
		let key_bytes = field::fields_to_key_bytes(key_fields, &subset, subset.len())?;
		let primary_key = self.backend.get(&key_bytes, tx.as_backend())?.ok_or(ErrorKind::NotFound)?;
		let value = self.primary_backend.get(&primary_key, tx.as_backend())?.ok_or(ErrorKind::NotFound)?;
		field::bytes_to_fields(&primary_key, &value, &self.primary_field_info, self.primary_key_field_count, requested)
	}

	/// Deletes the single primary record whose indexed fields match
	/// `key_fields`.
	pub fn delete_rec(&self, key_fields: &[Field], tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		let subset = self.subset_info();
		let key_bytes = field::fields_to_key_bytes(key_fields, &subset, subset.len())?;
		self.backend.delete_rec(&key_bytes, tx.as_backend())
	}

	/// Opens a cursor over this index, ordered by its indexed fields.
	pub fn cursor(&self, tx: &RecTransaction) -> Result<Cursor> {
		tx.ensure_active()?;
		let backend_cursor = self.backend.cursor(tx.as_backend())?;
		Ok(Cursor::over_index(
			backend_cursor,
			self.backend.clone(),
			self.subset_info(),
			self.primary_backend.clone(),
			self.primary_field_info.clone(),
			self.primary_key_field_count,
			tx,
		))
	}

	/// Closes the index without destroying it.
	pub fn close(self) -> Result<()> {
		self.backend.close()
	}

	/// Destroys the index, immediately or at commit depending on `delayed`.
	pub fn delete(self, delayed: bool, tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		if delayed {
			tx.schedule_index_deletion(self.backend.clone());
			Ok(())
		} else {
			self.backend.destroy(tx.as_backend())
		}
	}
}
