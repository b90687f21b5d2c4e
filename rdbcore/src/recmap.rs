//! Backend-agnostic key/value table (spec §4.2 `Recmap`).

use std::sync::Arc;

use backend::{self, BackendRecmap};
use environment::Environment;
use error::{Error, ErrorKind, Result};
use field::{self, Comparator, Field, FieldInfo};
use transaction::RecTransaction;

/// Creation-time flags for a recmap.
///
/// Folds the original's separate `unique_keys` parameter and a recmap's own
/// `delayed_deletion` attribute into one struct, matching this codebase's
/// own `Options`-builder idiom (spec §9 leaves the exact shape of this
/// parameter list to the implementer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecmapFlags {
	/// Iteration follows `compare_fields`' order rather than storage order.
	pub ordered: bool,
	/// Primary-key uniqueness is enforced; `false` permits duplicate keys
	/// (used by some derived structures, never by ordinary stored tables).
	pub unique: bool,
	/// If true, `delete` only schedules destruction for when the owning
	/// transaction commits, and the recmap survives untouched if the
	/// transaction aborts instead (spec §6, "delayed deletion").
	pub delayed_deletion: bool,
}

/// A physical key/value table, independent of the backend that stores it.
pub struct Recmap {
	env: Environment,
	backend: Arc<BackendRecmap>,
	name: Option<String>,
	field_info: Vec<FieldInfo>,
	key_field_count: usize,
	compare_fields: Option<Comparator>,
	unique: bool,
	delayed_deletion: bool,
}

impl Recmap {
	/// Creates a new, empty recmap. `name` is `None` for a transient recmap
	/// with no catalog-visible name (spec §6).
	pub fn create(
		name: Option<&str>,
		env: &Environment,
		field_info: Vec<FieldInfo>,
		key_field_count: usize,
		compare_fields: Option<Comparator>,
		flags: RecmapFlags,
		tx: &RecTransaction,
	) -> Result<Recmap> {
		tx.ensure_active()?;
		let backend_flags = backend::RecmapCreateFlags { ordered: flags.ordered, unique: flags.unique };
		let backend_box = env.backend().create_recmap(name, &field_info, key_field_count, compare_fields.clone(), backend_flags, tx.as_backend())?;
		let backend: Arc<BackendRecmap> = Arc::from(backend_box);
		tx.record_created_recmap(backend.clone());
		if env.trace_level().enabled() {
			info!(target: "rdbcore::trace", "created recmap {}", name.unwrap_or("<anonymous>"));
		}
		Ok(Recmap {
			env: env.clone(),
			backend: backend,
			name: name.map(|s| s.to_owned()),
			field_info: field_info,
			key_field_count: key_field_count,
			compare_fields: compare_fields,
			unique: flags.unique,
			delayed_deletion: flags.delayed_deletion,
		})
	}

	/// Opens an existing recmap by name.
	pub fn open(name: &str, env: &Environment, field_info: Vec<FieldInfo>, key_field_count: usize, tx: &RecTransaction) -> Result<Recmap> {
		tx.ensure_active()?;
		let backend_box = env.backend().open_recmap(name, &field_info, key_field_count, tx.as_backend())?;
		Ok(Recmap {
			env: env.clone(),
			backend: Arc::from(backend_box),
			name: Some(name.to_owned()),
			field_info: field_info,
			key_field_count: key_field_count,
			compare_fields: None,
			unique: true,
			delayed_deletion: false,
		})
	}

	/// This recmap's storage name, if it has one.
	pub fn name(&self) -> Option<&str> {
		self.name.as_ref().map(|s| s.as_str())
	}

	/// The field table this recmap was created or opened with.
	pub fn field_info(&self) -> &[FieldInfo] {
		&self.field_info
	}

	/// How many of `field_info`'s entries make up the key half.
	pub fn key_field_count(&self) -> usize {
		self.key_field_count
	}

	/// True if iteration follows an explicit sort order rather than storage
	/// order.
	pub fn is_ordered(&self) -> bool {
		self.compare_fields.is_some()
	}

	/// True if primary-key uniqueness is enforced.
	pub fn is_unique(&self) -> bool {
		self.unique
	}

	pub(crate) fn backend_handle(&self) -> &Arc<BackendRecmap> {
		&self.backend
	}

	/// Inserts a full record. `fields` must cover every field number
	/// `0..field_info().len()` exactly once.
	pub fn insert(&self, fields: &[Field], tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		let (key_bytes, value_bytes) = field::fields_to_bytes(fields, &self.field_info, self.key_field_count)?;
		self.backend.insert(key_bytes, value_bytes, tx.as_backend())
	}

	/// Updates an existing record, identified by `key_fields`, applying the
	/// overrides in `new_fields`. If any override falls in the key half,
	/// the record is deleted and reinserted under the new key atomically
	/// from the caller's point of view (spec §4.2).
	pub fn update(&self, key_fields: &[Field], new_fields: &[Field], tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		let key_bytes = field::fields_to_key_bytes(key_fields, &self.field_info, self.key_field_count)?;
		let changes_key = new_fields.iter().any(|f| f.no < self.key_field_count);
		let all_nos: Vec<usize> = (0..self.field_info.len()).collect();
		let old_value = self.backend.get(&key_bytes, tx.as_backend())?.ok_or(ErrorKind::NotFound)?;
		if changes_key {
			let existing = field::bytes_to_fields(&key_bytes, &old_value, &self.field_info, self.key_field_count, &all_nos)?;
			let merged = merge_fields(existing, new_fields);
			let (new_key_bytes, new_value_bytes) = field::fields_to_bytes(&merged, &self.field_info, self.key_field_count)?;
			self.backend.delete(&key_bytes, tx.as_backend())?;
			self.backend.insert(new_key_bytes, new_value_bytes, tx.as_backend())
		} else {
			let value_nos: Vec<usize> = (self.key_field_count..self.field_info.len()).collect();
			let existing = field::bytes_to_fields(&key_bytes, &old_value, &self.field_info, self.key_field_count, &value_nos)?;
			let merged = merge_fields(existing, new_fields);
			let new_value_bytes = field::fields_to_value_bytes(&merged, &self.field_info, self.key_field_count)?;
			self.backend.update(&key_bytes, None, new_value_bytes, tx.as_backend())
		}
	}

	/// Deletes the record identified by `key_fields`.
	pub fn delete_record(&self, key_fields: &[Field], tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		let key_bytes = field::fields_to_key_bytes(key_fields, &self.field_info, self.key_field_count)?;
		self.backend.delete(&key_bytes, tx.as_backend())
	}

	/// Reads the fields named in `requested` out of the record identified by
	/// `key_fields`.
	pub fn get_fields(&self, key_fields: &[Field], requested: &[usize], tx: &RecTransaction) -> Result<Vec<Field>> {
		tx.ensure_active()?;
		let key_bytes = field::fields_to_key_bytes(key_fields, &self.field_info, self.key_field_count)?;
		let value_bytes = self.backend.get(&key_bytes, tx.as_backend())?.ok_or(ErrorKind::NotFound)?;
		field::bytes_to_fields(&key_bytes, &value_bytes, &self.field_info, self.key_field_count, requested)
	}

	/// True if a record matching every given field (key and value alike)
	/// exists.
	pub fn contains(&self, fields: &[Field], tx: &RecTransaction) -> Result<bool> {
		tx.ensure_active()?;
		let (key_bytes, value_bytes) = field::fields_to_bytes(fields, &self.field_info, self.key_field_count)?;
		self.backend.contains(&key_bytes, &value_bytes, tx.as_backend())
	}

	/// A driver-reported, possibly approximate, record count.
	pub fn estimated_size(&self, tx: &RecTransaction) -> Result<u64> {
		tx.ensure_active()?;
		self.backend.estimated_size(tx.as_backend())
	}

	/// Opens a positioned cursor over this recmap.
	pub fn cursor(&self, writable: bool, tx: &RecTransaction) -> Result<::cursor::Cursor> {
		tx.ensure_active()?;
		let backend_cursor = self.backend.cursor(writable, tx.as_backend())?;
		Ok(::cursor::Cursor::over_recmap(backend_cursor, self.backend.clone(), self.field_info.clone(), self.key_field_count, tx))
	}

	/// Closes the recmap without destroying its contents.
	pub fn close(self) -> Result<()> {
		self.backend.close()
	}

	/// Destroys the recmap's contents, immediately or at commit depending on
	/// how it was created (spec §6, "delayed deletion").
	pub fn delete(self, tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		if self.delayed_deletion {
			tx.schedule_recmap_deletion(self.backend.clone());
			Ok(())
		} else {
			self.backend.destroy(tx.as_backend())
		}
	}

	/// Destroys the recmap's contents right away, bypassing its own
	/// delayed-deletion flag. Used only by `stored_table` to roll back a
	/// partially-created table within the same transaction that is still
	/// failing synchronously.
	pub(crate) fn destroy_now(&self, tx: &RecTransaction) -> Result<()> {
		self.backend.destroy(tx.as_backend())
	}
}

/// Applies `overrides` onto `base` by field number, leaving fields not
/// mentioned in `overrides` untouched.
pub(crate) fn merge_fields(base: Vec<Field>, overrides: &[Field]) -> Vec<Field> {
	let mut merged = base;
	for over in overrides {
		if let Some(existing) = merged.iter_mut().find(|f| f.no == over.no) {
			existing.data = over.data.clone();
		} else {
			merged.push(over.clone());
		}
	}
	merged
}
