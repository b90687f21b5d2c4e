//! Backend-agnostic positioned iterator (spec §4.4 `Cursor`).
//!
//! Wraps one `backend::BackendCursor` and additionally knows how to decode
//! the fields of whatever it is positioned over, and how to turn `set`/
//! `delete` into the right backend call: straight through to the owning
//! recmap when positioned over a recmap (so any secondary index stays in
//! lock-step), or through the primary recmap when positioned over an index
//! (an index cursor's "current record" is the primary record its secondary
//! key points at, not a row in whatever storage the index itself uses).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use backend::{BackendCursor, BackendIndex, BackendRecmap, BackendTransaction, RawRecord};
use error::{Error, ErrorKind, Result};
use field::{self, Field, FieldInfo};
use recmap::merge_fields;
use transaction::RecTransaction;

/// Where a cursor currently stands relative to its underlying sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
	/// Never positioned, or positioned and then explicitly unpositioned by
	/// a delete.
	Unpositioned,
	/// Standing on a record; `get`/`set`/`delete` are valid.
	Positioned,
	/// Walked off either end of the sequence.
	PastEnd,
}

/// How `Cursor::seek` should treat a key with no exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
	/// Fail (leave the cursor past-end) unless the key matches exactly.
	Exact,
	/// Land on the first record at or after the key.
	Range,
}

enum Source {
	Recmap { backend: Arc<BackendRecmap>, field_info: Vec<FieldInfo>, key_field_count: usize },
	Index {
		subset_info: Vec<FieldInfo>,
		primary_backend: Arc<BackendRecmap>,
		primary_field_info: Vec<FieldInfo>,
		primary_key_field_count: usize,
		#[allow(dead_code)]
		index_backend: Arc<BackendIndex>,
	},
}

/// A positioned iterator over a recmap or an index.
pub struct Cursor {
	backend_cursor: Box<BackendCursor>,
	source: Source,
	tx_backend: Arc<BackendTransaction>,
	tx_ended: Arc<AtomicBool>,
	position: CursorPosition,
}

impl Cursor {
	pub(crate) fn over_recmap(
		backend_cursor: Box<BackendCursor>,
		backend: Arc<BackendRecmap>,
		field_info: Vec<FieldInfo>,
		key_field_count: usize,
		tx: &RecTransaction,
	) -> Cursor {
		Cursor {
			backend_cursor: backend_cursor,
			source: Source::Recmap { backend: backend, field_info: field_info, key_field_count: key_field_count },
			tx_backend: tx.as_backend_arc(),
			tx_ended: tx.ended_flag(),
			position: CursorPosition::Unpositioned,
		}
	}

	pub(crate) fn over_index(
		backend_cursor: Box<BackendCursor>,
		index_backend: Arc<BackendIndex>,
		subset_info: Vec<FieldInfo>,
		primary_backend: Arc<BackendRecmap>,
		primary_field_info: Vec<FieldInfo>,
		primary_key_field_count: usize,
		tx: &RecTransaction,
	) -> Cursor {
		Cursor {
			backend_cursor: backend_cursor,
			source: Source::Index {
				subset_info: subset_info,
				primary_backend: primary_backend,
				primary_field_info: primary_field_info,
				primary_key_field_count: primary_key_field_count,
				index_backend: index_backend,
			},
			tx_backend: tx.as_backend_arc(),
			tx_ended: tx.ended_flag(),
			position: CursorPosition::Unpositioned,
		}
	}

	fn ensure_live(&self) -> Result<()> {
		if self.tx_ended.load(Ordering::SeqCst) {
			Err(Error::from(ErrorKind::InvalidTransaction("cursor's owning transaction has ended".to_owned())))
		} else {
			Ok(())
		}
	}

	fn require_positioned(&self) -> Result<()> {
		if self.position != CursorPosition::Positioned {
			Err(Error::from(ErrorKind::InvalidArgument("cursor is not positioned".to_owned())))
		} else {
			Ok(())
		}
	}

	fn note(&mut self, found: Option<RawRecord>) -> bool {
		self.position = if found.is_some() { CursorPosition::Positioned } else { CursorPosition::PastEnd };
		found.is_some()
	}

	/// Positions on the first record.
	pub fn first(&mut self) -> Result<bool> {
		self.ensure_live()?;
		let found = self.backend_cursor.first()?;
		Ok(self.note(found))
	}

	/// Advances to the next record. If `same_key_only`, fails to advance
	/// (landing past-end) once the key half changes.
	pub fn next(&mut self, same_key_only: bool) -> Result<bool> {
		self.ensure_live()?;
		let found = self.backend_cursor.next(same_key_only)?;
		Ok(self.note(found))
	}

	/// Moves to the previous record.
	pub fn prev(&mut self) -> Result<bool> {
		self.ensure_live()?;
		let found = self.backend_cursor.prev()?;
		Ok(self.note(found))
	}

	/// Positions at `key_fields` (or the next record past it, under
	/// `SeekMode::Range`).
	pub fn seek(&mut self, key_fields: &[Field], mode: SeekMode) -> Result<bool> {
		self.ensure_live()?;
		let key_bytes = match &self.source {
			Source::Recmap { field_info, key_field_count, .. } => field::fields_to_key_bytes(key_fields, field_info, *key_field_count)?,
			Source::Index { subset_info, .. } => field::fields_to_key_bytes(key_fields, subset_info, subset_info.len())?,
		};
		let exact = mode == SeekMode::Exact;
		let found = self.backend_cursor.seek(&key_bytes, exact)?;
		Ok(self.note(found))
	}

	/// Reads field `no` of the current record.
	pub fn get(&self, no: usize) -> Result<Field> {
		self.ensure_live()?;
		self.require_positioned()?;
		let current = self.backend_cursor.current().ok_or(ErrorKind::Internal("positioned cursor has no current record".to_owned()))?;
		match &self.source {
			Source::Recmap { field_info, key_field_count, .. } => {
				let is_key = no < *key_field_count;
				let buf = if is_key { &current.key } else { &current.value };
				let bytes = field::get_field(buf, field_info, *key_field_count, is_key, no)?;
				Ok(Field::new(no, bytes.to_vec()))
			}
			Source::Index { primary_backend, primary_field_info, primary_key_field_count, .. } => {
				let value = primary_backend.get(&current.value, &*self.tx_backend)?.ok_or(ErrorKind::NotFound)?;
				let is_key = no < *primary_key_field_count;
				let buf = if is_key { &current.value } else { &value };
				let bytes = field::get_field(buf, primary_field_info, *primary_key_field_count, is_key, no)?;
				Ok(Field::new(no, bytes.to_vec()))
			}
		}
	}

	/// Overwrites one or more value-half fields of the current record.
	/// Rejects attempts to change a key field, and is unsupported when
	/// positioned over an index (spec §4.4: index cursors are read/delete
	/// only).
	pub fn set(&mut self, fields: &[Field]) -> Result<()> {
		self.ensure_live()?;
		self.require_positioned()?;
		let current = self.backend_cursor.current().ok_or(ErrorKind::Internal("positioned cursor has no current record".to_owned()))?;
		match &self.source {
			Source::Recmap { backend, field_info, key_field_count } => {
				if fields.iter().any(|f| f.no < *key_field_count) {
					return Err(ErrorKind::InvalidArgument("cannot modify a key field through a cursor".to_owned()).into());
				}
				let value_nos: Vec<usize> = (*key_field_count..field_info.len()).collect();
				let existing = field::bytes_to_fields(&current.key, &current.value, field_info, *key_field_count, &value_nos)?;
				let merged = merge_fields(existing, fields);
				let new_value = field::fields_to_value_bytes(&merged, field_info, *key_field_count)?;
				backend.update(&current.key, None, new_value.clone(), &*self.tx_backend)?;
				self.backend_cursor.set_value(new_value)
			}
			Source::Index { .. } => Err(ErrorKind::NotSupported("cannot set fields through an index cursor".to_owned()).into()),
		}
	}

	/// Deletes the current record. For an index cursor, this deletes the
	/// primary record the current secondary key points at.
	pub fn delete(&mut self) -> Result<()> {
		self.ensure_live()?;
		self.require_positioned()?;
		let current = self.backend_cursor.current().ok_or(ErrorKind::Internal("positioned cursor has no current record".to_owned()))?;
		match &self.source {
			Source::Recmap { backend, .. } => backend.delete(&current.key, &*self.tx_backend)?,
			Source::Index { primary_backend, .. } => primary_backend.delete(&current.value, &*self.tx_backend)?,
		}
		self.backend_cursor.delete()?;
		self.position = CursorPosition::Unpositioned;
		Ok(())
	}

	/// Releases the backend cursor.
	pub fn close(mut self) -> Result<()> {
		self.backend_cursor.close()
	}

	/// This cursor's current position.
	pub fn position(&self) -> CursorPosition {
		self.position
	}
}
