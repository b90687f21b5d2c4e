//! Embedded-driver primary recmap: a journaled table plus every secondary
//! index associated with it, kept in lock-step on every write.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use error::{ErrorKind, Result};
use field::{Comparator, FieldInfo};

use super::cursor::{BdbCursor, KeyOrder};
use super::engine::Table;
use super::index::SecondaryRegistration;
use super::transaction::{self, UndoOp};
use backend::{BackendCursor, BackendRecmap, BackendTransaction};

/// Shared state between a `BdbRecmap` handle and every `BdbIndex` opened
/// against it: a single owner of the primary table plus the registration
/// list every index reads from and writes through.
pub struct BdbRecmapInner {
	pub field_info: Vec<FieldInfo>,
	pub key_field_count: usize,
	pub unique: bool,
	pub compare_fields: Option<Comparator>,
	pub table: Mutex<Table>,
	pub secondaries: Mutex<Vec<Arc<SecondaryRegistration>>>,
}

impl BdbRecmapInner {
	/// Removes the primary row at `key` plus its projection out of every
	/// registered secondary index, returning the value it held. Used both by
	/// `BackendRecmap::delete` and by a secondary index's `delete_rec`; both
	/// call sites need the removed value to record an undo entry.
	pub fn delete_key(&self, key: &[u8]) -> Result<Vec<u8>> {
		let removed = {
			let mut table = self.table.lock();
			table.remove_key(key)?
		};
		let values = match removed {
			Some(v) => v,
			None => return Err(ErrorKind::NotFound.into()),
		};
		let value = values.into_iter().next().unwrap_or_default();
		let secondaries = self.secondaries.lock();
		for reg in secondaries.iter() {
			let skey = reg.extract_key(&self.field_info, self.key_field_count, key, &value)?;
			let mut stab = reg.table.lock();
			stab.remove_pair(&skey, key)?;
		}
		Ok(value)
	}

	/// Puts a row back exactly as `insert` would, without the uniqueness
	/// check: used to undo a delete, where the row is known to have been
	/// valid a moment ago.
	pub fn raw_insert(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
		let mut table = self.table.lock();
		self.reindex_insert(&key, &value)?;
		table.insert(key, value)
	}

	/// Replaces the value half of the row at `key`, currently `from_value`,
	/// with `to_value`, without touching the key. Shared by the normal
	/// value-only `update` path and its undo (with `from_value`/`to_value`
	/// swapped).
	pub fn raw_replace_value(&self, key: &[u8], from_value: &[u8], to_value: &[u8]) -> Result<()> {
		self.reindex_remove(key, from_value)?;
		self.reindex_insert(key, to_value)?;
		let mut table = self.table.lock();
		table.remove_key(key)?;
		table.insert(key.to_vec(), to_value.to_vec())
	}

	fn reindex_insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
		let secondaries = self.secondaries.lock();
		// First pass: derive every secondary key and check uniqueness without
		// mutating anything, so a later index's violation can't leave an
		// earlier index holding an orphan entry for a primary row that never
		// actually gets inserted.
		let mut skeys = Vec::with_capacity(secondaries.len());
		for reg in secondaries.iter() {
			let skey = reg.extract_key(&self.field_info, self.key_field_count, key, value)?;
			if reg.unique && reg.table.lock().get(&skey).map(|v| !v.is_empty()).unwrap_or(false) {
				return Err(ErrorKind::PredicateViolation(
					"unique secondary index violated".to_owned(),
				).into());
			}
			skeys.push(skey);
		}
		// Second pass: every index is known to accept this row, so mutate.
		for (reg, skey) in secondaries.iter().zip(skeys) {
			reg.table.lock().insert(skey, key.to_vec())?;
		}
		Ok(())
	}

	fn reindex_remove(&self, key: &[u8], value: &[u8]) -> Result<()> {
		let secondaries = self.secondaries.lock();
		for reg in secondaries.iter() {
			let skey = reg.extract_key(&self.field_info, self.key_field_count, key, value)?;
			reg.table.lock().remove_pair(&skey, key)?;
		}
		Ok(())
	}
}

pub struct BdbRecmap {
	pub inner: Arc<BdbRecmapInner>,
	name: Option<String>,
	registry: Arc<Mutex<HashMap<String, Arc<BdbRecmapInner>>>>,
}

impl BdbRecmap {
	pub fn new(inner: Arc<BdbRecmapInner>, name: Option<String>, registry: Arc<Mutex<HashMap<String, Arc<BdbRecmapInner>>>>) -> BdbRecmap {
		BdbRecmap { inner: inner, name: name, registry: registry }
	}
}

impl BackendRecmap for BdbRecmap {
	fn insert(&self, key: Vec<u8>, value: Vec<u8>, tx: &BackendTransaction) -> Result<()> {
		let btx = transaction::downcast(tx)?;
		btx.locks().lock_exclusive(&key, btx.id())?;
		{
			let mut table = self.inner.table.lock();
			if self.inner.unique && table.get(&key).map(|v| !v.is_empty()).unwrap_or(false) {
				return Err(ErrorKind::KeyViolation.into());
			}
			self.inner.reindex_insert(&key, &value)?;
			table.insert(key.clone(), value)?;
		}
		btx.push_undo(UndoOp::Insert { recmap: self.inner.clone(), key: key });
		Ok(())
	}

	fn update(&self, old_key: &[u8], new_key: Option<Vec<u8>>, new_value: Vec<u8>, tx: &BackendTransaction) -> Result<()> {
		let btx = transaction::downcast(tx)?;
		btx.locks().lock_exclusive(old_key, btx.id())?;
		match new_key {
			Some(nk) => {
				let old_value = self.inner.delete_key(old_key)?;
				btx.push_undo(UndoOp::Delete { recmap: self.inner.clone(), key: old_key.to_vec(), value: old_value });
				self.insert(nk, new_value, tx)
			}
			None => {
				let old_value = {
					let table = self.inner.table.lock();
					table.get(old_key).and_then(|v| v.first().cloned())
				};
				let old_value = old_value.ok_or(ErrorKind::NotFound)?;
				self.inner.raw_replace_value(old_key, &old_value, &new_value)?;
				btx.push_undo(UndoOp::Replace { recmap: self.inner.clone(), key: old_key.to_vec(), old_value: old_value, new_value: new_value });
				Ok(())
			}
		}
	}

	fn delete(&self, key: &[u8], tx: &BackendTransaction) -> Result<()> {
		let btx = transaction::downcast(tx)?;
		btx.locks().lock_exclusive(key, btx.id())?;
		let old_value = self.inner.delete_key(key)?;
		btx.push_undo(UndoOp::Delete { recmap: self.inner.clone(), key: key.to_vec(), value: old_value });
		Ok(())
	}

	fn get(&self, key: &[u8], tx: &BackendTransaction) -> Result<Option<Vec<u8>>> {
		let btx = transaction::downcast(tx)?;
		btx.locks().lock_shared(key, btx.id())?;
		let table = self.inner.table.lock();
		Ok(table.get(key).and_then(|v| v.first().cloned()))
	}

	fn contains(&self, key: &[u8], value: &[u8], tx: &BackendTransaction) -> Result<bool> {
		let btx = transaction::downcast(tx)?;
		btx.locks().lock_shared(key, btx.id())?;
		let table = self.inner.table.lock();
		Ok(table.contains_pair(key, value))
	}

	fn estimated_size(&self, _tx: &BackendTransaction) -> Result<u64> {
		Ok(self.inner.table.lock().len() as u64)
	}

	fn cursor(&self, _writable: bool, tx: &BackendTransaction) -> Result<Box<BackendCursor>> {
		let _ = transaction::downcast(tx)?;
		let rows = self.inner.table.lock().snapshot();
		let order = match self.inner.compare_fields {
			Some(ref comparator) => KeyOrder::Fields {
				field_info: self.inner.field_info.clone(),
				key_field_count: self.inner.key_field_count,
				comparator: comparator.clone(),
			},
			None => KeyOrder::Raw,
		};
		Ok(Box::new(BdbCursor::new(rows, order)))
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}

	fn destroy(&self, tx: &BackendTransaction) -> Result<()> {
		let _ = transaction::downcast(tx)?;
		if let Some(ref name) = self.name {
			self.registry.lock().remove(name);
		}
		let old_table = mem::replace(&mut *self.inner.table.lock(), Table::anonymous());
		old_table.destroy()
	}

	fn as_any(&self) -> &::std::any::Any {
		self
	}
}
