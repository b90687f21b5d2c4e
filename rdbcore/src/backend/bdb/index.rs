//! Embedded-driver secondary index: a derived table kept in lock-step with
//! its primary recmap via a stored field-number extraction list, rather
//! than an independent store of its own secondary keys: secondary keys
//! are derived from primary records automatically.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use parking_lot::Mutex;

use error::{ErrorKind, Result};
use field::{get_field, Comparator, FieldInfo};

use super::cursor::{BdbCursor, KeyOrder};
use super::engine::Table;
use super::recmap::BdbRecmapInner;
use super::transaction::{self, UndoOp};
use backend::{BackendCursor, BackendIndex, BackendTransaction, RawRecord};

/// Shared state one `BdbIndex` handle, or several handles to the same
/// index reopened independently, points at.
pub struct SecondaryRegistration {
	pub field_nos: Vec<usize>,
	pub unique: bool,
	pub compare_fields: Option<Comparator>,
	pub table: Mutex<Table>,
}

impl SecondaryRegistration {
	/// Builds the secondary key for a primary record by concatenating the
	/// already key-transformed bytes of each of this index's field
	/// numbers, located in whichever half (key or value) of the primary
	/// record each field actually lives in.
	pub fn extract_key(&self, primary_field_info: &[FieldInfo], primary_key_field_count: usize, primary_key: &[u8], primary_value: &[u8]) -> Result<Vec<u8>> {
		let mut out = Vec::new();
		for &no in &self.field_nos {
			let is_key = no < primary_key_field_count;
			let buf = if is_key { primary_key } else { primary_value };
			let bytes = get_field(buf, primary_field_info, primary_key_field_count, is_key, no)?;
			let mut len = [0u8; 4];
			::byteorder::BigEndian::write_u32(&mut len, bytes.len() as u32);
			out.extend_from_slice(&len);
			out.extend_from_slice(bytes);
		}
		Ok(out)
	}
}

pub struct BdbIndex {
	reg: Arc<SecondaryRegistration>,
	primary: Arc<BdbRecmapInner>,
	name: Option<String>,
	registry: Arc<Mutex<HashMap<String, Arc<SecondaryRegistration>>>>,
}

impl BdbIndex {
	pub fn new(
		reg: Arc<SecondaryRegistration>,
		primary: Arc<BdbRecmapInner>,
		name: Option<String>,
		registry: Arc<Mutex<HashMap<String, Arc<SecondaryRegistration>>>>,
	) -> BdbIndex {
		BdbIndex { reg: reg, primary: primary, name: name, registry: registry }
	}
}

impl BackendIndex for BdbIndex {
	fn get(&self, key: &[u8], tx: &BackendTransaction) -> Result<Option<Vec<u8>>> {
		let _ = transaction::downcast(tx)?;
		let table = self.reg.table.lock();
		Ok(table.get(key).and_then(|v| v.first().cloned()))
	}

	fn cursor(&self, tx: &BackendTransaction) -> Result<Box<BackendCursor>> {
		let _ = transaction::downcast(tx)?;
		let rows = self.reg.table.lock().snapshot();
		let order = match self.reg.compare_fields {
			// `field_nos` order already matches the priority order the
			// comparator's tuples were zipped in (see stored_table.rs), so
			// the per-segment flags line up positionally with the
			// length-prefixed segments `extract_key` lays down.
			Some(ref comparator) => KeyOrder::Segments {
				ascending: comparator.fields().iter().map(|&(_, asc)| asc).collect(),
			},
			None => KeyOrder::Raw,
		};
		Ok(Box::new(BdbCursor::new(rows, order)))
	}

	fn delete_rec(&self, key: &[u8], tx: &BackendTransaction) -> Result<()> {
		let btx = transaction::downcast(tx)?;
		let primary_key = {
			let table = self.reg.table.lock();
			table.get(key).and_then(|v| v.first().cloned())
		};
		match primary_key {
			Some(pk) => {
				let old_value = self.primary.delete_key(&pk)?;
				btx.push_undo(UndoOp::Delete { recmap: self.primary.clone(), key: pk, value: old_value });
				Ok(())
			}
			None => Err(ErrorKind::NotFound.into()),
		}
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}

	fn destroy(&self, tx: &BackendTransaction) -> Result<()> {
		let _ = transaction::downcast(tx)?;
		if let Some(ref name) = self.name {
			self.registry.lock().remove(name);
		}
		self.primary.secondaries.lock().retain(|s| !Arc::ptr_eq(s, &self.reg));
		let old_table = mem::replace(&mut *self.reg.table.lock(), Table::anonymous());
		old_table.destroy()
	}
}

/// A `RawRecord` built from a secondary key and the primary key it maps to,
/// for callers walking an index cursor.
pub fn to_raw(secondary_key: Vec<u8>, primary_key: Vec<u8>) -> RawRecord {
	RawRecord { key: secondary_key, value: primary_key }
}
