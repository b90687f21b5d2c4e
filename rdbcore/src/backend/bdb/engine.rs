//! The embedded driver's storage engine: an in-memory, key-ordered table
//! backed by an append-only write-ahead log for crash recovery.
//!
//! Keys already arrive transform-encoded by the field layer, so
//! `memcmp` order (i.e. `Vec<u8>`'s `Ord`) is always the correct order —
//! the engine itself never needs to know a key's logical type. This single
//! `BTreeMap`-backed design covers both "B-tree" and "hash
//! primary map" cases: an unordered recmap simply never calls
//! `range`/`first`/`next` in sorted mode and iterates storage order
//! instead, same as the original treats a hash access method as "ordering
//! unspecified" rather than as a structurally different engine.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use memmap::{Mmap, Protection};
use tiny_keccak::sha3_256;

use error::{ErrorKind, Result};

const CHECKSUM_SIZE: usize = 32;
const TAG_INSERT: u8 = 1;
const TAG_DELETE: u8 = 2;

/// One logged mutation, as it appears in the write-ahead log.
enum LogOp<'a> {
	Insert(&'a [u8], &'a [u8]),
	Delete(&'a [u8]),
}

fn append_entry(file: &mut File, op: LogOp) -> Result<()> {
	let mut buf = Vec::new();
	match op {
		LogOp::Insert(k, v) => {
			buf.push(TAG_INSERT);
			write_len_prefixed(&mut buf, k);
			write_len_prefixed(&mut buf, v);
		}
		LogOp::Delete(k) => {
			buf.push(TAG_DELETE);
			write_len_prefixed(&mut buf, k);
		}
	}
	let checksum = sha3_256(&buf);
	buf.extend_from_slice(&checksum);
	file.write_all(&buf).map_err(|e| e.into())
}

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
	let mut len = [0u8; 4];
	BigEndian::write_u32(&mut len, bytes.len() as u32);
	buf.extend_from_slice(&len);
	buf.extend_from_slice(bytes);
}

/// Replays a write-ahead log from its mmap'd bytes into `table`, stopping
/// (without error) at the first truncated or checksum-mismatched entry —
/// that is the torn write left by a crash mid-append, not corruption of
/// already-fsynced data.
fn replay(bytes: &[u8], table: &mut BTreeMap<Vec<u8>, Vec<Vec<u8>>>) {
	let mut pos = 0usize;
	while pos < bytes.len() {
		match try_replay_one(&bytes[pos..], table) {
			Some(consumed) => pos += consumed,
			None => break,
		}
	}
}

fn try_replay_one(bytes: &[u8], table: &mut BTreeMap<Vec<u8>, Vec<Vec<u8>>>) -> Option<usize> {
	if bytes.is_empty() {
		return None;
	}
	let tag = bytes[0];
	let mut cursor = 1usize;
	let read_slice = |b: &[u8], at: &mut usize| -> Option<Vec<u8>> {
		if b.len() < *at + 4 {
			return None;
		}
		let len = BigEndian::read_u32(&b[*at..*at + 4]) as usize;
		*at += 4;
		if b.len() < *at + len {
			return None;
		}
		let out = b[*at..*at + len].to_vec();
		*at += len;
		Some(out)
	};
	match tag {
		TAG_INSERT => {
			let key = read_slice(bytes, &mut cursor)?;
			let value = read_slice(bytes, &mut cursor)?;
			if bytes.len() < cursor + CHECKSUM_SIZE {
				return None;
			}
			let checksum = &bytes[cursor..cursor + CHECKSUM_SIZE];
			if checksum != &sha3_256(&bytes[..cursor])[..] {
				return None;
			}
			cursor += CHECKSUM_SIZE;
			table.entry(key).or_insert_with(Vec::new).push(value);
			Some(cursor)
		}
		TAG_DELETE => {
			let key = read_slice(bytes, &mut cursor)?;
			if bytes.len() < cursor + CHECKSUM_SIZE {
				return None;
			}
			let checksum = &bytes[cursor..cursor + CHECKSUM_SIZE];
			if checksum != &sha3_256(&bytes[..cursor])[..] {
				return None;
			}
			cursor += CHECKSUM_SIZE;
			table.remove(&key);
			Some(cursor)
		}
		_ => None,
	}
}

/// An in-memory table of primary or secondary records, journaled to disk.
///
/// `dup_keys == false` is enforced at the call site (`insert`/`update`)
/// rather than by the map shape, so the same engine backs both unique
/// primary recmaps and non-unique secondary index projections.
pub struct Table {
	log_path: Option<PathBuf>,
	rows: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl Table {
	/// Creates a brand-new, empty table with its own log file.
	pub fn create(log_path: PathBuf) -> Result<Table> {
		if log_path.exists() {
			return Err(ErrorKind::Exists(format!("{}", log_path.display())).into());
		}
		File::create(&log_path)?;
		Ok(Table { log_path: Some(log_path), rows: BTreeMap::new() })
	}

	/// Opens an existing table, replaying its log file.
	pub fn open(log_path: PathBuf) -> Result<Table> {
		if !log_path.exists() {
			return Err(ErrorKind::NotFound.into());
		}
		let mut rows = BTreeMap::new();
		let len = fs::metadata(&log_path)?.len();
		if len > 0 {
			let mmap = Mmap::open_path(&log_path, Protection::Read)?;
			let bytes = unsafe { mmap.as_slice() };
			replay(bytes, &mut rows);
		}
		Ok(Table { log_path: Some(log_path), rows: rows })
	}

	/// An anonymous, purely in-memory table (transient recmaps never get a
	/// storage name).
	pub fn anonymous() -> Table {
		Table { log_path: None, rows: BTreeMap::new() }
	}

	fn log_file(&self) -> Result<Option<File>> {
		match self.log_path {
			Some(ref p) => Ok(Some(OpenOptions::new().append(true).open(p)?)),
			None => Ok(None),
		}
	}

	/// Inserts `value` under `key`. Caller enforces uniqueness before
	/// calling when `dup_keys` is false.
	pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
		if let Some(mut f) = self.log_file()? {
			append_entry(&mut f, LogOp::Insert(&key, &value))?;
		}
		self.rows.entry(key).or_insert_with(Vec::new).push(value);
		Ok(())
	}

	/// Removes every value stored under `key`.
	pub fn remove_key(&mut self, key: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
		if let Some(mut f) = self.log_file()? {
			append_entry(&mut f, LogOp::Delete(key))?;
		}
		Ok(self.rows.remove(key))
	}

	/// Removes one specific `(key, value)` pair, used when a key carries
	/// duplicate values (non-unique secondary index entries). Logged as a
	/// delete of the whole key followed by a reinsert of every surviving
	/// value, so replay never needs a "delete just one duplicate" log
	/// entry of its own.
	pub fn remove_pair(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
		let (removed, survivors) = match self.rows.get_mut(key) {
			Some(values) => {
				let before = values.len();
				values.retain(|v| v != value);
				(values.len() != before, values.clone())
			}
			None => (false, Vec::new()),
		};
		if removed {
			if let Some(mut f) = self.log_file()? {
				append_entry(&mut f, LogOp::Delete(key))?;
				for v in &survivors {
					append_entry(&mut f, LogOp::Insert(key, v))?;
				}
			}
			if survivors.is_empty() {
				self.rows.remove(key);
			} else {
				self.rows.insert(key.to_vec(), survivors);
			}
		}
		Ok(removed)
	}

	pub fn get(&self, key: &[u8]) -> Option<&[Vec<u8>]> {
		self.rows.get(key).map(|v| v.as_slice())
	}

	pub fn contains_pair(&self, key: &[u8], value: &[u8]) -> bool {
		self.rows.get(key).map(|v| v.iter().any(|x| x == value)).unwrap_or(false)
	}

	pub fn len(&self) -> usize {
		self.rows.values().map(|v| v.len()).sum()
	}

	/// A full, storage-order snapshot of `(key, value)` pairs. Taken
	/// eagerly rather than iterated lazily: the synchronous,
	/// single-transaction-stack-per-environment model means no
	/// other writer can be concurrently mutating `rows` while a cursor is
	/// alive, so a snapshot is equivalent to a live view in every
	/// scenario this driver supports, at the cost of O(n) cursor-open
	/// instead of O(1).
	pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
		let mut out = Vec::with_capacity(self.len());
		for (k, values) in &self.rows {
			for v in values {
				out.push((k.clone(), v.clone()));
			}
		}
		out
	}

	pub fn destroy(self) -> Result<()> {
		if let Some(path) = self.log_path {
			fs::remove_file(path)?;
		}
		Ok(())
	}
}

pub fn table_path(base_dir: &Path, name: &str) -> PathBuf {
	base_dir.join(format!("{}.rtab", name))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempdir::TempDir;

	#[test]
	fn create_insert_and_reopen_replays_log() {
		let dir = TempDir::new("rdbcore-engine").unwrap();
		let path = table_path(dir.path(), "t1");
		{
			let mut t = Table::create(path.clone()).unwrap();
			t.insert(b"k1".to_vec(), b"v1".to_vec()).unwrap();
			t.insert(b"k2".to_vec(), b"v2".to_vec()).unwrap();
		}
		let reopened = Table::open(path).unwrap();
		assert_eq!(reopened.get(b"k1"), Some(&[b"v1".to_vec()][..]));
		assert_eq!(reopened.len(), 2);
	}

	#[test]
	fn remove_key_then_reopen_reflects_deletion() {
		let dir = TempDir::new("rdbcore-engine").unwrap();
		let path = table_path(dir.path(), "t2");
		{
			let mut t = Table::create(path.clone()).unwrap();
			t.insert(b"k1".to_vec(), b"v1".to_vec()).unwrap();
			t.remove_key(b"k1").unwrap();
		}
		let reopened = Table::open(path).unwrap();
		assert_eq!(reopened.get(b"k1"), None);
	}

	#[test]
	fn anonymous_table_has_no_log_file() {
		let mut t = Table::anonymous();
		t.insert(b"k".to_vec(), b"v".to_vec()).unwrap();
		assert_eq!(t.len(), 1);
	}
}
