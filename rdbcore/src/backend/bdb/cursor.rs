//! Embedded-driver cursor: a positioned walk over a snapshot of a table's
//! `(key, value)` pairs, taken in the order its owner was created with.
//!
//! Snapshotting at cursor-open time (see `Table::snapshot`) rather than
//! iterating the live `BTreeMap` trades live-update visibility for a
//! trivially correct FSM implementation; defensible under the synchronous,
//! one-transaction-stack-per-environment model, since nothing
//! else can mutate the table underneath an open cursor's transaction.

use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};

use backend::{BackendCursor, RawRecord};
use error::Result;
use field::{self, Comparator, FieldInfo};

/// How a cursor orders the rows in its snapshot.
///
/// A recmap or index created without a comparator keeps the embedded
/// engine's natural `BTreeMap` byte order (`Raw`); one created with a
/// comparator is ordered field by field, in that comparator's priority and
/// direction, rather than by a single whole-key memcmp (which would be
/// wrong for a comparator mixing ascending and descending fields).
pub enum KeyOrder {
	/// Ascending raw byte order over the whole key.
	Raw,
	/// A primary recmap's key half: compare field by field via
	/// `field::get_field`, in the comparator's priority order.
	Fields { field_info: Vec<FieldInfo>, key_field_count: usize, comparator: Comparator },
	/// A secondary index's extracted key: a sequence of length-prefixed
	/// segments in `field_nos` order, compared segment by segment.
	Segments { ascending: Vec<bool> },
}

impl KeyOrder {
	fn cmp_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
		match *self {
			KeyOrder::Raw => a.cmp(b),
			KeyOrder::Fields { ref field_info, key_field_count, ref comparator } => {
				for &(no, ascending) in comparator.fields() {
					let fa = field::get_field(a, field_info, key_field_count, true, no);
					let fb = field::get_field(b, field_info, key_field_count, true, no);
					let ord = match (fa, fb) {
						(Ok(fa), Ok(fb)) => fa.cmp(fb),
						_ => return a.cmp(b),
					};
					let ord = if ascending { ord } else { ord.reverse() };
					if ord != Ordering::Equal {
						return ord;
					}
				}
				Ordering::Equal
			}
			KeyOrder::Segments { ref ascending } => {
				let (mut oa, mut ob) = (0, 0);
				for &asc in ascending {
					let (sa, next_oa) = match read_segment(a, oa) {
						Some(x) => x,
						None => return a.cmp(b),
					};
					let (sb, next_ob) = match read_segment(b, ob) {
						Some(x) => x,
						None => return a.cmp(b),
					};
					let ord = sa.cmp(sb);
					let ord = if asc { ord } else { ord.reverse() };
					if ord != Ordering::Equal {
						return ord;
					}
					oa = next_oa;
					ob = next_ob;
				}
				Ordering::Equal
			}
		}
	}
}

/// Reads one `[len:u32][bytes]` segment at `offset`, returning its payload
/// and the offset just past it.
fn read_segment(buf: &[u8], offset: usize) -> Option<(&[u8], usize)> {
	if buf.len() < offset + 4 {
		return None;
	}
	let len = BigEndian::read_u32(&buf[offset..offset + 4]) as usize;
	let start = offset + 4;
	if buf.len() < start + len {
		return None;
	}
	Some((&buf[start..start + len], start + len))
}

pub struct BdbCursor {
	rows: Vec<(Vec<u8>, Vec<u8>)>,
	order: KeyOrder,
	/// Index into `rows` of the current position, or `rows.len()` for
	/// past-end, or `None` for unpositioned.
	pos: Option<usize>,
}

impl BdbCursor {
	pub fn new(mut rows: Vec<(Vec<u8>, Vec<u8>)>, order: KeyOrder) -> BdbCursor {
		rows.sort_by(|a, b| order.cmp_keys(&a.0, &b.0));
		BdbCursor { rows: rows, order: order, pos: None }
	}

	fn record_at(&self, i: usize) -> Option<RawRecord> {
		self.rows.get(i).map(|&(ref k, ref v)| RawRecord { key: k.clone(), value: v.clone() })
	}
}

impl BackendCursor for BdbCursor {
	fn first(&mut self) -> Result<Option<RawRecord>> {
		if self.rows.is_empty() {
			self.pos = Some(0);
			return Ok(None);
		}
		self.pos = Some(0);
		Ok(self.record_at(0))
	}

	fn next(&mut self, same_key_only: bool) -> Result<Option<RawRecord>> {
		let cur = match self.pos {
			Some(p) => p,
			None => return self.first(),
		};
		if cur >= self.rows.len() {
			return Ok(None);
		}
		if same_key_only {
			let key = self.rows[cur].0.clone();
			let next = cur + 1;
			if next < self.rows.len() && self.rows[next].0 == key {
				self.pos = Some(next);
				return Ok(self.record_at(next));
			}
			self.pos = Some(self.rows.len());
			return Ok(None);
		}
		let next = cur + 1;
		self.pos = Some(next);
		Ok(self.record_at(next))
	}

	fn prev(&mut self) -> Result<Option<RawRecord>> {
		let cur = match self.pos {
			Some(p) => p,
			None => return Ok(None),
		};
		if cur == 0 {
			self.pos = None;
			return Ok(None);
		}
		let prev = cur - 1;
		self.pos = Some(prev);
		Ok(self.record_at(prev))
	}

	fn seek(&mut self, key: &[u8], exact: bool) -> Result<Option<RawRecord>> {
		let order = &self.order;
		let idx = self.rows.binary_search_by(|row| order.cmp_keys(&row.0, key));
		match idx {
			Ok(i) => {
				self.pos = Some(i);
				self.record_at(i).map(Some).or(Ok(None))
			}
			Err(i) => {
				if exact {
					self.pos = Some(self.rows.len());
					return Ok(None);
				}
				self.pos = Some(i);
				if i < self.rows.len() {
					self.record_at(i).map(Some).or(Ok(None))
				} else {
					Ok(None)
				}
			}
		}
	}

	fn current(&self) -> Option<RawRecord> {
		self.pos.and_then(|p| self.record_at(p))
	}

	fn set_value(&mut self, value: Vec<u8>) -> Result<()> {
		let cur = match self.pos {
			Some(p) if p < self.rows.len() => p,
			_ => return Err(::error::ErrorKind::InvalidTransaction("cursor not positioned".to_owned()).into()),
		};
		self.rows[cur].1 = value;
		Ok(())
	}

	fn delete(&mut self) -> Result<()> {
		let cur = match self.pos {
			Some(p) if p < self.rows.len() => p,
			_ => return Err(::error::ErrorKind::InvalidTransaction("cursor not positioned".to_owned()).into()),
		};
		self.rows.remove(cur);
		self.pos = None;
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rows() -> Vec<(Vec<u8>, Vec<u8>)> {
		vec![
			(vec![3], vec![b'c']),
			(vec![1], vec![b'a']),
			(vec![2], vec![b'b']),
		]
	}

	#[test]
	fn first_and_next_visit_in_ascending_order() {
		let mut c = BdbCursor::new(rows(), KeyOrder::Raw);
		assert_eq!(c.first().unwrap().unwrap().key, vec![1]);
		assert_eq!(c.next(false).unwrap().unwrap().key, vec![2]);
		assert_eq!(c.next(false).unwrap().unwrap().key, vec![3]);
		assert!(c.next(false).unwrap().is_none());
	}

	#[test]
	fn seek_exact_missing_key_lands_past_end() {
		let mut c = BdbCursor::new(rows(), KeyOrder::Raw);
		assert!(c.seek(&[9], true).unwrap().is_none());
	}

	#[test]
	fn seek_range_lands_on_next_greater_key() {
		let mut c = BdbCursor::new(rows(), KeyOrder::Raw);
		let found = c.seek(&[2], false).unwrap().unwrap();
		assert_eq!(found.key, vec![2]);
	}

	#[test]
	fn descending_comparator_reverses_visit_order() {
		let comparator = Comparator::new(vec![(0, false)]);
		let field_info = vec![FieldInfo::fixed("id", field::FieldFlags::INTEGER, 1)];
		let order = KeyOrder::Fields { field_info: field_info, key_field_count: 1, comparator: comparator };
		let mut c = BdbCursor::new(rows(), order);
		assert_eq!(c.first().unwrap().unwrap().key, vec![3]);
		assert_eq!(c.next(false).unwrap().unwrap().key, vec![2]);
		assert_eq!(c.next(false).unwrap().unwrap().key, vec![1]);
		assert!(c.next(false).unwrap().is_none());
	}
}
