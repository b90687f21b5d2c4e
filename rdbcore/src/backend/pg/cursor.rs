//! SQL-style driver cursor.
//!
//! `DECLARE CURSOR`/`FETCH` is the obvious SQL translation; in practice,
//! against a table this driver already materialises entirely server-side
//! with a single ordered `SELECT`, a server-side `DECLARE`d cursor buys
//! nothing a client-held row buffer doesn't also give us, and the
//! snapshot-at-open semantics match the embedded driver's cursor exactly:
//! synchronous, single-transaction-stack-per-environment, so nothing else
//! can mutate the table underneath an open cursor's transaction. The FSM
//! itself is identical to `backend::bdb::cursor::BdbCursor`; kept as a
//! separate type rather than shared code because the two drivers'
//! cursors are grounded on different underlying mechanisms -- one trait
//! with two independent impls, never branching on backend identity above
//! this module.

use backend::{BackendCursor, RawRecord};
use error::{ErrorKind, Result};

pub struct PgCursor {
	rows: Vec<(Vec<u8>, Vec<u8>)>,
	pos: Option<usize>,
}

impl PgCursor {
	pub fn new(rows: Vec<(Vec<u8>, Vec<u8>)>) -> PgCursor {
		PgCursor { rows: rows, pos: None }
	}

	fn record_at(&self, i: usize) -> Option<RawRecord> {
		self.rows.get(i).map(|&(ref k, ref v)| RawRecord { key: k.clone(), value: v.clone() })
	}
}

impl BackendCursor for PgCursor {
	fn first(&mut self) -> Result<Option<RawRecord>> {
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
		let idx = self.rows.binary_search_by(|row| row.0.as_slice().cmp(key));
		match idx {
			Ok(i) => {
				self.pos = Some(i);
				Ok(self.record_at(i))
			}
			Err(i) => {
				if exact {
					self.pos = Some(self.rows.len());
					return Ok(None);
				}
				self.pos = Some(i);
				Ok(if i < self.rows.len() { self.record_at(i) } else { None })
			}
		}
	}

	fn current(&self) -> Option<RawRecord> {
		self.pos.and_then(|p| self.record_at(p))
	}

	fn set_value(&mut self, value: Vec<u8>) -> Result<()> {
		let cur = match self.pos {
			Some(p) if p < self.rows.len() => p,
			_ => return Err(ErrorKind::InvalidTransaction("cursor not positioned".to_owned()).into()),
		};
		self.rows[cur].1 = value;
		Ok(())
	}

	fn delete(&mut self) -> Result<()> {
		let cur = match self.pos {
			Some(p) if p < self.rows.len() => p,
			_ => return Err(ErrorKind::InvalidTransaction("cursor not positioned".to_owned()).into()),
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

	#[test]
	fn first_and_next_walk_rows_in_stored_order() {
		let mut c = PgCursor::new(vec![(vec![1], vec![b'a']), (vec![2], vec![b'b'])]);
		assert_eq!(c.first().unwrap().unwrap().key, vec![1]);
		assert_eq!(c.next(false).unwrap().unwrap().key, vec![2]);
		assert!(c.next(false).unwrap().is_none());
	}
}
