//! Wait-for-graph deadlock detection for the embedded driver.
//!
//! The original relies on BerkeleyDB's own lock manager and its
//! `DB_LOCK_DEADLOCK` return code; this crate owns no BerkeleyDB process to
//! borrow that from, so the embedded driver needs its own. A wait-for graph
//! over record-level
//! locks, with the calling thread parked on a condition variable until
//! either the lock frees or a cycle appears, is the standard construction
//! for exactly this shape of problem; it has no direct analogue elsewhere
//! in this crate's surrounding codebase and is recorded as new code in
//! DESIGN.md rather than attributed to an existing file.

use std::collections::{HashMap, HashSet};

use parking_lot::{Condvar, Mutex};

use error::{ErrorKind, Result};

/// Identifies one transaction to the lock manager. The record layer
/// assigns these; the embedded driver never interprets the value.
pub type TxId = u64;

#[derive(Default)]
struct State {
	/// key -> holders currently holding *some* lock on that key.
	holders: HashMap<Vec<u8>, HashSet<TxId>>,
	/// key -> writer currently holding an exclusive lock, if any.
	exclusive: HashMap<Vec<u8>, TxId>,
	/// tx -> the key it is currently blocked waiting for, if any.
	waiting_for_key: HashMap<TxId, Vec<u8>>,
}

/// Per-environment lock table plus the wait-for graph used to detect
/// cycles across record-level locks.
pub struct LockManager {
	state: Mutex<State>,
	freed: Condvar,
}

impl LockManager {
	pub fn new() -> LockManager {
		LockManager { state: Mutex::new(State::default()), freed: Condvar::new() }
	}

	/// Acquires a shared (read) lock on `key` for `tx`, blocking until it
	/// is available or returning `Deadlock` if waiting would close a
	/// cycle in the wait-for graph.
	pub fn lock_shared(&self, key: &[u8], tx: TxId) -> Result<()> {
		self.acquire(key, tx, false)
	}

	/// Acquires an exclusive (write) lock on `key` for `tx`.
	pub fn lock_exclusive(&self, key: &[u8], tx: TxId) -> Result<()> {
		self.acquire(key, tx, true)
	}

	fn acquire(&self, key: &[u8], tx: TxId, exclusive: bool) -> Result<()> {
		let mut state = self.state.lock();
		loop {
			let conflict = if exclusive {
				state.holders.get(key).map(|h| h.iter().any(|&t| t != tx)).unwrap_or(false)
			} else {
				state.exclusive.get(key).map(|&t| t != tx).unwrap_or(false)
			};
			if !conflict {
				if exclusive {
					state.exclusive.insert(key.to_vec(), tx);
				}
				state.holders.entry(key.to_vec()).or_insert_with(HashSet::new).insert(tx);
				state.waiting_for_key.remove(&tx);
				return Ok(());
			}

			state.waiting_for_key.insert(tx, key.to_vec());
			if has_cycle(&state, tx) {
				state.waiting_for_key.remove(&tx);
				return Err(ErrorKind::Deadlock.into());
			}
			self.freed.wait(&mut state);
		}
	}

	/// Releases every lock held by `tx`. Called on commit and abort; a
	/// `Deadlock` error aborts the whole transaction stack, so the caller is
	/// expected to release every nested transaction's locks too.
	pub fn release_all(&self, tx: TxId) {
		let mut state = self.state.lock();
		for holders in state.holders.values_mut() {
			holders.remove(&tx);
		}
		state.exclusive.retain(|_, &mut writer| writer != tx);
		state.waiting_for_key.remove(&tx);
		self.freed.notify_all();
	}
}

/// True if following `waiting_for_key` edges from `start` (through whichever
/// tx currently holds the exclusive lock, or any holder, of the key it's
/// waiting on) returns to `start`.
fn has_cycle(state: &State, start: TxId) -> bool {
	let mut current = start;
	let mut seen = HashSet::new();
	loop {
		let key = match state.waiting_for_key.get(&current) {
			Some(k) => k,
			None => return false,
		};
		let next = match state.exclusive.get(key) {
			Some(&t) => t,
			None => match state.holders.get(key).and_then(|h| h.iter().find(|&&t| t != current)) {
				Some(&t) => t,
				None => return false,
			},
		};
		if next == start {
			return true;
		}
		if !seen.insert(next) {
			return false;
		}
		current = next;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn non_conflicting_locks_both_succeed() {
		let lm = LockManager::new();
		assert!(lm.lock_shared(b"k1", 1).is_ok());
		assert!(lm.lock_shared(b"k1", 2).is_ok());
	}

	#[test]
	fn same_tx_reacquiring_its_own_exclusive_lock_succeeds() {
		let lm = LockManager::new();
		assert!(lm.lock_exclusive(b"k1", 1).is_ok());
		assert!(lm.lock_exclusive(b"k1", 1).is_ok());
	}

	#[test]
	fn release_all_frees_locks_for_other_waiters() {
		let lm = LockManager::new();
		assert!(lm.lock_exclusive(b"k1", 1).is_ok());
		lm.release_all(1);
		assert!(lm.lock_exclusive(b"k1", 2).is_ok());
	}

	#[test]
	fn direct_cycle_is_reported_as_deadlock() {
		let lm = LockManager::new();
		assert!(lm.lock_exclusive(b"a", 1).is_ok());
		assert!(lm.lock_exclusive(b"b", 2).is_ok());
		// tx 1 already waiting on "b" (held by 2); tx 2 now asks for "a"
		// (held by 1), closing the cycle without ever blocking tx 1 first.
		{
			let mut state = lm.state.lock();
			state.waiting_for_key.insert(1, b"b".to_vec());
		}
		assert!(lm.lock_exclusive(b"a", 2).is_err());
	}
}
