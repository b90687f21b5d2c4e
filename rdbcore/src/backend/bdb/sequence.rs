//! Embedded-driver sequence: a journaled monotone counter.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;

use backend::{BackendSequence, BackendTransaction};
use error::Result;

use super::transaction;

pub struct BdbSequence {
	path: Option<PathBuf>,
	value: Mutex<i64>,
}

impl BdbSequence {
	pub fn create(path: PathBuf) -> Result<BdbSequence> {
		fs::write(&path, b"0")?;
		Ok(BdbSequence { path: Some(path), value: Mutex::new(0) })
	}

	pub fn open(path: PathBuf) -> Result<BdbSequence> {
		let contents = fs::read_to_string(&path)?;
		let value = contents.trim().parse::<i64>().map_err(|_| {
			::error::ErrorKind::Corrupt(format!("sequence file {} does not contain an integer", path.display()))
		})?;
		Ok(BdbSequence { path: Some(path), value: Mutex::new(value) })
	}
}

impl BackendSequence for BdbSequence {
	fn next(&self, tx: &BackendTransaction) -> Result<i64> {
		let _ = transaction::downcast(tx)?;
		let mut value = self.value.lock();
		*value += 1;
		if let Some(ref path) = self.path {
			fs::write(path, format!("{}", *value))?;
		}
		Ok(*value)
	}

	fn close(&self) -> Result<()> {
		Ok(())
	}

	fn destroy(&self, tx: &BackendTransaction) -> Result<()> {
		let _ = transaction::downcast(tx)?;
		if let Some(ref path) = self.path {
			fs::remove_file(path)?;
		}
		Ok(())
	}
}
