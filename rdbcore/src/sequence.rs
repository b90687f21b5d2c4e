//! Backend-agnostic monotone counter (spec §4.2 `Sequence`).

use backend::BackendSequence;
use environment::Environment;
use error::Result;
use transaction::RecTransaction;

/// A persistent counter, used to generate `SERIAL` field values.
pub struct Sequence {
	backend: Box<BackendSequence>,
	name: String,
}

impl Sequence {
	/// Creates a new sequence, initialised at zero.
	pub fn create(name: &str, env: &Environment, tx: &RecTransaction) -> Result<Sequence> {
		tx.ensure_active()?;
		let backend = env.backend().create_sequence(name, tx.as_backend())?;
		Ok(Sequence { backend: backend, name: name.to_owned() })
	}

	/// Opens an existing sequence by name.
	pub fn open(name: &str, env: &Environment, tx: &RecTransaction) -> Result<Sequence> {
		tx.ensure_active()?;
		let backend = env.backend().open_sequence(name, tx.as_backend())?;
		Ok(Sequence { backend: backend, name: name.to_owned() })
	}

	/// This sequence's name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Advances the counter and returns its new value.
	pub fn next(&self, tx: &RecTransaction) -> Result<i64> {
		tx.ensure_active()?;
		self.backend.next(tx.as_backend())
	}

	/// Closes the sequence.
	pub fn close(self) -> Result<()> {
		self.backend.close()
	}

	/// Destroys the sequence.
	pub fn delete(self, tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		self.backend.destroy(tx.as_backend())
	}
}
