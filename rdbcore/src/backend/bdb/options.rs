//! Options for opening an embedded-driver environment.

use error::{ErrorKind, Result};

/// User-facing options for `Environment::open` against the embedded driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BdbOptions {
	/// Directory the driver keeps its table and sequence files in. Created
	/// if it does not already exist.
	pub base_dir: String,
	/// Gates the original's silent "remove on `EEXIST`, then retry create"
	/// behaviour. Defaults to `false`: a
	/// `create_recmap` call against a name that already has a file on
	/// disk fails with `Exists` rather than destroying it.
	pub allow_destructive_recreate: bool,
}

impl Default for BdbOptions {
	fn default() -> BdbOptions {
		BdbOptions { base_dir: ".".to_owned(), allow_destructive_recreate: false }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InternalBdbOptions {
	pub external: BdbOptions,
}

impl InternalBdbOptions {
	pub fn from_external(external: BdbOptions) -> Result<InternalBdbOptions> {
		if external.base_dir.trim().is_empty() {
			bail!(ErrorKind::InvalidOptions("base_dir", "must not be empty".to_owned()));
		}
		Ok(InternalBdbOptions { external: external })
	}
}
