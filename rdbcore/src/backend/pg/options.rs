//! Options for opening a SQL-style environment against a Postgres server.

use error::{ErrorKind, Result};

/// User-facing options for `Environment::open` against the SQL driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PgOptions {
	/// A libpq connection string, e.g. `"host=localhost dbname=rdbcore"`.
	pub conninfo: String,
	/// Sent as `SET statement_timeout` right after connecting; `None` leaves
	/// the server default in place.
	pub statement_timeout_ms: Option<u64>,
	/// An optional schema name used to namespace catalog and user tables,
	/// applied via `SET search_path`. `None` uses the connection's default
	/// search path.
	pub schema: Option<String>,
}

impl Default for PgOptions {
	fn default() -> PgOptions {
		PgOptions { conninfo: String::new(), statement_timeout_ms: None, schema: None }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InternalPgOptions {
	pub external: PgOptions,
}

impl InternalPgOptions {
	pub fn from_external(external: PgOptions) -> Result<InternalPgOptions> {
		if external.conninfo.trim().is_empty() {
			bail!(ErrorKind::InvalidOptions("conninfo", "must not be empty".to_owned()));
		}
		if let Some(ref schema) = external.schema {
			if schema.trim().is_empty() || !schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
				bail!(ErrorKind::InvalidOptions("schema", "must be a plain identifier".to_owned()));
			}
		}
		Ok(InternalPgOptions { external: external })
	}
}
