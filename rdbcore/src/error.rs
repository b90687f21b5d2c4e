//! Core error taxonomy.
//!
//! Errors originating in a backend call are mapped to this taxonomy by the
//! driver; the record layer propagates them unchanged. The stored-table
//! layer adds context (operation name, table name) and propagates.

#![allow(unknown_lints)]
#![allow(missing_docs)]

use std::io;

error_chain! {
	foreign_links {
		Io(io::Error);
		Postgres(::postgres::error::Error);
	}

	errors {
		/// An operation expected an existing record, recmap, index or
		/// catalog row and found none.
		NotFound {
			description("not found")
			display("not found"),
		}
		/// Uniqueness constraint violated by the primary key.
		KeyViolation {
			description("key violation")
			display("a record with this key already exists"),
		}
		/// A named object (recmap, index, file) already exists.
		Exists(what: String) {
			description("already exists")
			display("{} already exists", what),
		}
		/// A semantic constraint other than a key was violated (e.g. a
		/// unique secondary index).
		PredicateViolation(msg: String) {
			description("predicate violation")
			display("predicate violation: {}", msg),
		}
		/// Bad field number, malformed identifier, attempt to modify a key
		/// field through a cursor, etc.
		InvalidArgument(msg: String) {
			description("invalid argument")
			display("invalid argument: {}", msg),
		}
		/// Field bytes do not match the declared field type.
		TypeMismatch(msg: String) {
			description("type mismatch")
			display("type mismatch: {}", msg),
		}
		/// A cursor or handle was used after its owning transaction ended,
		/// or a nested transaction was requested where the backend doesn't
		/// support it.
		InvalidTransaction(msg: String) {
			description("invalid transaction")
			display("invalid transaction: {}", msg),
		}
		/// Propagated verbatim from the backend's deadlock detector. The
		/// caller's contract is to abort the whole transaction stack.
		Deadlock {
			description("deadlock")
			display("deadlock detected; transaction aborted"),
		}
		/// The environment, a file, or a relation the operation depends on
		/// is missing.
		ResourceNotFound(msg: String) {
			description("resource not found")
			display("resource not found: {}", msg),
		}
		/// A driver does not implement an optional operation.
		NotSupported(msg: String) {
			description("not supported")
			display("not supported by this backend: {}", msg),
		}
		/// An invariant was violated; should be unreachable in correct use.
		Internal(msg: String) {
			description("internal error")
			display("internal error: {}", msg),
		}
		/// Framing of a record's byte encoding was inconsistent.
		Corrupt(msg: String) {
			description("corrupt record")
			display("corrupt record: {}", msg),
		}
		/// Invalid database/recmap/index options.
		InvalidOptions(field: &'static str, msg: String) {
			description("invalid options")
			display("invalid value of `{}`: {}", field, msg),
		}
	}
}

impl Error {
	/// True if this error should cause the whole transaction stack to be
	/// aborted, per the deadlock policy in the concurrency design.
	pub fn is_deadlock(&self) -> bool {
		matches!(*self.kind(), ErrorKind::Deadlock)
	}
}
