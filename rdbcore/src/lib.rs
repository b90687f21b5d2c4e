//! Storage and catalog core of a Tutorial-D style relational engine.
//!
//! This crate turns logical tables and indexes into persistent records and
//! back. It is organised in three tiers, leaves first:
//!
//! 1. `backend` — two concrete record-layer implementations: an embedded,
//!    BerkeleyDB-style driver (`backend::bdb`) and a SQL-style driver that
//!    maps onto a Postgres connection (`backend::pg`). Both implement the
//!    same set of traits so the layers above never branch on backend
//!    identity.
//! 2. The record layer proper — [`Environment`], [`Recmap`], [`Index`],
//!    [`Cursor`], [`RecTransaction`], [`Sequence`] — which is
//!    backend-independent and defines field encoding, key/value framing,
//!    cursor positioning and the deferred-deletion protocol.
//! 3. `stored_table` and `catalog` — the glue that binds a logical table
//!    (heading, declared keys, user indexes) to a [`Recmap`] plus a set of
//!    [`Index`]es, and that reads/writes the system catalog.
//!
//! Control flow for a typical write: caller -> stored-table op -> recmap op
//! -> driver op. Data flows down as typed [`Object`] values, through field
//! encoding, into a vector of backend-native byte ranges.

#![warn(missing_docs)]

extern crate byteorder;
#[macro_use]
extern crate error_chain;
extern crate fs2;
#[macro_use]
extern crate log;
extern crate memmap;
extern crate parking_lot;
extern crate postgres;
extern crate tiny_keccak;
#[cfg(test)]
#[macro_use]
extern crate matches;
#[cfg(test)]
#[macro_use]
extern crate quickcheck;
#[cfg(test)]
extern crate tempdir;
#[cfg(test)]
extern crate env_logger;

pub mod backend;
mod catalog;
mod cursor;
mod environment;
mod error;
mod field;
mod heading;
mod object;
mod recmap;
mod rindex;
mod sequence;
mod stored_table;
mod transaction;

pub use catalog::{Catalog, Identifier};
pub use cursor::{Cursor, CursorPosition, SeekMode};
pub use environment::{Environment, TraceLevel};
pub use error::{Error, ErrorKind, Result};
pub use field::{decode_object, encode_object, Comparator, Field, FieldFlags, FieldInfo};
pub use heading::{Attribute, Heading, TableKey};
pub use object::Object;
pub use recmap::{Recmap, RecmapFlags};
pub use rindex::{Index, IndexFlags};
pub use sequence::Sequence;
pub use stored_table::{StoredTable, TableIndex};
pub use transaction::RecTransaction;
