//! Shared helpers for mapping field numbers to SQL column names and field
//! encodings to SQL column types, used by both `recmap` and `index`.
//!
//! The original names columns `d_<attrname>` (`pgrec/pgrecmap.c`). This
//! driver names them `f<no>` instead: field numbers are the stable handle
//! the rest of this crate addresses fields by (spec glossary, "Field
//! number"), and sidestepping attribute-name-to-SQL-identifier escaping
//! entirely removes a whole class of quoting bugs for a column that is
//! never queried by name from outside this module.

use error::Result;
use field::{self, Field, FieldInfo};

/// The SQL column name that stores field `no`'s raw encoded bytes (already
/// key-transformed if `no` is a key field of the owning recmap).
pub fn column(no: usize) -> String {
	format!("f{}", no)
}

/// Every field is stored as `bytea`: the field-encoding layer above this
/// driver already produces a byte image appropriate to the field's type,
/// and Postgres's `bytea` ordering is byte-wise, matching
/// the transform contract exactly. A typed column per `FieldFlags` was
/// considered and rejected: it would require re-deriving SQL literal syntax
/// per primitive type for no behavioural gain, since every comparison this
/// crate performs is already byte-wise by the time it reaches the driver.
pub const COLUMN_TYPE: &str = "bytea";

/// Decodes a recmap's key-half and value-half buffers into one `Field` per
/// column, in field-number order, for use as the row to insert/compare.
pub fn decode_row(key_bytes: &[u8], value_bytes: &[u8], field_info: &[FieldInfo], key_field_count: usize) -> Result<Vec<Field>> {
	let requested: Vec<usize> = (0..field_info.len()).collect();
	field::bytes_to_fields(key_bytes, value_bytes, field_info, key_field_count, &requested)
}

/// Builds the column list and parameter placeholders for an `INSERT`
/// statement over `key`, `value` plus one `f<no>` column per field.
pub fn insert_columns(total_fields: usize) -> (String, String) {
	let mut cols = vec!["key".to_owned(), "value".to_owned()];
	cols.extend((0..total_fields).map(column));
	let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${}", i)).collect();
	(cols.join(","), placeholders.join(","))
}

/// Reconstructs the concatenated, framed bytes for a subset of fields (an
/// index's `fields[]`) from their individually stored column bytes, exactly
/// as `field::fields_to_key_bytes` would encode them if the caller had
/// passed them in as a standalone key. Used to report an index cursor's
/// "current key" to the record layer.
pub fn reencode_index_key(column_bytes: &[Vec<u8>], subset_info: &[FieldInfo]) -> Result<Vec<u8>> {
	let fields: Vec<Field> = column_bytes.iter().enumerate().map(|(i, b)| Field::new(i, b.clone())).collect();
	field::fields_to_key_bytes(&fields, subset_info, subset_info.len())
}

/// Builds the `FieldInfo` slice an index operates over: the owning recmap's
/// field metadata, reordered and restricted to `field_nos`: a virtual
/// recmap whose key is the index's field list.
pub fn subset_field_info(primary_info: &[FieldInfo], field_nos: &[usize]) -> Vec<FieldInfo> {
	field_nos.iter().map(|&no| primary_info[no].clone()).collect()
}
