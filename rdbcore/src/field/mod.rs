//! Field descriptors and the byte encoding of a tuple's attributes.
//!
//! A record is split into a *key half* (fields `0..key_field_count`) and a
//! *value half* (the rest). Each half is framed independently: a header of
//! fixed-width length slots for that half's variable-length fields, in
//! field-number order, followed by the fixed-length fields, followed by the
//! variable-length payloads, also in field-number order. A half with no
//! variable-length fields has no header at all.

mod encode;
mod info;
mod object_codec;
mod transform;

pub use self::info::{FieldFlags, FieldInfo};
pub use self::object_codec::{decode_object, encode_object};
pub use self::transform::Comparator;

use error::{Error, ErrorKind, Result};

/// Width in bytes of one length slot in a framing header.
pub const LEN_SLOT_SIZE: usize = 4;

/// A single attribute value together with its field number, in its
/// on-disk encoding.
///
/// Unlike the original's `{no, data, len, copy_fn}` descriptor, `data` is an
/// owned buffer rather than a borrowed pointer into a caller-managed arena:
/// the callback-based materialisation step has no borrow checker to lean on
/// in the original, so owning the bytes here is the direct re-expression of
/// "copy_fn materialises the bytes out of an arena".
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	/// Position of this field in the recmap's field table.
	pub no: usize,
	/// The field's encoded bytes, already transformed for key ordering if
	/// this field number falls within the owning recmap's key half.
	pub data: Vec<u8>,
}

impl Field {
	/// Builds a field descriptor with the given number and pre-encoded bytes.
	pub fn new(no: usize, data: Vec<u8>) -> Field {
		Field { no: no, data: data }
	}
}

/// Encodes a full set of fields into key-half and value-half byte buffers.
///
/// `fields` need not be sorted; the encoder reorders by field number
/// internally. Every field number in `0..field_info.len()` must be present
/// exactly once, or the call fails with `Corrupt`.
pub fn fields_to_bytes(
	fields: &[Field],
	field_info: &[FieldInfo],
	key_field_count: usize,
) -> Result<(Vec<u8>, Vec<u8>)> {
	encode::fields_to_bytes(fields, field_info, key_field_count)
}

/// The inverse of [`fields_to_bytes`]: splits a key-half and value-half
/// buffer pair back into typed field descriptors.
/// Encodes just the key half of a record from its key fields alone (field
/// numbers `0..key_field_count`). Used by point lookups and deletes, which
/// only ever have the key in hand.
pub fn fields_to_key_bytes(key_fields: &[Field], field_info: &[FieldInfo], key_field_count: usize) -> Result<Vec<u8>> {
	encode::encode_key_half(key_fields, field_info, key_field_count)
}

/// Encodes just the value half of a record from its value fields alone
/// (field numbers `key_field_count..field_count`).
pub fn fields_to_value_bytes(value_fields: &[Field], field_info: &[FieldInfo], key_field_count: usize) -> Result<Vec<u8>> {
	encode::encode_value_half(value_fields, field_info, key_field_count)
}

pub fn bytes_to_fields(
	key_bytes: &[u8],
	value_bytes: &[u8],
	field_info: &[FieldInfo],
	key_field_count: usize,
	requested: &[usize],
) -> Result<Vec<Field>> {
	encode::bytes_to_fields(key_bytes, value_bytes, field_info, key_field_count, requested)
}

/// Writes a single field's bytes into an already-framed half buffer,
/// in place, without altering the buffer's total size.
///
/// Only valid for fixed-length fields or when the new bytes have the same
/// length as the old ones; variable-length writes that change length must
/// go through a full re-encode (`update` in the record layer always
/// rebuilds the value half rather than calling this in place).
pub fn set_field(buf: &mut [u8], field_info: &[FieldInfo], key_field_count: usize, half_is_key: bool, field: &Field) -> Result<()> {
	encode::set_field(buf, field_info, key_field_count, half_is_key, field)
}

/// Locates the `no`th field's bytes inside an already-framed half buffer
/// without decoding the whole half.
pub fn get_field<'a>(buf: &'a [u8], field_info: &[FieldInfo], key_field_count: usize, half_is_key: bool, no: usize) -> Result<&'a [u8]> {
	encode::get_field(buf, field_info, key_field_count, half_is_key, no)
}
