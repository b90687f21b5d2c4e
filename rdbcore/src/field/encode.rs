//! Framing codec: packs a half (key or value) of a record's fields into a
//! single contiguous buffer, and unpacks it again.
//!
//! Layout of one half, given its field numbers in ascending order:
//! `[len(v0) len(v1) ...][fixed(f0) fixed(f1) ...][var(v0) var(v1) ...]`
//! where `v*` ranges over this half's variable-length fields in
//! field-number order and `f*` over its fixed-length fields in
//! field-number order. A half with no variable-length fields has no
//! header at all.

use byteorder::{BigEndian, ByteOrder};

use super::{Field, FieldInfo, LEN_SLOT_SIZE};
use error::{ErrorKind, Result};

fn half_bounds(key_field_count: usize, total_fields: usize, is_key: bool) -> (usize, usize) {
	if is_key {
		(0, key_field_count)
	} else {
		(key_field_count, total_fields)
	}
}

fn encode_half(fields: &[Field], field_info: &[FieldInfo], start: usize, end: usize) -> Result<Vec<u8>> {
	let mut var_lens = Vec::new();
	let mut fixed_bytes = Vec::new();
	let mut var_bytes = Vec::new();

	for no in start..end {
		let f = fields.iter().find(|f| f.no == no).ok_or_else(|| {
			ErrorKind::Corrupt(format!("missing field {} while encoding", no))
		})?;
		let info = &field_info[no];
		if info.is_fixed() {
			let width = info.fixed_width().unwrap();
			if f.data.len() != width {
				return Err(ErrorKind::TypeMismatch(format!(
					"field {} expected {} bytes, got {}", no, width, f.data.len()
				)).into());
			}
			fixed_bytes.extend_from_slice(&f.data);
		} else {
			var_lens.push(f.data.len() as u32);
			var_bytes.extend_from_slice(&f.data);
		}
	}

	let mut header = Vec::with_capacity(var_lens.len() * LEN_SLOT_SIZE);
	for len in var_lens {
		let mut slot = [0u8; LEN_SLOT_SIZE];
		BigEndian::write_u32(&mut slot, len);
		header.extend_from_slice(&slot);
	}

	let mut out = Vec::with_capacity(header.len() + fixed_bytes.len() + var_bytes.len());
	out.extend_from_slice(&header);
	out.extend_from_slice(&fixed_bytes);
	out.extend_from_slice(&var_bytes);
	Ok(out)
}

pub fn fields_to_bytes(fields: &[Field], field_info: &[FieldInfo], key_field_count: usize) -> Result<(Vec<u8>, Vec<u8>)> {
	let total = field_info.len();
	let (ks, ke) = half_bounds(key_field_count, total, true);
	let (vs, ve) = half_bounds(key_field_count, total, false);
	let key_bytes = encode_half(fields, field_info, ks, ke)?;
	let value_bytes = encode_half(fields, field_info, vs, ve)?;
	Ok((key_bytes, value_bytes))
}

/// Encodes just the key half, given only the key fields (0..key_field_count).
/// Used when a caller has a record's key but not its value, e.g. a point
/// delete or a lookup by primary key.
pub fn encode_key_half(key_fields: &[Field], field_info: &[FieldInfo], key_field_count: usize) -> Result<Vec<u8>> {
	encode_half(key_fields, field_info, 0, key_field_count)
}

/// Encodes just the value half, given only the value fields
/// (key_field_count..field_count).
pub fn encode_value_half(value_fields: &[Field], field_info: &[FieldInfo], key_field_count: usize) -> Result<Vec<u8>> {
	encode_half(value_fields, field_info, key_field_count, field_info.len())
}

/// Describes where, within an encoded half, the `no`th field's bytes live.
struct Located {
	offset: usize,
	len: usize,
}

fn locate(buf: &[u8], field_info: &[FieldInfo], start: usize, end: usize, no: usize) -> Result<Located> {
	if no < start || no >= end {
		return Err(ErrorKind::InvalidArgument(format!("field {} not in this half", no)).into());
	}
	let var_field_nos: Vec<usize> = (start..end).filter(|&n| !field_info[n].is_fixed()).collect();
	let header_size = var_field_nos.len() * LEN_SLOT_SIZE;
	if buf.len() < header_size {
		return Err(ErrorKind::Corrupt("framing header truncated".to_owned()).into());
	}

	let mut fixed_offset = header_size;
	let mut var_payload_offset = header_size;
	for n in start..end {
		if field_info[n].is_fixed() {
			var_payload_offset += field_info[n].fixed_width().unwrap();
		}
	}

	let mut running_fixed = fixed_offset;
	let mut running_var = var_payload_offset;
	for n in start..end {
		if field_info[n].is_fixed() {
			let width = field_info[n].fixed_width().unwrap();
			if n == no {
				return Ok(Located { offset: running_fixed, len: width });
			}
			running_fixed += width;
		} else {
			let slot_idx = var_field_nos.iter().position(|&x| x == n).unwrap();
			let len = BigEndian::read_u32(&buf[slot_idx * LEN_SLOT_SIZE..slot_idx * LEN_SLOT_SIZE + LEN_SLOT_SIZE]) as usize;
			if n == no {
				return Ok(Located { offset: running_var, len: len });
			}
			running_var += len;
		}
	}
	let _ = fixed_offset;
	unreachable!("field {} in [{}, {}) not located", no, start, end)
}

pub fn get_field<'a>(buf: &'a [u8], field_info: &[FieldInfo], key_field_count: usize, half_is_key: bool, no: usize) -> Result<&'a [u8]> {
	let total = field_info.len();
	let (start, end) = half_bounds(key_field_count, total, half_is_key);
	let loc = locate(buf, field_info, start, end, no)?;
	if buf.len() < loc.offset + loc.len {
		return Err(ErrorKind::Corrupt(format!("field {} payload truncated", no)).into());
	}
	Ok(&buf[loc.offset..loc.offset + loc.len])
}

pub fn set_field(buf: &mut [u8], field_info: &[FieldInfo], key_field_count: usize, half_is_key: bool, field: &Field) -> Result<()> {
	let total = field_info.len();
	let (start, end) = half_bounds(key_field_count, total, half_is_key);
	let loc = locate(buf, field_info, start, end, field.no)?;
	if loc.len != field.data.len() {
		return Err(ErrorKind::InvalidArgument(format!(
			"in-place set of field {} would change its length ({} -> {})",
			field.no, loc.len, field.data.len()
		)).into());
	}
	buf[loc.offset..loc.offset + loc.len].copy_from_slice(&field.data);
	Ok(())
}

pub fn bytes_to_fields(
	key_bytes: &[u8],
	value_bytes: &[u8],
	field_info: &[FieldInfo],
	key_field_count: usize,
	requested: &[usize],
) -> Result<Vec<Field>> {
	let total = field_info.len();
	let mut out = Vec::with_capacity(requested.len());
	for &no in requested {
		if no >= total {
			return Err(ErrorKind::InvalidArgument(format!("no such field {}", no)).into());
		}
		let is_key = no < key_field_count;
		let buf = if is_key { key_bytes } else { value_bytes };
		let bytes = get_field(buf, field_info, key_field_count, is_key, no)?;
		out.push(Field::new(no, bytes.to_vec()));
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use field::{Field, FieldFlags, FieldInfo};

	fn sample_info() -> Vec<FieldInfo> {
		vec![
			FieldInfo::fixed("id", FieldFlags::INTEGER, 8),
			FieldInfo::variable("name", FieldFlags::CHAR),
			FieldInfo::fixed("active", FieldFlags::BOOLEAN, 1),
			FieldInfo::variable("bio", FieldFlags::NONE),
		]
	}

	#[test]
	fn roundtrip_mixed_fixed_and_variable() {
		let info = sample_info();
		let fields = vec![
			Field::new(0, vec![0u8; 8]),
			Field::new(1, b"alice".to_vec()),
			Field::new(2, vec![1]),
			Field::new(3, b"hello world".to_vec()),
		];
		let (key, value) = fields_to_bytes(&fields, &info, 1).unwrap();
		let back = bytes_to_fields(&key, &value, &info, 1, &[0, 1, 2, 3]).unwrap();
		assert_eq!(back, fields);
	}

	#[test]
	fn get_field_locates_without_full_decode() {
		let info = sample_info();
		let fields = vec![
			Field::new(0, vec![0u8; 8]),
			Field::new(1, b"bob".to_vec()),
			Field::new(2, vec![0]),
			Field::new(3, b"x".to_vec()),
		];
		let (_key, value) = fields_to_bytes(&fields, &info, 1).unwrap();
		assert_eq!(get_field(&value, &info, 1, false, 2).unwrap(), &[0]);
		assert_eq!(get_field(&value, &info, 1, false, 3).unwrap(), b"x");
	}

	#[test]
	fn set_field_rejects_length_change() {
		let info = sample_info();
		let fields = vec![
			Field::new(0, vec![0u8; 8]),
			Field::new(1, b"bob".to_vec()),
			Field::new(2, vec![0]),
			Field::new(3, b"x".to_vec()),
		];
		let (_key, mut value) = fields_to_bytes(&fields, &info, 1).unwrap();
		assert!(set_field(&mut value, &info, 1, false, &Field::new(2, vec![1])).is_ok());
		assert!(set_field(&mut value, &info, 1, false, &Field::new(3, b"longer".to_vec())).is_err());
	}

	#[test]
	fn missing_field_is_corrupt_error() {
		let info = sample_info();
		let fields = vec![Field::new(0, vec![0u8; 8])];
		assert!(fields_to_bytes(&fields, &info, 1).is_err());
	}

	quickcheck! {
		// spec §8: `bytes_to_fields(fields_to_bytes(F, info), info) = F` for
		// every field vector consistent with `info`.
		fn roundtrip_arbitrary_mixed_fields(id: u64, name: String, active: bool, bio: String) -> bool {
			let info = sample_info();
			let mut id_bytes = [0u8; 8];
			BigEndian::write_u64(&mut id_bytes, id);
			let fields = vec![
				Field::new(0, id_bytes.to_vec()),
				Field::new(1, name.clone().into_bytes()),
				Field::new(2, vec![if active { 1 } else { 0 }]),
				Field::new(3, bio.clone().into_bytes()),
			];
			let (key, value) = match fields_to_bytes(&fields, &info, 1) {
				Ok(kv) => kv,
				Err(_) => return false,
			};
			let back = match bytes_to_fields(&key, &value, &info, 1, &[0, 1, 2, 3]) {
				Ok(b) => b,
				Err(_) => return false,
			};
			back == fields
		}
	}
}
