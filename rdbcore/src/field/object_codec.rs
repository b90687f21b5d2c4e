//! Converts typed [`Object`] values to and from a field's on-disk bytes.
//!
//! This is the step the stored-table layer runs before a [`Field`] ever
//! reaches `fields_to_bytes`: fixed-width primitives get their natural-width
//! encoding (spec §4.1), and key-half fields additionally go through the
//! order-preserving [`transform`] so a byte-comparing backend sorts them
//! correctly. Opaque binary (including serialised tuple/relation values)
//! passes through unchanged in both directions.

use byteorder::{BigEndian, ByteOrder};

use error::{ErrorKind, Result};
use object::Object;

use super::info::{FieldFlags, FieldInfo};
use super::transform;

/// Encodes `obj` into the bytes this field would carry on disk, applying the
/// key-ordering transform when `is_key_field` is set.
pub fn encode_object(obj: &Object, info: &FieldInfo, is_key_field: bool) -> Result<Vec<u8>> {
	let raw = match *obj {
		Object::Boolean(b) => vec![b as u8],
		Object::Integer(v) | Object::Serial(v) => {
			let mut buf = [0u8; 8];
			BigEndian::write_i64(&mut buf, v);
			buf.to_vec()
		}
		Object::Float(v) => {
			let mut buf = [0u8; 8];
			BigEndian::write_u64(&mut buf, v.to_bits());
			buf.to_vec()
		}
		Object::CharStr(ref s) => s.as_bytes().to_vec(),
		Object::Binary(ref b) | Object::Tuple(ref b) | Object::Relation(ref b) => b.clone(),
	};
	if is_key_field {
		Ok(transform::transform_key_bytes(info.flags, &raw))
	} else {
		Ok(raw)
	}
}

/// The inverse of [`encode_object`]: decodes `bytes` back into a typed
/// `Object`, according to `info.flags`, reversing the key transform first
/// when `is_key_field` is set. Fields with no primitive flag decode to
/// `Object::Binary`; callers that know a field holds a serialised tuple or
/// relation re-wrap it themselves.
pub fn decode_object(bytes: &[u8], info: &FieldInfo, is_key_field: bool) -> Result<Object> {
	if info.flags == FieldFlags::BOOLEAN {
		let b = *bytes.get(0).ok_or_else(|| ErrorKind::Corrupt("empty boolean field".to_owned()))?;
		return Ok(Object::Boolean(b != 0));
	}
	if info.flags == FieldFlags::INTEGER || info.flags == FieldFlags::SERIAL {
		if bytes.len() != 8 {
			return Err(ErrorKind::Corrupt(format!("integer field has {} bytes, expected 8", bytes.len())).into());
		}
		let v = if is_key_field { transform::decode_integer_key(bytes) } else { BigEndian::read_i64(bytes) };
		return Ok(if info.flags == FieldFlags::SERIAL { Object::Serial(v) } else { Object::Integer(v) });
	}
	if info.flags == FieldFlags::FLOAT {
		if bytes.len() != 8 {
			return Err(ErrorKind::Corrupt(format!("float field has {} bytes, expected 8", bytes.len())).into());
		}
		let v = if is_key_field { transform::decode_float_key(bytes) } else { f64::from_bits(BigEndian::read_u64(bytes)) };
		return Ok(Object::Float(v));
	}
	if info.flags == FieldFlags::CHAR {
		let s = if is_key_field {
			transform::decode_char_key(bytes).map_err(|e| ErrorKind::Corrupt(format!("invalid utf-8 in char field: {}", e)))?
		} else {
			String::from_utf8(bytes.to_vec()).map_err(|e| ErrorKind::Corrupt(format!("invalid utf-8 in char field: {}", e)))?
		};
		return Ok(Object::CharStr(s));
	}
	Ok(Object::Binary(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use field::FieldInfo;

	#[test]
	fn integer_key_field_roundtrips_through_transform() {
		let info = FieldInfo::fixed("id", FieldFlags::INTEGER, 8);
		let encoded = encode_object(&Object::Integer(-7), &info, true).unwrap();
		assert_eq!(decode_object(&encoded, &info, true).unwrap(), Object::Integer(-7));
	}

	#[test]
	fn char_value_field_is_raw_utf8() {
		let info = FieldInfo::variable("name", FieldFlags::CHAR);
		let encoded = encode_object(&Object::CharStr("hello".to_owned()), &info, false).unwrap();
		assert_eq!(encoded, b"hello");
		assert_eq!(decode_object(&encoded, &info, false).unwrap(), Object::CharStr("hello".to_owned()));
	}

	#[test]
	fn opaque_binary_passes_through() {
		let info = FieldInfo::variable("bio", FieldFlags::NONE);
		let encoded = encode_object(&Object::Binary(vec![1, 2, 3]), &info, false).unwrap();
		assert_eq!(decode_object(&encoded, &info, false).unwrap(), Object::Binary(vec![1, 2, 3]));
	}
}
