//! Static per-field metadata.

/// Primitive encoding flags for a field.
///
/// Mirrors the original's `RDB_FTYPE_*` bit positions exactly (`CHAR=1`,
/// `BOOLEAN=2`, `INTEGER=4`, `FLOAT=8`, `SERIAL=256`) so the gap between `8`
/// and `256` is preserved; a field with none of these flags set is opaque
/// binary (`Object::Binary`/`Tuple`/`Relation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags(u16);

impl FieldFlags {
	/// No primitive flag: opaque binary.
	pub const NONE: FieldFlags = FieldFlags(0);
	/// Locale-collated character string.
	pub const CHAR: FieldFlags = FieldFlags(1);
	/// Single byte, 0 or 1.
	pub const BOOLEAN: FieldFlags = FieldFlags(2);
	/// Signed 64-bit integer.
	pub const INTEGER: FieldFlags = FieldFlags(4);
	/// IEEE-754 double.
	pub const FLOAT: FieldFlags = FieldFlags(8);
	/// Value produced by a `Sequence`, encoded like `INTEGER`.
	pub const SERIAL: FieldFlags = FieldFlags(256);

	/// True if this is one of the fixed-width primitive encodings.
	pub fn is_fixed_width(self) -> bool {
		self == FieldFlags::BOOLEAN || self == FieldFlags::INTEGER
			|| self == FieldFlags::FLOAT || self == FieldFlags::SERIAL
	}

	/// True if the field participates in the key-field sort-order transform
	/// (spec: "Value fields are never transformed").
	pub fn is_orderable_primitive(self) -> bool {
		self == FieldFlags::INTEGER || self == FieldFlags::FLOAT || self == FieldFlags::CHAR
	}

	pub(crate) fn bits(self) -> u16 {
		self.0
	}
}

/// Static metadata for one field in a recmap's field table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
	/// Fixed size in bytes, or `None` for a variable-length field.
	pub len: Option<usize>,
	/// The attribute name this field was derived from; used only for
	/// diagnostics and catalog round-tripping, never for addressing (field
	/// number is the stable handle).
	pub attr_name: String,
	/// Primitive encoding, or `FieldFlags::NONE` for opaque binary.
	pub flags: FieldFlags,
}

impl FieldInfo {
	/// A fixed-width primitive field.
	pub fn fixed(attr_name: &str, flags: FieldFlags, len: usize) -> FieldInfo {
		FieldInfo { len: Some(len), attr_name: attr_name.to_owned(), flags: flags }
	}

	/// A variable-length field (CHAR or opaque binary).
	pub fn variable(attr_name: &str, flags: FieldFlags) -> FieldInfo {
		FieldInfo { len: None, attr_name: attr_name.to_owned(), flags: flags }
	}

	/// True if this field's on-disk size is fixed by `len` rather than
	/// carried per-value in a framing header.
	pub fn is_fixed(&self) -> bool {
		self.len.is_some()
	}

	/// The field's on-disk width, for fixed-length fields. Variable-length
	/// fields have no static width; callers must consult the framing header.
	pub fn fixed_width(&self) -> Option<usize> {
		self.len
	}
}

#[cfg(test)]
mod tests {
	use super::{FieldFlags, FieldInfo};

	#[test]
	fn flag_bit_positions_match_original_layout() {
		assert_eq!(FieldFlags::CHAR.bits(), 1);
		assert_eq!(FieldFlags::BOOLEAN.bits(), 2);
		assert_eq!(FieldFlags::INTEGER.bits(), 4);
		assert_eq!(FieldFlags::FLOAT.bits(), 8);
		assert_eq!(FieldFlags::SERIAL.bits(), 256);
	}

	#[test]
	fn fixed_vs_variable() {
		let f = FieldInfo::fixed("id", FieldFlags::INTEGER, 8);
		assert!(f.is_fixed());
		let v = FieldInfo::variable("name", FieldFlags::CHAR);
		assert!(!v.is_fixed());
	}
}
