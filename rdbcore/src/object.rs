//! Runtime values flowing into the field-encoding step.
//!
//! The interpreter layer (out of scope for this crate) hands the core typed
//! `Object` values for each attribute of a tuple being written. The core
//! never interprets these beyond encoding/decoding them; it has no notion
//! of user-defined types beyond the primitive flags in [`FieldFlags`].

use std::fmt;

use field::FieldFlags;

/// A typed attribute value as seen by the record layer.
///
/// `Tuple` and `Relation` carry pre-serialised bytes: nested possreps are
/// produced by the (out of scope) type system and handed to us as opaque
/// binary, exactly like `Binary`. We keep them as distinct variants only so
/// callers can tell opaque user binary from a serialised nested value when
/// debugging.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
	/// `RDB_FTYPE_BOOLEAN`.
	Boolean(bool),
	/// `RDB_FTYPE_INTEGER`. Always signed 64-bit; narrower SQL/BDB
	/// representations are a detail of the backend's transform step.
	Integer(i64),
	/// `RDB_FTYPE_FLOAT`.
	Float(f64),
	/// `RDB_FTYPE_CHAR`.
	CharStr(String),
	/// `RDB_FTYPE_SERIAL`, i.e. a value produced by a [`Sequence`](crate::Sequence).
	Serial(i64),
	/// Opaque binary, used for every encoding the flags don't name.
	Binary(Vec<u8>),
	/// A serialised nested tuple value.
	Tuple(Vec<u8>),
	/// A serialised nested relation value.
	Relation(Vec<u8>),
}

impl Object {
	/// The primitive flag this value would be encoded under, or `None` for
	/// opaque binary (including serialised tuple/relation values).
	pub fn flag(&self) -> Option<FieldFlags> {
		match *self {
			Object::Boolean(_) => Some(FieldFlags::BOOLEAN),
			Object::Integer(_) => Some(FieldFlags::INTEGER),
			Object::Float(_) => Some(FieldFlags::FLOAT),
			Object::CharStr(_) => Some(FieldFlags::CHAR),
			Object::Serial(_) => Some(FieldFlags::SERIAL),
			Object::Binary(_) | Object::Tuple(_) | Object::Relation(_) => None,
		}
	}

	/// True if the on-disk encoding of this value has a size that depends
	/// on the value itself (as opposed to being fixed by `FieldInfo::len`).
	pub fn is_variable_len(&self) -> bool {
		match *self {
			Object::Boolean(_) | Object::Integer(_) | Object::Float(_) | Object::Serial(_) => false,
			Object::CharStr(_) | Object::Binary(_) | Object::Tuple(_) | Object::Relation(_) => true,
		}
	}
}

impl fmt::Display for Object {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Object::Boolean(b) => write!(f, "{}", b),
			Object::Integer(i) => write!(f, "{}", i),
			Object::Float(v) => write!(f, "{}", v),
			Object::CharStr(ref s) => write!(f, "{}", s),
			Object::Serial(i) => write!(f, "{}", i),
			Object::Binary(ref b) => write!(f, "<{} bytes>", b.len()),
			Object::Tuple(ref b) => write!(f, "<tuple, {} bytes>", b.len()),
			Object::Relation(ref b) => write!(f, "<relation, {} bytes>", b.len()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::Object;
	use field::FieldFlags;

	#[test]
	fn flag_matches_primitive_encoding() {
		assert_eq!(Object::Boolean(true).flag(), Some(FieldFlags::BOOLEAN));
		assert_eq!(Object::Integer(1).flag(), Some(FieldFlags::INTEGER));
		assert_eq!(Object::Float(1.0).flag(), Some(FieldFlags::FLOAT));
		assert_eq!(Object::CharStr("a".into()).flag(), Some(FieldFlags::CHAR));
		assert_eq!(Object::Serial(1).flag(), Some(FieldFlags::SERIAL));
		assert_eq!(Object::Binary(vec![1]).flag(), None);
	}

	#[test]
	fn variable_len_classification() {
		assert!(!Object::Integer(1).is_variable_len());
		assert!(Object::CharStr("abc".into()).is_variable_len());
		assert!(Object::Binary(vec![1, 2, 3]).is_variable_len());
	}
}
