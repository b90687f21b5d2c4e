//! Logical schema: a table's attributes and declared keys, independent of
//! how they end up laid out as field numbers.

use field::FieldFlags;

/// One column of a logical table heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
	/// The attribute's name, as it appears in the heading and in
	/// `sys_indexes.attrs`.
	pub name: String,
	/// The attribute's primitive encoding, or `FieldFlags::NONE` for a
	/// possrep that serialises to opaque binary.
	pub flags: FieldFlags,
	/// Fixed on-disk width, if the type has one.
	pub len: Option<usize>,
}

impl Attribute {
	/// Builds an attribute descriptor.
	pub fn new(name: &str, flags: FieldFlags, len: Option<usize>) -> Attribute {
		Attribute { name: name.to_owned(), flags: flags, len: len }
	}
}

/// One declared candidate key of a logical table: an ordered list of
/// attribute names, with the name-of-attribute-ascending flag carried per
/// attribute (used when the key also implies an ordered primary index).
#[derive(Debug, Clone, PartialEq)]
pub struct TableKey {
	/// Attribute names making up this key, in declaration order.
	pub attrs: Vec<String>,
	/// Per-attribute ascending flag, same length and order as `attrs`.
	/// Only meaningful when this key backs an ordered primary index.
	pub ascending: Vec<bool>,
}

impl TableKey {
	/// Builds a key over the given attribute names, all ascending.
	pub fn new(attrs: Vec<String>) -> TableKey {
		let n = attrs.len();
		TableKey { attrs: attrs, ascending: vec![true; n] }
	}

	/// Builds a key with an explicit per-attribute direction, used for an
	/// ordered primary index (`keyv[0]` with a declared sort order).
	pub fn ordered(attrs: Vec<String>, ascending: Vec<bool>) -> TableKey {
		assert_eq!(attrs.len(), ascending.len());
		TableKey { attrs: attrs, ascending: ascending }
	}
}

/// A logical table's full attribute set and declared candidate keys.
///
/// Only `keyv[0]` (here `keys[0]`) determines the physical primary index;
/// additional candidate keys are not represented physically by this crate
/// (the interpreter enforces them as constraints above the storage layer).
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
	/// Every attribute of the table, in declaration order. Order here has
	/// no bearing on field numbers; `stored_table::create_stored_table`
	/// derives field numbers from the primary key plus this order.
	pub attrs: Vec<Attribute>,
	/// Declared candidate keys; `keys[0]` is the primary key used to build
	/// the physical primary index.
	pub keys: Vec<TableKey>,
}

impl Heading {
	/// Builds a heading. `keys` must be non-empty; `keys[0]` becomes the
	/// primary key.
	pub fn new(attrs: Vec<Attribute>, keys: Vec<TableKey>) -> Heading {
		assert!(!keys.is_empty(), "a heading must declare at least a primary key");
		Heading { attrs: attrs, keys: keys }
	}

	/// The primary key, `keys[0]`.
	pub fn primary_key(&self) -> &TableKey {
		&self.keys[0]
	}

	/// Looks up an attribute by name.
	pub fn attr(&self, name: &str) -> Option<&Attribute> {
		self.attrs.iter().find(|a| a.name == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use field::FieldFlags;

	#[test]
	fn primary_key_is_first_declared_key() {
		let h = Heading::new(
			vec![
				Attribute::new("id", FieldFlags::INTEGER, Some(8)),
				Attribute::new("name", FieldFlags::CHAR, None),
			],
			vec![TableKey::new(vec!["id".to_owned()])],
		);
		assert_eq!(h.primary_key().attrs, vec!["id".to_owned()]);
		assert!(h.attr("name").is_some());
		assert!(h.attr("nope").is_none());
	}
}
