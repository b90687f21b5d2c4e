//! The system catalog: three bootstrap recmaps (`sys_vtables`,
//! `sys_indexes`, `sys_table_recmap`) that let the stored-table layer
//! resolve a logical table name to its physical recmap and secondary
//! indexes (spec §4.7).
//!
//! Grounded on `original_source/duro/rel/stable.c`'s catalog bootstrap
//! order: `sys_vtables` first (so a table's heading can always be found
//! once any other catalog lookup succeeds), then `sys_indexes`, then
//! `sys_table_recmap` last (the physical name mapping, which only matters
//! once a table's logical identity and declared indexes are already
//! resolvable). All three are themselves just recmaps, created directly
//! under a fixed name equal to their own table name and self-registered in
//! `sys_table_recmap` -- the one special case in the whole design, needed
//! to break the chicken-and-egg of using `sys_table_recmap` to find
//! `sys_table_recmap`.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use environment::Environment;
use error::{Error, ErrorKind, Result};
use field::{self, FieldFlags, FieldInfo};
use object::Object;
use recmap::{Recmap, RecmapFlags};
use transaction::RecTransaction;

const SYS_VTABLES: &str = "sys_vtables";
const SYS_INDEXES: &str = "sys_indexes";
const SYS_TABLE_RECMAP: &str = "sys_table_recmap";

const MAX_IDENTIFIER_LEN: usize = 128;

/// A validated table/index/attribute name.
///
/// Grammar: starts with an ASCII letter or underscore, followed by any
/// number of ASCII letters, digits or underscores, at most
/// [`MAX_IDENTIFIER_LEN`] characters total (spec §9 leaves the exact
/// grammar to the implementer; this mirrors ordinary Tutorial-D/SQL
/// identifier rules).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
	/// Validates `s` as an identifier.
	pub fn new(s: &str) -> Result<Identifier> {
		let mut chars = s.chars();
		let first = chars.next().ok_or(ErrorKind::InvalidArgument("identifier must not be empty".to_owned()))?;
		if !(first.is_ascii_alphabetic() || first == '_') {
			return Err(ErrorKind::InvalidArgument(format!("identifier {:?} must start with a letter or underscore", s)).into());
		}
		if !chars.clone().all(|c| c.is_ascii_alphanumeric() || c == '_') {
			return Err(ErrorKind::InvalidArgument(format!("identifier {:?} contains invalid characters", s)).into());
		}
		if s.len() > MAX_IDENTIFIER_LEN {
			return Err(ErrorKind::InvalidArgument(format!("identifier {:?} is longer than {} characters", s, MAX_IDENTIFIER_LEN)).into());
		}
		Ok(Identifier(s.to_owned()))
	}

	/// The identifier's text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One row of `sys_indexes`: a secondary index declared for some table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableIndex {
	/// The index's storage name.
	pub name: String,
	/// Indexed attribute names, in key order, each with its ascending flag.
	pub attr_specs: Vec<(String, bool)>,
	/// Whether the index enforces uniqueness.
	pub unique: bool,
	/// Whether the index is ordered.
	pub ordered: bool,
}

fn vtables_field_info() -> Vec<FieldInfo> {
	vec![
		FieldInfo::variable("tablename", FieldFlags::CHAR),
		FieldInfo::variable("heading", FieldFlags::NONE),
		FieldInfo::variable("keys", FieldFlags::NONE),
		FieldInfo::fixed("flags", FieldFlags::INTEGER, 8),
	]
}

fn indexes_field_info() -> Vec<FieldInfo> {
	vec![
		FieldInfo::variable("idxname", FieldFlags::CHAR),
		FieldInfo::variable("tablename", FieldFlags::CHAR),
		FieldInfo::variable("attrs", FieldFlags::NONE),
		FieldInfo::fixed("unique", FieldFlags::BOOLEAN, 1),
		FieldInfo::fixed("ordered", FieldFlags::BOOLEAN, 1),
	]
}

fn table_recmap_field_info() -> Vec<FieldInfo> {
	vec![FieldInfo::variable("tablename", FieldFlags::CHAR), FieldInfo::variable("recmap", FieldFlags::CHAR)]
}

fn encode_field(no: usize, obj: &Object, info: &FieldInfo, is_key: bool) -> Result<field::Field> {
	Ok(field::Field::new(no, field::encode_object(obj, info, is_key)?))
}

fn serialize_attrs(attrs: &[(String, bool)]) -> Vec<u8> {
	let mut buf = Vec::new();
	for &(ref name, ascending) in attrs {
		let bytes = name.as_bytes();
		let mut len_buf = [0u8; 4];
		BigEndian::write_u32(&mut len_buf, bytes.len() as u32);
		buf.extend_from_slice(&len_buf);
		buf.extend_from_slice(bytes);
		buf.push(if ascending { 1 } else { 0 });
	}
	buf
}

fn deserialize_attrs(buf: &[u8]) -> Result<Vec<(String, bool)>> {
	let mut out = Vec::new();
	let mut pos = 0;
	while pos < buf.len() {
		if pos + 4 > buf.len() {
			return Err(ErrorKind::Corrupt("truncated attrs list".to_owned()).into());
		}
		let len = BigEndian::read_u32(&buf[pos..pos + 4]) as usize;
		pos += 4;
		if pos + len + 1 > buf.len() {
			return Err(ErrorKind::Corrupt("truncated attrs list".to_owned()).into());
		}
		let name = String::from_utf8(buf[pos..pos + len].to_vec()).map_err(|e| ErrorKind::Corrupt(format!("invalid utf-8 in attrs list: {}", e)))?;
		pos += len;
		let ascending = buf[pos] != 0;
		pos += 1;
		out.push((name, ascending));
	}
	Ok(out)
}

fn system_recmap_flags() -> RecmapFlags {
	RecmapFlags { ordered: false, unique: true, delayed_deletion: false }
}

/// The three bootstrap catalog tables.
pub struct Catalog {
	sys_vtables: Recmap,
	sys_indexes: Recmap,
	sys_table_recmap: Recmap,
}

impl Catalog {
	/// Creates the three catalog recmaps from scratch and registers each of
	/// them under its own name in `sys_table_recmap`.
	pub fn bootstrap(env: &Environment, tx: &RecTransaction) -> Result<Catalog> {
		let sys_vtables = Recmap::create(Some(SYS_VTABLES), env, vtables_field_info(), 1, None, system_recmap_flags(), tx)?;
		let sys_indexes = Recmap::create(Some(SYS_INDEXES), env, indexes_field_info(), 1, None, system_recmap_flags(), tx)?;
		let sys_table_recmap = Recmap::create(Some(SYS_TABLE_RECMAP), env, table_recmap_field_info(), 1, None, system_recmap_flags(), tx)?;
		let catalog = Catalog { sys_vtables: sys_vtables, sys_indexes: sys_indexes, sys_table_recmap: sys_table_recmap };
		catalog.insert_table_recmap_row(SYS_VTABLES, SYS_VTABLES, tx)?;
		catalog.insert_table_recmap_row(SYS_INDEXES, SYS_INDEXES, tx)?;
		catalog.insert_table_recmap_row(SYS_TABLE_RECMAP, SYS_TABLE_RECMAP, tx)?;
		Ok(catalog)
	}

	/// Opens the three catalog recmaps, which must already exist.
	pub fn open(env: &Environment, tx: &RecTransaction) -> Result<Catalog> {
		Ok(Catalog {
			sys_vtables: Recmap::open(SYS_VTABLES, env, vtables_field_info(), 1, tx)?,
			sys_indexes: Recmap::open(SYS_INDEXES, env, indexes_field_info(), 1, tx)?,
			sys_table_recmap: Recmap::open(SYS_TABLE_RECMAP, env, table_recmap_field_info(), 1, tx)?,
		})
	}

	fn insert_table_recmap_row(&self, table_name: &str, recmap_name: &str, tx: &RecTransaction) -> Result<()> {
		let info = self.sys_table_recmap.field_info();
		let key = encode_field(0, &Object::CharStr(table_name.to_owned()), &info[0], true)?;
		let value = encode_field(1, &Object::CharStr(recmap_name.to_owned()), &info[1], false)?;
		self.sys_table_recmap.insert(&[key, value], tx)
	}

	/// Registers `table_name` as stored under physical recmap
	/// `recmap_name`.
	pub fn insert_table_recmap(&self, table_name: &Identifier, recmap_name: &str, tx: &RecTransaction) -> Result<()> {
		self.insert_table_recmap_row(table_name.as_str(), recmap_name, tx)
	}

	/// Looks up the physical recmap name a logical table is stored under.
	pub fn recmap_name(&self, table_name: &Identifier, tx: &RecTransaction) -> Result<String> {
		let info = self.sys_table_recmap.field_info();
		let key = encode_field(0, &Object::CharStr(table_name.as_str().to_owned()), &info[0], true)?;
		let fields = self.sys_table_recmap.get_fields(&[key], &[1], tx)?;
		let field = fields.into_iter().find(|f| f.no == 1).ok_or(ErrorKind::Internal("sys_table_recmap row missing recmap field".to_owned()))?;
		match field::decode_object(&field.data, &info[1], false)? {
			Object::CharStr(s) => Ok(s),
			_ => Err(ErrorKind::Corrupt("sys_table_recmap.recmap is not a string".to_owned()).into()),
		}
	}

	/// Declares a secondary index over `table_name`.
	pub fn insert_index(&self, name: &str, attrs: &[(String, bool)], unique: bool, ordered: bool, table_name: &Identifier, tx: &RecTransaction) -> Result<()> {
		let info = self.sys_indexes.field_info();
		let fields = vec![
			encode_field(0, &Object::CharStr(name.to_owned()), &info[0], true)?,
			encode_field(1, &Object::CharStr(table_name.as_str().to_owned()), &info[1], false)?,
			encode_field(2, &Object::Binary(serialize_attrs(attrs)), &info[2], false)?,
			encode_field(3, &Object::Boolean(unique), &info[3], false)?,
			encode_field(4, &Object::Boolean(ordered), &info[4], false)?,
		];
		self.sys_indexes.insert(&fields, tx)
	}

	/// Every secondary index declared for `table_name`.
	pub fn get_indexes(&self, table_name: &Identifier, tx: &RecTransaction) -> Result<Vec<TableIndex>> {
		let info = self.sys_indexes.field_info().to_vec();
		let mut out = Vec::new();
		let mut cursor = self.sys_indexes.cursor(false, tx)?;
		let mut positioned = cursor.first()?;
		while positioned {
			let idxname = match field::decode_object(&cursor.get(0)?.data, &info[0], true)? {
				Object::CharStr(s) => s,
				_ => return Err(ErrorKind::Corrupt("sys_indexes.idxname is not a string".to_owned()).into()),
			};
			let row_table = match field::decode_object(&cursor.get(1)?.data, &info[1], false)? {
				Object::CharStr(s) => s,
				_ => return Err(ErrorKind::Corrupt("sys_indexes.tablename is not a string".to_owned()).into()),
			};
			if row_table == table_name.as_str() {
				let attrs_bytes = match field::decode_object(&cursor.get(2)?.data, &info[2], false)? {
					Object::Binary(b) => b,
					_ => return Err(ErrorKind::Corrupt("sys_indexes.attrs is not binary".to_owned()).into()),
				};
				let unique = match field::decode_object(&cursor.get(3)?.data, &info[3], false)? {
					Object::Boolean(b) => b,
					_ => return Err(ErrorKind::Corrupt("sys_indexes.unique is not boolean".to_owned()).into()),
				};
				let ordered = match field::decode_object(&cursor.get(4)?.data, &info[4], false)? {
					Object::Boolean(b) => b,
					_ => return Err(ErrorKind::Corrupt("sys_indexes.ordered is not boolean".to_owned()).into()),
				};
				out.push(TableIndex { name: idxname, attr_specs: deserialize_attrs(&attrs_bytes)?, unique: unique, ordered: ordered });
			}
			positioned = cursor.next(false)?;
		}
		cursor.close()?;
		Ok(out)
	}

	/// Validates `s` as an [`Identifier`]. A thin wrapper kept as a catalog
	/// method so callers that already hold a `Catalog` don't need a
	/// separate import; validation itself needs no catalog state.
	pub fn string_to_id(&self, s: &str) -> Result<Identifier> {
		Identifier::new(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identifier_accepts_ordinary_names() {
		assert!(Identifier::new("emp").is_ok());
		assert!(Identifier::new("_private").is_ok());
		assert!(Identifier::new("emp_by_dept2").is_ok());
	}

	#[test]
	fn identifier_rejects_bad_names() {
		assert!(Identifier::new("").is_err());
		assert!(Identifier::new("2emp").is_err());
		assert!(Identifier::new("emp-by-dept").is_err());
		assert!(Identifier::new("emp dept").is_err());
	}

	#[test]
	fn attrs_serialization_roundtrips() {
		let attrs = vec![("dept".to_owned(), true), ("name".to_owned(), false)];
		let bytes = serialize_attrs(&attrs);
		assert_eq!(deserialize_attrs(&bytes).unwrap(), attrs);
	}
}
